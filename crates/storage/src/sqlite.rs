use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, params_from_iter};
use tracing::{debug, info};

use crosswalk_core::{
    Hlc, HlcClock, KeyValue, MappingRow, MappingType, Page, PageRequest,
};

use crate::error::StorageError;
use crate::kind::{ColumnKind, MappingKind};
use crate::traits::{InsertOutcome, PlannedWrite, UnitOutcome};

/// Row-level crosswalk store over one SQLite connection.
///
/// Cloning is cheap; clones share the connection and the stamp clock. Every
/// write holds the connection for the length of its transaction.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<Mutex<HlcClock>>,
    kinds: Arc<Vec<&'static MappingKind>>,
}

impl SqliteStore {
    pub fn open(
        path: impl AsRef<Path>,
        kinds: &[&'static MappingKind],
    ) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, kinds)
    }

    pub fn open_in_memory(kinds: &[&'static MappingKind]) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, kinds)
    }

    fn from_connection(
        conn: Connection,
        kinds: &[&'static MappingKind],
    ) -> Result<Self, StorageError> {
        crate::schema::init_schema(&conn, kinds)?;

        // Stamps issued after a reopen must sort after every persisted row.
        let mut clock = HlcClock::new();
        for kind in kinds {
            let latest: Option<Vec<u8>> = conn.query_row(
                &format!("SELECT MAX(when_created) FROM {}", kind.table),
                [],
                |row| row.get(0),
            )?;
            if let Some(bytes) = latest {
                clock.observe(Hlc::from_bytes(&bytes)?);
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: Arc::new(Mutex::new(clock)),
            kinds: Arc::new(kinds.to_vec()),
        })
    }

    pub fn kinds(&self) -> &[&'static MappingKind] {
        &self.kinds
    }

    /// Looks up a registered kind by table name.
    pub fn kind(&self, table: &str) -> Option<&'static MappingKind> {
        self.kinds.iter().copied().find(|k| k.table == table)
    }

    /// Issues a fresh stamp; useful as a rollback checkpoint.
    pub fn now(&self) -> Result<Hlc, StorageError> {
        self.next_stamp()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn next_stamp(&self) -> Result<Hlc, StorageError> {
        let mut clock = self.clock.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(clock.tick()?)
    }

    pub fn insert(
        &self,
        kind: &'static MappingKind,
        row: &MappingRow,
    ) -> Result<InsertOutcome<MappingRow>, StorageError> {
        kind.check_row(row)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let stamp = self.next_stamp()?;
        let outcome = insert_row(&tx, kind, row, stamp)?;
        tx.commit()?;
        if let InsertOutcome::Inserted(_) = outcome {
            debug!(table = kind.table, label = ?row.label, "inserted mapping");
        }
        Ok(outcome)
    }

    pub fn find_by_legacy_id(
        &self,
        kind: &'static MappingKind,
        legacy_id: &[KeyValue],
    ) -> Result<Option<MappingRow>, StorageError> {
        kind.check_legacy_key(legacy_id)?;
        let conn = self.lock()?;
        find_by_legacy_id_in(&conn, kind, legacy_id)
    }

    pub fn find_by_new_id(
        &self,
        kind: &'static MappingKind,
        new_id: &[KeyValue],
    ) -> Result<Option<MappingRow>, StorageError> {
        kind.check_new_key(new_id)?;
        let conn = self.lock()?;
        find_by_new_id_in(&conn, kind, new_id)
    }

    /// One page of a migration run, ordered by creation stamp then new id.
    /// Rows added later always sort after rows already paged through.
    pub fn find_all_by_label(
        &self,
        kind: &'static MappingKind,
        label: &str,
        page: PageRequest,
    ) -> Result<Page<MappingRow>, StorageError> {
        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE label = ?1", kind.table),
            [label],
            |row| row.get(0),
        )?;
        let sql = format!(
            "SELECT {} FROM {} WHERE label = ?1 ORDER BY when_created, {} LIMIT ?2 OFFSET ?3",
            kind.select_list(),
            kind.table,
            kind.new_id_order(),
        );
        let params = vec![
            Value::Text(label.to_string()),
            Value::Integer(i64::from(page.size)),
            Value::Integer(to_i64(page.offset())?),
        ];
        let rows = query_rows(&conn, kind, &sql, params)?;
        Ok(Page::new(rows, page, total as u64))
    }

    pub fn count_by_label(
        &self,
        kind: &'static MappingKind,
        label: &str,
        include_provisional: bool,
    ) -> Result<u64, StorageError> {
        let filter = if include_provisional { "" } else { " AND provisional = 0" };
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE label = ?1{filter}", kind.table),
            [label],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn find_latest_migrated(
        &self,
        kind: &'static MappingKind,
    ) -> Result<Option<MappingRow>, StorageError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE mapping_type = ?1 ORDER BY when_created DESC LIMIT 1",
            kind.select_list(),
            kind.table,
        );
        let params = vec![Value::Text(MappingType::Migrated.as_string())];
        Ok(query_rows(&conn, kind, &sql, params)?.into_iter().next())
    }

    pub fn delete_by_new_id(
        &self,
        kind: &'static MappingKind,
        new_id: &[KeyValue],
    ) -> Result<u64, StorageError> {
        kind.check_new_key(new_id)?;
        let conn = self.lock()?;
        let sql = format!("DELETE FROM {} WHERE {}", kind.table, kind.new_predicate(1));
        let deleted = conn.execute(&sql, params_from_iter(new_id.iter().map(key_to_sql)))?;
        debug!(table = kind.table, deleted, "deleted mapping by new id");
        Ok(deleted as u64)
    }

    pub fn delete_by_parent_id(
        &self,
        kind: &'static MappingKind,
        parent_id: &str,
    ) -> Result<u64, StorageError> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE parent_id = ?1", kind.table),
            [parent_id],
        )?;
        info!(table = kind.table, parent_id, deleted, "deleted child mappings");
        Ok(deleted as u64)
    }

    pub fn delete_created_after(
        &self,
        kind: &'static MappingKind,
        checkpoint: Hlc,
    ) -> Result<u64, StorageError> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE when_created > ?1", kind.table),
            [&checkpoint.to_bytes()[..]],
        )?;
        info!(table = kind.table, deleted, "rolled back mappings after checkpoint");
        Ok(deleted as u64)
    }

    pub fn delete_created_before(
        &self,
        kind: &'static MappingKind,
        cutoff: Hlc,
    ) -> Result<u64, StorageError> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE when_created < ?1", kind.table),
            [&cutoff.to_bytes()[..]],
        )?;
        Ok(deleted as u64)
    }

    pub fn rewrite_owner(
        &self,
        kind: &'static MappingKind,
        old_owner: &str,
        new_owner: &str,
    ) -> Result<u64, StorageError> {
        let conn = self.lock()?;
        let updated = update_owner(&conn, kind, old_owner, new_owner)?;
        info!(table = kind.table, updated, "rewrote owner");
        Ok(updated)
    }

    /// Rewrites the owner in every given kind inside one transaction, so a
    /// failing table leaves all of them untouched. Returns the kinds that
    /// changed with their row counts.
    pub fn rewrite_owner_across(
        &self,
        kinds: &[&'static MappingKind],
        old_owner: &str,
        new_owner: &str,
    ) -> Result<Vec<(&'static str, u64)>, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut changed = Vec::new();
        for kind in kinds {
            let updated = update_owner(&tx, kind, old_owner, new_owner)?;
            if updated > 0 {
                changed.push((kind.table, updated));
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Moves every row of one aggregate to `new_owner`, returning the rows
    /// that changed.
    pub fn rewrite_owner_for_aggregate(
        &self,
        kind: &'static MappingKind,
        aggregate_id: &str,
        new_owner: &str,
    ) -> Result<Vec<MappingRow>, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let sql = format!(
            "UPDATE {} SET owner_id = ?1 WHERE parent_id = ?2 AND (owner_id IS NULL OR owner_id <> ?1) RETURNING {}",
            kind.table,
            kind.select_list(),
        );
        let params = vec![
            Value::Text(new_owner.to_string()),
            Value::Text(aggregate_id.to_string()),
        ];
        let rows = query_rows(&tx, kind, &sql, params)?;
        tx.commit()?;
        info!(table = kind.table, aggregate_id, updated = rows.len(), "rewrote aggregate owner");
        Ok(rows)
    }

    /// Applies one aggregate's writes in a single transaction. Any rejected
    /// or missing write rolls back the whole unit.
    pub fn apply_unit(&self, writes: &[PlannedWrite]) -> Result<UnitOutcome, StorageError> {
        for write in writes {
            if let PlannedWrite::Insert { kind, row } = write {
                kind.check_row(row)?;
            }
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut applied = Vec::with_capacity(writes.len());

        for (index, write) in writes.iter().enumerate() {
            match write {
                PlannedWrite::Insert { kind, row } => {
                    let stamp = self.next_stamp()?;
                    match insert_row(&tx, kind, row, stamp)? {
                        InsertOutcome::Inserted(row) | InsertOutcome::Unchanged(row) => {
                            applied.push(row)
                        }
                        InsertOutcome::Rejected => return Ok(UnitOutcome::Rejected { index }),
                    }
                }
                PlannedWrite::Relabel {
                    kind,
                    new_id,
                    legacy_id,
                } => {
                    kind.check_new_key(new_id)?;
                    kind.check_legacy_key(legacy_id)?;
                    let sql = format!(
                        "UPDATE {} SET {} WHERE {}",
                        kind.table,
                        kind.legacy_assignments(1),
                        kind.new_predicate(legacy_id.len() + 1),
                    );
                    let params = legacy_id.iter().chain(new_id.iter()).map(key_to_sql);
                    match tx.execute(&sql, params_from_iter(params)) {
                        Ok(0) => return Ok(UnitOutcome::Missing { index }),
                        Ok(_) => {}
                        Err(e) => {
                            let err = StorageError::from(e);
                            if err.is_unique_violation() {
                                return Ok(UnitOutcome::Rejected { index });
                            }
                            return Err(err);
                        }
                    }
                    match find_by_new_id_in(&tx, kind, new_id)? {
                        Some(row) => applied.push(row),
                        None => return Ok(UnitOutcome::Missing { index }),
                    }
                }
            }
        }

        tx.commit()?;
        debug!(rows = applied.len(), "committed unit of work");
        Ok(UnitOutcome::Committed(applied))
    }
}

fn insert_row(
    conn: &Connection,
    kind: &'static MappingKind,
    row: &MappingRow,
    stamp: Hlc,
) -> Result<InsertOutcome<MappingRow>, StorageError> {
    let placeholders = (1..=kind.column_count())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        kind.table,
        kind.select_list(),
    );

    let mut params: Vec<Value> = row
        .legacy_id
        .iter()
        .chain(row.new_id.iter())
        .map(key_to_sql)
        .collect();
    params.push(opt_text(&row.parent_id));
    params.push(opt_text(&row.owner_id));
    params.push(opt_text(&row.label));
    params.push(Value::Text(row.mapping_type.as_string()));
    params.push(Value::Integer(i64::from(row.provisional)));
    params.push(Value::Blob(stamp.to_bytes().to_vec()));

    match conn.execute(&sql, params_from_iter(params)) {
        Ok(_) => {
            let mut stored = row.clone();
            stored.when_created = Some(stamp);
            Ok(InsertOutcome::Inserted(stored))
        }
        Err(e) => {
            let err = StorageError::from(e);
            if !err.is_unique_violation() {
                return Err(err);
            }
            match find_by_new_id_in(conn, kind, &row.new_id)? {
                Some(existing) if existing.legacy_id == row.legacy_id => {
                    Ok(InsertOutcome::Unchanged(existing))
                }
                _ => Ok(InsertOutcome::Rejected),
            }
        }
    }
}

fn find_by_new_id_in(
    conn: &Connection,
    kind: &'static MappingKind,
    new_id: &[KeyValue],
) -> Result<Option<MappingRow>, StorageError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {}",
        kind.select_list(),
        kind.table,
        kind.new_predicate(1),
    );
    let params = new_id.iter().map(key_to_sql).collect();
    Ok(query_rows(conn, kind, &sql, params)?.into_iter().next())
}

fn find_by_legacy_id_in(
    conn: &Connection,
    kind: &'static MappingKind,
    legacy_id: &[KeyValue],
) -> Result<Option<MappingRow>, StorageError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {}",
        kind.select_list(),
        kind.table,
        kind.legacy_predicate(1),
    );
    let params = legacy_id.iter().map(key_to_sql).collect();
    Ok(query_rows(conn, kind, &sql, params)?.into_iter().next())
}

fn query_rows(
    conn: &Connection,
    kind: &'static MappingKind,
    sql: &str,
    params: Vec<Value>,
) -> Result<Vec<MappingRow>, StorageError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(params), |row| read_row(row, kind))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn read_row(row: &rusqlite::Row, kind: &MappingKind) -> rusqlite::Result<MappingRow> {
    let mut idx = 0;
    let mut legacy_id = Vec::with_capacity(kind.legacy.len());
    for column in kind.legacy {
        legacy_id.push(read_key(row, idx, column.kind)?);
        idx += 1;
    }
    let mut new_id = Vec::with_capacity(kind.new.len());
    for column in kind.new {
        new_id.push(read_key(row, idx, column.kind)?);
        idx += 1;
    }

    let parent_id: Option<String> = row.get(idx)?;
    let owner_id: Option<String> = row.get(idx + 1)?;
    let label: Option<String> = row.get(idx + 2)?;
    let mapping_type: String = row.get(idx + 3)?;
    let provisional: bool = row.get(idx + 4)?;
    let stamp: Vec<u8> = row.get(idx + 5)?;

    let mapping_type = MappingType::parse(&mapping_type).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx + 3, Type::Text, Box::new(e))
    })?;
    let when_created = Hlc::from_bytes(&stamp).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx + 5, Type::Blob, Box::new(e))
    })?;

    Ok(MappingRow {
        legacy_id,
        new_id,
        parent_id,
        owner_id,
        label,
        mapping_type,
        provisional,
        when_created: Some(when_created),
    })
}

fn read_key(row: &rusqlite::Row, idx: usize, kind: ColumnKind) -> rusqlite::Result<KeyValue> {
    Ok(match kind {
        ColumnKind::Integer => KeyValue::Integer(row.get(idx)?),
        ColumnKind::Text => KeyValue::Text(row.get(idx)?),
    })
}

fn key_to_sql(value: &KeyValue) -> Value {
    match value {
        KeyValue::Integer(n) => Value::Integer(*n),
        KeyValue::Text(s) => Value::Text(s.clone()),
    }
}

fn opt_text(value: &Option<String>) -> Value {
    value.clone().map(Value::Text).unwrap_or(Value::Null)
}

fn to_i64(n: u64) -> Result<i64, StorageError> {
    i64::try_from(n).map_err(|_| StorageError::Serialization(format!("{n} exceeds i64")))
}

fn update_owner(
    conn: &Connection,
    kind: &MappingKind,
    old_owner: &str,
    new_owner: &str,
) -> Result<u64, StorageError> {
    let updated = conn.execute(
        &format!("UPDATE {} SET owner_id = ?1 WHERE owner_id = ?2", kind.table),
        [new_owner, old_owner],
    )?;
    Ok(updated as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Column;

    static VISITS: MappingKind = MappingKind {
        table: "visit_mapping",
        legacy: &[Column::integer("nomis_id", "nomisId")],
        new: &[Column::text("dps_id", "dpsId")],
        parent: Some("dpsParentId"),
        owner: Some("offenderNo"),
        retention: None,
    };

    fn row(legacy: i64, new: &str) -> MappingRow {
        MappingRow {
            legacy_id: vec![KeyValue::Integer(legacy)],
            new_id: vec![KeyValue::Text(new.to_string())],
            parent_id: None,
            owner_id: None,
            label: None,
            mapping_type: MappingType::created("NOMIS"),
            provisional: false,
            when_created: None,
        }
    }

    #[test]
    fn insert_distinguishes_unchanged_from_rejected() {
        let store = SqliteStore::open_in_memory(&[&VISITS]).unwrap();
        assert!(matches!(store.insert(&VISITS, &row(1, "a")).unwrap(), InsertOutcome::Inserted(_)));
        assert!(matches!(store.insert(&VISITS, &row(1, "a")).unwrap(), InsertOutcome::Unchanged(_)));
        assert!(matches!(store.insert(&VISITS, &row(2, "a")).unwrap(), InsertOutcome::Rejected));
        assert!(matches!(store.insert(&VISITS, &row(1, "b")).unwrap(), InsertOutcome::Rejected));
    }

    #[test]
    fn stored_stamp_survives_read() {
        let store = SqliteStore::open_in_memory(&[&VISITS]).unwrap();
        let InsertOutcome::Inserted(stored) = store.insert(&VISITS, &row(1, "a")).unwrap() else {
            panic!("expected insert");
        };
        let found = store
            .find_by_new_id(&VISITS, &[KeyValue::Text("a".into())])
            .unwrap()
            .unwrap();
        assert_eq!(found.when_created, stored.when_created);
    }

    #[test]
    fn failed_unit_leaves_no_rows() {
        let store = SqliteStore::open_in_memory(&[&VISITS]).unwrap();
        store.insert(&VISITS, &row(9, "taken")).unwrap();
        let writes = vec![
            PlannedWrite::Insert { kind: &VISITS, row: row(1, "a") },
            PlannedWrite::Insert { kind: &VISITS, row: row(9, "b") },
        ];
        match store.apply_unit(&writes).unwrap() {
            UnitOutcome::Rejected { index } => assert_eq!(index, 1),
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(store.find_by_new_id(&VISITS, &[KeyValue::Text("a".into())]).unwrap().is_none());
    }

    #[test]
    fn reopen_keeps_stamps_increasing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crosswalk.db");
        let first = {
            let store = SqliteStore::open(&path, &[&VISITS]).unwrap();
            let InsertOutcome::Inserted(r) = store.insert(&VISITS, &row(1, "a")).unwrap() else {
                panic!("expected insert");
            };
            r.when_created.unwrap()
        };
        let store = SqliteStore::open(&path, &[&VISITS]).unwrap();
        assert!(store.now().unwrap() > first);
        assert!(store.find_by_legacy_id(&VISITS, &[KeyValue::Integer(1)]).unwrap().is_some());
    }

    #[test]
    fn owner_rewrite_across_kinds_is_all_or_nothing() {
        static MISSING: MappingKind = MappingKind {
            table: "missing_mapping",
            legacy: &[Column::integer("nomis_id", "nomisId")],
            new: &[Column::text("dps_id", "dpsId")],
            parent: None,
            owner: Some("offenderNo"),
            retention: None,
        };
        let store = SqliteStore::open_in_memory(&[&VISITS]).unwrap();
        let mut owned = row(1, "a");
        owned.owner_id = Some("A1111AA".into());
        store.insert(&VISITS, &owned).unwrap();

        assert!(store.rewrite_owner_across(&[&VISITS, &MISSING], "A1111AA", "B2222BB").is_err());
        let kept = store.find_by_legacy_id(&VISITS, &[KeyValue::Integer(1)]).unwrap().unwrap();
        assert_eq!(kept.owner_id.as_deref(), Some("A1111AA"));

        let changed = store.rewrite_owner_across(&[&VISITS], "A1111AA", "B2222BB").unwrap();
        assert_eq!(changed, vec![("visit_mapping", 1)]);
    }
}
