use std::time::Duration;

use crosswalk_core::{CoreError, KeyValue, MappingKey, MappingRow};

use crate::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
}

impl ColumnKind {
    fn sql_type(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Text => "TEXT",
        }
    }

    fn accepts(&self, value: &KeyValue) -> bool {
        matches!(
            (self, value),
            (Self::Integer, KeyValue::Integer(_)) | (Self::Text, KeyValue::Text(_))
        )
    }
}

/// One identifier column: its SQL name and its JSON field name.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub json: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn integer(name: &'static str, json: &'static str) -> Self {
        Self { name, json, kind: ColumnKind::Integer }
    }

    pub const fn text(name: &'static str, json: &'static str) -> Self {
        Self { name, json, kind: ColumnKind::Text }
    }
}

/// Per-entity configuration of one crosswalk table. Every entity kind shares
/// the same engine; only names and key layouts differ.
#[derive(Debug)]
pub struct MappingKind {
    pub table: &'static str,
    pub legacy: &'static [Column],
    pub new: &'static [Column],
    /// JSON field name of the owning aggregate id, when the kind has one.
    pub parent: Option<&'static str>,
    /// JSON field name of the denormalized owner id, when the kind has one.
    pub owner: Option<&'static str>,
    /// Rows older than this are removed by the retention sweep.
    pub retention: Option<Duration>,
}

/// Fixed trailing columns shared by every crosswalk table, in select order.
pub(crate) const COMMON_COLUMNS: [&str; 6] = [
    "parent_id",
    "owner_id",
    "label",
    "mapping_type",
    "provisional",
    "when_created",
];

impl MappingKind {
    pub fn create_sql(&self) -> String {
        let key_defs = self
            .legacy
            .iter()
            .chain(self.new.iter())
            .map(|c| format!("    {} {} NOT NULL,\n", c.name, c.kind.sql_type()))
            .collect::<String>();
        let table = self.table;
        let new_cols = column_list(self.new);
        let legacy_cols = column_list(self.legacy);
        format!(
            "
CREATE TABLE IF NOT EXISTS {table} (
{key_defs}    parent_id TEXT,
    owner_id TEXT,
    label TEXT,
    mapping_type TEXT NOT NULL,
    provisional INTEGER NOT NULL DEFAULT 0,
    when_created BLOB NOT NULL CHECK (length(when_created) = 12),
    PRIMARY KEY ({new_cols}),
    UNIQUE ({legacy_cols})
);
CREATE INDEX IF NOT EXISTS idx_{table}_label ON {table} (label, when_created);
CREATE INDEX IF NOT EXISTS idx_{table}_parent ON {table} (parent_id);
CREATE INDEX IF NOT EXISTS idx_{table}_owner ON {table} (owner_id);
CREATE INDEX IF NOT EXISTS idx_{table}_type_created ON {table} (mapping_type, when_created);
"
        )
    }

    /// All columns in the order `read_row` expects them.
    pub(crate) fn select_list(&self) -> String {
        self.legacy
            .iter()
            .chain(self.new.iter())
            .map(|c| c.name)
            .chain(COMMON_COLUMNS)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn new_id_order(&self) -> String {
        column_list(self.new)
    }

    /// `a = ?n AND b = ?n+1 ...` over the legacy columns.
    pub(crate) fn legacy_predicate(&self, first_param: usize) -> String {
        predicate(self.legacy, first_param)
    }

    pub(crate) fn new_predicate(&self, first_param: usize) -> String {
        predicate(self.new, first_param)
    }

    pub(crate) fn legacy_assignments(&self, first_param: usize) -> String {
        self.legacy
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", c.name, first_param + i))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn column_count(&self) -> usize {
        self.legacy.len() + self.new.len() + COMMON_COLUMNS.len()
    }

    /// Checks that a typed key pair fits this kind's column layout.
    pub fn check_layout<L: MappingKey, N: MappingKey>(&self) -> Result<(), StorageError> {
        if L::ARITY != self.legacy.len() || N::ARITY != self.new.len() {
            return Err(StorageError::Layout {
                table: self.table.to_string(),
                detail: format!(
                    "typed keys have {}+{} columns, table has {}+{}",
                    L::ARITY,
                    N::ARITY,
                    self.legacy.len(),
                    self.new.len()
                ),
            });
        }
        Ok(())
    }

    pub fn check_legacy_key(&self, values: &[KeyValue]) -> Result<(), CoreError> {
        check_key(self.legacy, values, "legacyId")
    }

    pub fn check_new_key(&self, values: &[KeyValue]) -> Result<(), CoreError> {
        check_key(self.new, values, "newId")
    }

    pub fn check_row(&self, row: &MappingRow) -> Result<(), CoreError> {
        self.check_legacy_key(&row.legacy_id)?;
        self.check_new_key(&row.new_id)?;
        if row.parent_id.is_some() && self.parent.is_none() {
            return Err(CoreError::validation("parentId", format!("{} has no parent", self.table)));
        }
        if row.owner_id.is_some() && self.owner.is_none() {
            return Err(CoreError::validation("ownerId", format!("{} has no owner", self.table)));
        }
        row.validate()
    }
}

fn column_list(columns: &[Column]) -> String {
    columns.iter().map(|c| c.name).collect::<Vec<_>>().join(", ")
}

fn predicate(columns: &[Column], first_param: usize) -> String {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ?{}", c.name, first_param + i))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn check_key(columns: &[Column], values: &[KeyValue], field: &str) -> Result<(), CoreError> {
    if columns.len() != values.len() {
        return Err(CoreError::validation(
            field,
            format!("expected {} key part(s), got {}", columns.len(), values.len()),
        ));
    }
    for (column, value) in columns.iter().zip(values) {
        if !column.kind.accepts(value) {
            return Err(CoreError::validation(
                column.json,
                format!("expected {:?}, got {}", column.kind, value.kind_name()),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    static SENTENCES: MappingKind = MappingKind {
        table: "sentence_mapping",
        legacy: &[
            Column::integer("nomis_booking_id", "nomisBookingId"),
            Column::integer("nomis_sentence_sequence", "nomisSentenceSequence"),
        ],
        new: &[Column::text("dps_sentence_id", "dpsSentenceId")],
        parent: Some("dpsCourtCaseId"),
        owner: None,
        retention: None,
    };

    #[test]
    fn ddl_declares_both_unique_keys() {
        let sql = SENTENCES.create_sql();
        assert!(sql.contains("PRIMARY KEY (dps_sentence_id)"));
        assert!(sql.contains("UNIQUE (nomis_booking_id, nomis_sentence_sequence)"));
        assert!(sql.contains("nomis_sentence_sequence INTEGER NOT NULL"));
    }

    #[test]
    fn predicates_number_parameters_from_offset() {
        assert_eq!(
            SENTENCES.legacy_predicate(2),
            "nomis_booking_id = ?2 AND nomis_sentence_sequence = ?3"
        );
        assert_eq!(SENTENCES.new_predicate(1), "dps_sentence_id = ?1");
    }

    #[test]
    fn layout_checks_arity_and_kind() {
        assert!(SENTENCES.check_layout::<(i64, i64), String>().is_ok());
        assert!(SENTENCES.check_layout::<i64, String>().is_err());
        assert!(SENTENCES.check_legacy_key(&[KeyValue::Integer(1), KeyValue::Text("x".into())]).is_err());
        assert!(SENTENCES.check_new_key(&[KeyValue::Text("s-1".into())]).is_ok());
    }
}
