use crosswalk_core::{KeyValue, Mapping, MappingKey, MappingRow};
use crosswalk_storage::{MappingKind, PlannedWrite, SqliteStore, UnitOutcome};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::register::DuplicateMapping;

/// All planned writes for one aggregate: a parent row plus its dependent
/// children, and any legacy-id rewrites of rows already registered.
/// Committed once, in one transaction.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    label: Option<String>,
    writes: Vec<PlannedWrite>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every created row without its own label gets `label`.
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            writes: Vec::new(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn create<L: MappingKey, N: MappingKey>(
        &mut self,
        kind: &'static MappingKind,
        mapping: &Mapping<L, N>,
    ) -> Result<&mut Self, EngineError> {
        kind.check_layout::<L, N>()?;
        self.create_row(kind, mapping.to_row())
    }

    pub fn create_row(
        &mut self,
        kind: &'static MappingKind,
        mut row: MappingRow,
    ) -> Result<&mut Self, EngineError> {
        if row.label.is_none() {
            row.label = self.label.clone();
        }
        kind.check_row(&row)?;
        self.writes.push(PlannedWrite::Insert { kind, row });
        Ok(self)
    }

    /// Rewrites the legacy id of the row registered under `new_id`.
    pub fn relabel<L: MappingKey, N: MappingKey>(
        &mut self,
        kind: &'static MappingKind,
        new_id: &N,
        legacy_id: &L,
    ) -> Result<&mut Self, EngineError> {
        kind.check_layout::<L, N>()?;
        self.relabel_row(kind, new_id.key_values(), legacy_id.key_values())
    }

    pub fn relabel_row(
        &mut self,
        kind: &'static MappingKind,
        new_id: Vec<KeyValue>,
        legacy_id: Vec<KeyValue>,
    ) -> Result<&mut Self, EngineError> {
        kind.check_new_key(&new_id)?;
        kind.check_legacy_key(&legacy_id)?;
        self.writes.push(PlannedWrite::Relabel {
            kind,
            new_id,
            legacy_id,
        });
        Ok(self)
    }
}

/// A unique-key collision inside a unit of work, with the kind it hit.
#[derive(Debug, Clone)]
pub struct RowConflict {
    pub kind: &'static MappingKind,
    pub rows: DuplicateMapping<MappingRow>,
}

#[derive(Debug, Clone)]
pub enum AggregateOutcome {
    /// Rows as stored, in write order.
    Committed(Vec<MappingRow>),
    Conflict(RowConflict),
}

/// Result for one aggregate of a multi-aggregate submission.
#[derive(Debug)]
pub struct AggregateResult {
    pub index: usize,
    pub outcome: Result<AggregateOutcome, EngineError>,
}

/// Registers aggregates as independent units of work.
#[derive(Clone)]
pub struct BatchComposer {
    store: SqliteStore,
}

impl BatchComposer {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    /// Commits one aggregate: all of its rows or none of them.
    pub fn register(&self, unit: &UnitOfWork) -> Result<AggregateOutcome, EngineError> {
        if unit.is_empty() {
            return Err(EngineError::Validation("aggregate has no rows".into()));
        }

        match self.store.apply_unit(&unit.writes)? {
            UnitOutcome::Committed(rows) => {
                info!(label = ?unit.label, rows = rows.len(), "registered aggregate");
                Ok(AggregateOutcome::Committed(rows))
            }
            UnitOutcome::Rejected { index } => {
                let conflict = self.describe_conflict(&unit.writes[index], &unit.writes[..index])?;
                info!(
                    label = ?unit.label,
                    table = conflict.kind.table,
                    "aggregate rejected on duplicate mapping"
                );
                Ok(AggregateOutcome::Conflict(conflict))
            }
            UnitOutcome::Missing { index } => {
                let write = &unit.writes[index];
                Err(EngineError::not_found(
                    write.kind().table,
                    format!("no row to relabel at write {index}"),
                ))
            }
        }
    }

    /// Best-effort over many aggregates: each one commits or fails on its
    /// own, and earlier commits stay in place when a later one fails.
    pub fn register_all(&self, units: &[UnitOfWork]) -> Vec<AggregateResult> {
        units
            .iter()
            .enumerate()
            .map(|(index, unit)| {
                let outcome = self.register(unit);
                if let Err(e) = &outcome {
                    warn!(index, error = %e, "aggregate registration failed");
                }
                AggregateResult { index, outcome }
            })
            .collect()
    }

    /// Re-reads the row the rejected write collided with. The unit was
    /// rolled back, so a stored match predates it; otherwise the collision
    /// was with an earlier write of the same unit.
    fn describe_conflict(
        &self,
        write: &PlannedWrite,
        earlier: &[PlannedWrite],
    ) -> Result<RowConflict, EngineError> {
        let kind = write.kind();
        let (duplicate, existing) = match write {
            PlannedWrite::Insert { row, .. } => {
                let by_new = self
                    .store
                    .find_by_new_id(kind, &row.new_id)?
                    .filter(|found| found.legacy_id != row.legacy_id);
                let existing = match by_new {
                    Some(found) => Some(found),
                    None => self.store.find_by_legacy_id(kind, &row.legacy_id)?,
                };
                (row.clone(), existing)
            }
            PlannedWrite::Relabel {
                new_id, legacy_id, ..
            } => {
                let mut duplicate = self
                    .store
                    .find_by_new_id(kind, new_id)?
                    .ok_or_else(|| EngineError::not_found(kind.table, "relabel target vanished"))?;
                duplicate.legacy_id = legacy_id.clone();
                let existing = self.store.find_by_legacy_id(kind, legacy_id)?;
                (duplicate, existing)
            }
        };

        let existing = match existing {
            Some(found) => found,
            None => self.collides_with_earlier(kind, &duplicate, earlier)?.ok_or_else(|| {
                EngineError::Unexpected(format!(
                    "{} rejected a write but no colliding row is visible",
                    kind.table
                ))
            })?,
        };
        Ok(RowConflict {
            kind,
            rows: DuplicateMapping {
                duplicate,
                existing,
            },
        })
    }

    /// Finds the earlier write of the same unit that claimed one of
    /// `duplicate`'s ids. A relabel is rebuilt from the stored row, since
    /// the rollback put its old legacy id back.
    fn collides_with_earlier(
        &self,
        kind: &'static MappingKind,
        duplicate: &MappingRow,
        earlier: &[PlannedWrite],
    ) -> Result<Option<MappingRow>, EngineError> {
        for write in earlier {
            match write {
                PlannedWrite::Insert { kind: k, row }
                    if std::ptr::eq(*k, kind)
                        && !row.same_pair(duplicate)
                        && (row.new_id == duplicate.new_id
                            || row.legacy_id == duplicate.legacy_id) =>
                {
                    return Ok(Some(row.clone()));
                }
                PlannedWrite::Relabel {
                    kind: k,
                    new_id,
                    legacy_id,
                } if std::ptr::eq(*k, kind)
                    && *legacy_id == duplicate.legacy_id
                    && *new_id != duplicate.new_id =>
                {
                    if let Some(mut relabelled) = self.store.find_by_new_id(kind, new_id)? {
                        relabelled.legacy_id = legacy_id.clone();
                        return Ok(Some(relabelled));
                    }
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds;
    use crosswalk_core::MappingType;

    #[test]
    fn unit_label_fills_unlabelled_rows_only() {
        let mut unit = UnitOfWork::labelled("run-1");
        unit.create(&kinds::COURT_CASES, &Mapping::new(1_i64, "c-1".to_string(), MappingType::Migrated))
            .unwrap()
            .create(&kinds::COURT_CASES, &Mapping::migrated(2_i64, "c-2".to_string(), "own"))
            .unwrap();

        let labels: Vec<_> = unit
            .writes
            .iter()
            .map(|w| match w {
                PlannedWrite::Insert { row, .. } => row.label.clone(),
                PlannedWrite::Relabel { .. } => None,
            })
            .collect();
        assert_eq!(labels, vec![Some("run-1".to_string()), Some("own".to_string())]);
    }

    #[test]
    fn relabel_checks_key_layout() {
        let mut unit = UnitOfWork::new();
        assert!(unit.relabel(&kinds::SENTENCES, &"s-1".to_string(), &1_i64).is_err());
        assert!(unit.relabel(&kinds::SENTENCES, &"s-1".to_string(), &(1_i64, 2_i64)).is_ok());
        assert_eq!(unit.len(), 1);
    }
}
