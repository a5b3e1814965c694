use crosswalk_core::{Mapping, MappingKey};
use crosswalk_storage::{InsertOutcome, MappingStore};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::service::MappingService;

/// Both sides of a uniqueness collision, verbatim.
#[derive(Debug, Clone)]
pub struct DuplicateMapping<T> {
    pub duplicate: T,
    pub existing: T,
}

#[derive(Debug, Clone)]
pub enum RegisterOutcome<L, N> {
    Inserted(Mapping<L, N>),
    /// The identical pair was already registered; nothing was written.
    Unchanged(Mapping<L, N>),
    Conflict(DuplicateMapping<Mapping<L, N>>),
}

impl<L, N> RegisterOutcome<L, N> {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Conflict(_))
    }
}

impl<L, N, S> MappingService<L, N, S>
where
    L: MappingKey,
    N: MappingKey,
    S: MappingStore<L, N>,
{
    /// Registers one mapping.
    ///
    /// The lookups before the insert catch the common case; the table's
    /// unique keys catch the rest. A racing insert that the constraint
    /// rejects is re-read and reported as the same `Conflict` a sequential
    /// caller would have seen.
    pub fn register_mapping(
        &self,
        mapping: Mapping<L, N>,
    ) -> Result<RegisterOutcome<L, N>, EngineError> {
        mapping.validate()?;

        if let Some(existing) = self.store.find_by_new_id(&mapping.new_id)? {
            if existing.legacy_id == mapping.legacy_id {
                return Ok(RegisterOutcome::Unchanged(existing));
            }
            return Ok(self.conflict(mapping, existing));
        }
        if let Some(existing) = self.store.find_by_legacy_id(&mapping.legacy_id)? {
            return Ok(self.conflict(mapping, existing));
        }

        match self.store.create(&mapping)? {
            InsertOutcome::Inserted(stored) => {
                debug!(table = self.kind().table, "registered mapping");
                Ok(RegisterOutcome::Inserted(stored))
            }
            InsertOutcome::Unchanged(existing) => Ok(RegisterOutcome::Unchanged(existing)),
            InsertOutcome::Rejected => match self.colliding_row(&mapping)? {
                Some(existing) => Ok(self.conflict(mapping, existing)),
                None => Err(EngineError::Unexpected(format!(
                    "{} rejected an insert but no colliding row is visible",
                    self.kind().table
                ))),
            },
        }
    }

    fn colliding_row(&self, mapping: &Mapping<L, N>) -> Result<Option<Mapping<L, N>>, EngineError> {
        if let Some(existing) = self.store.find_by_new_id(&mapping.new_id)? {
            return Ok(Some(existing));
        }
        Ok(self.store.find_by_legacy_id(&mapping.legacy_id)?)
    }

    fn conflict(&self, duplicate: Mapping<L, N>, existing: Mapping<L, N>) -> RegisterOutcome<L, N> {
        info!(
            table = self.kind().table,
            duplicate = ?duplicate.legacy_id,
            existing = ?existing.legacy_id,
            "duplicate mapping rejected"
        );
        RegisterOutcome::Conflict(DuplicateMapping {
            duplicate,
            existing,
        })
    }
}
