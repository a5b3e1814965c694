use crosswalk_core::mapping::validate_id;
use crosswalk_core::{Mapping, MappingKey};
use crosswalk_storage::{MappingStore, SqliteStore};
use tracing::info;

use crate::error::EngineError;
use crate::service::MappingService;

impl<L, N, S> MappingService<L, N, S>
where
    L: MappingKey,
    N: MappingKey,
    S: MappingStore<L, N>,
{
    /// Moves every row owned by `old_owner` to `new_owner` in one statement.
    pub fn rewrite_owner(&self, old_owner: &str, new_owner: &str) -> Result<u64, EngineError> {
        self.require_owner_column()?;
        validate_owners(old_owner, new_owner)?;
        Ok(self.store.rewrite_owner(old_owner, new_owner)?)
    }

    /// Moves one aggregate's rows to `new_owner` and returns the rows that
    /// changed, for republishing downstream.
    pub fn rewrite_owner_for_aggregate(
        &self,
        aggregate_id: &str,
        new_owner: &str,
    ) -> Result<Vec<Mapping<L, N>>, EngineError> {
        self.require_owner_column()?;
        if self.kind().parent.is_none() {
            return Err(EngineError::Validation(format!(
                "{} has no aggregate column",
                self.kind().table
            )));
        }
        validate_id("aggregateId", aggregate_id)?;
        validate_id("ownerId", new_owner)?;
        Ok(self.store.rewrite_owner_for_aggregate(aggregate_id, new_owner)?)
    }

    fn require_owner_column(&self) -> Result<(), EngineError> {
        if self.kind().owner.is_none() {
            return Err(EngineError::Validation(format!(
                "{} has no owner column",
                self.kind().table
            )));
        }
        Ok(())
    }
}

fn validate_owners(old_owner: &str, new_owner: &str) -> Result<(), EngineError> {
    validate_id("oldOwnerId", old_owner)?;
    validate_id("ownerId", new_owner)?;
    Ok(())
}

/// Applies a person merge to every kind with an owner column. All kinds are
/// rewritten in one transaction.
pub(crate) fn propagate_merge(
    store: &SqliteStore,
    old_owner: &str,
    new_owner: &str,
) -> Result<Vec<(&'static str, u64)>, EngineError> {
    validate_owners(old_owner, new_owner)?;
    let owned: Vec<_> = store.kinds().iter().copied().filter(|k| k.owner.is_some()).collect();
    let changed = store.rewrite_owner_across(&owned, old_owner, new_owner)?;
    info!(kinds = changed.len(), "propagated owner merge");
    Ok(changed)
}
