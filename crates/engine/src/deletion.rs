use crosswalk_core::{Hlc, MappingKey};
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
    /// Idempotent; returns whether a row was removed.
    pub fn delete_by_new_id(&self, new_id: &N) -> Result<bool, EngineError> {
        Ok(self.store.delete_by_new_id(new_id)? > 0)
    }

    /// Removes every row owned by `parent_id`. Callers re-migrating an
    /// aggregate run this first; nothing else reconciles partial state.
    pub fn delete_by_parent_id(&self, parent_id: &str) -> Result<u64, EngineError> {
        Ok(self.store.delete_by_parent_id(parent_id)?)
    }

    /// Removes rows stamped after `checkpoint`.
    pub fn delete_created_after(&self, checkpoint: Hlc) -> Result<u64, EngineError> {
        Ok(self.store.delete_created_after(checkpoint)?)
    }
}

/// Cascades a parent removal into every kind that has a parent column.
pub(crate) fn delete_aggregate(store: &SqliteStore, parent_id: &str) -> Result<u64, EngineError> {
    let mut total = 0;
    for kind in store.kinds().iter().copied().filter(|k| k.parent.is_some()) {
        total += store.delete_by_parent_id(kind, parent_id)?;
    }
    info!(parent_id, deleted = total, "cascaded aggregate delete");
    Ok(total)
}

/// Rolls every kind back to `checkpoint`.
pub(crate) fn rollback_after(store: &SqliteStore, checkpoint: Hlc) -> Result<u64, EngineError> {
    let mut total = 0;
    for kind in store.kinds().iter().copied() {
        total += store.delete_created_after(kind, checkpoint)?;
    }
    info!(deleted = total, "rolled back to checkpoint");
    Ok(total)
}
