pub mod batch;
pub mod config;
pub mod deletion;
pub mod error;
pub mod json;
pub mod kinds;
pub mod owner;
pub mod query;
pub mod register;
pub mod resource;
pub mod retention;
pub mod service;

pub use batch::{AggregateOutcome, AggregateResult, BatchComposer, RowConflict, UnitOfWork};
pub use config::EngineConfig;
pub use error::{EngineError, ErrorClass};
pub use register::{DuplicateMapping, RegisterOutcome};
pub use resource::{ApiResponse, BatchResource, MappingResource};
pub use retention::{MIN_SWEEP_PERIOD, RetentionSweep, SweepReport, SweepStats};
pub use service::{MappingService, PageLimits};

use crosswalk_core::{Hlc, MappingKey};
use crosswalk_storage::{MappingKind, MappingTable, SqliteStore};
use tokio::task::JoinHandle;
use tracing::info;

/// Entry point: one store shared by every kind, plus the settings the
/// services and the retention sweep read.
#[derive(Clone)]
pub struct Engine {
    store: SqliteStore,
    config: EngineConfig,
}

impl Engine {
    /// Opens the configured database with the built-in kinds.
    pub fn open(config: EngineConfig) -> Result<Self, EngineError> {
        Self::open_with_kinds(config, &kinds::ALL)
    }

    pub fn open_with_kinds(
        config: EngineConfig,
        kinds: &[&'static MappingKind],
    ) -> Result<Self, EngineError> {
        let store = match &config.database_path {
            Some(path) => SqliteStore::open(path, kinds)?,
            None => SqliteStore::open_in_memory(kinds)?,
        };
        info!(
            path = ?config.database_path,
            kinds = kinds.len(),
            "opened crosswalk store"
        );
        Ok(Self { store, config })
    }

    pub fn in_memory() -> Result<Self, EngineError> {
        Self::open(EngineConfig::default())
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Typed operations for one kind. Fails when the key types do not fit
    /// the kind's columns or the kind was not opened with this engine.
    pub fn mappings<L: MappingKey, N: MappingKey>(
        &self,
        kind: &'static MappingKind,
    ) -> Result<MappingService<L, N>, EngineError> {
        let table = MappingTable::new(self.store.clone(), kind)?;
        Ok(MappingService::new(table, PageLimits::from(&self.config)))
    }

    pub fn resource<L: MappingKey, N: MappingKey>(
        &self,
        kind: &'static MappingKind,
    ) -> Result<MappingResource<L, N>, EngineError> {
        Ok(MappingResource::new(self.mappings(kind)?))
    }

    pub fn composer(&self) -> BatchComposer {
        BatchComposer::new(self.store.clone())
    }

    pub fn batch_resource(&self) -> BatchResource {
        BatchResource::new(self.store.clone())
    }

    pub fn retention(&self) -> RetentionSweep {
        RetentionSweep::new(self.store.clone())
    }

    /// Spawns the retention sweep when it is enabled and some kind declares
    /// a retention age. Must be called inside a tokio runtime.
    pub fn start_retention(&self) -> Option<JoinHandle<()>> {
        if !self.config.retention_enabled {
            return None;
        }
        let sweep = self.retention();
        if sweep.kinds().is_empty() {
            return None;
        }
        info!(
            interval_ms = self.config.retention_interval.as_millis() as u64,
            "starting retention sweep"
        );
        Some(sweep.spawn(self.config.retention_interval))
    }

    /// Stamp for use as a later [`Engine::rollback_after`] checkpoint.
    pub fn checkpoint(&self) -> Result<Hlc, EngineError> {
        Ok(self.store.now()?)
    }

    /// Rewrites the owner on every kind that has an owner column. Returns
    /// the tables touched with their row counts.
    pub fn propagate_merge(
        &self,
        old_owner: &str,
        new_owner: &str,
    ) -> Result<Vec<(&'static str, u64)>, EngineError> {
        owner::propagate_merge(&self.store, old_owner, new_owner)
    }

    /// Deletes every row whose parent is `parent_id`, across all kinds.
    pub fn delete_aggregate(&self, parent_id: &str) -> Result<u64, EngineError> {
        deletion::delete_aggregate(&self.store, parent_id)
    }

    /// Deletes every row created after `checkpoint`, across all kinds.
    pub fn rollback_after(&self, checkpoint: Hlc) -> Result<u64, EngineError> {
        deletion::rollback_after(&self.store, checkpoint)
    }
}
