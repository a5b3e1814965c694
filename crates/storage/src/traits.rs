use crosswalk_core::{Hlc, KeyValue, Mapping, MappingKey, MappingRow, Page, PageRequest};

use crate::error::StorageError;
use crate::kind::MappingKind;

/// Result of a single insert attempt against the table's unique keys.
#[derive(Debug, Clone)]
pub enum InsertOutcome<T> {
    /// New row written; carries the stored row with its creation stamp.
    Inserted(T),
    /// The identical pair was already present; carries the existing row.
    Unchanged(T),
    /// A unique key already maps to a different counterpart.
    Rejected,
}

impl<T> InsertOutcome<T> {
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<InsertOutcome<U>, E> {
        Ok(match self {
            Self::Inserted(t) => InsertOutcome::Inserted(f(t)?),
            Self::Unchanged(t) => InsertOutcome::Unchanged(f(t)?),
            Self::Rejected => InsertOutcome::Rejected,
        })
    }
}

/// One planned write inside an aggregate's unit of work.
#[derive(Debug, Clone)]
pub enum PlannedWrite {
    Insert {
        kind: &'static MappingKind,
        row: MappingRow,
    },
    /// Rewrite the legacy id of an already-registered row.
    Relabel {
        kind: &'static MappingKind,
        new_id: Vec<KeyValue>,
        legacy_id: Vec<KeyValue>,
    },
}

impl PlannedWrite {
    pub fn kind(&self) -> &'static MappingKind {
        match self {
            Self::Insert { kind, .. } | Self::Relabel { kind, .. } => kind,
        }
    }
}

#[derive(Debug, Clone)]
pub enum UnitOutcome {
    /// Every write applied; rows are in write order.
    Committed(Vec<MappingRow>),
    /// The write at `index` hit a unique key; nothing was kept.
    Rejected { index: usize },
    /// The relabel at `index` found no row; nothing was kept.
    Missing { index: usize },
}

/// Typed crosswalk store for one entity kind.
pub trait MappingStore<L: MappingKey, N: MappingKey> {
    fn kind(&self) -> &'static MappingKind;

    fn create(&self, mapping: &Mapping<L, N>) -> Result<InsertOutcome<Mapping<L, N>>, StorageError>;

    fn find_by_legacy_id(&self, legacy_id: &L) -> Result<Option<Mapping<L, N>>, StorageError>;

    fn find_by_new_id(&self, new_id: &N) -> Result<Option<Mapping<L, N>>, StorageError>;

    fn find_all_by_label(
        &self,
        label: &str,
        page: PageRequest,
    ) -> Result<Page<Mapping<L, N>>, StorageError>;

    fn count_by_label(&self, label: &str, include_provisional: bool) -> Result<u64, StorageError>;

    fn find_latest_migrated(&self) -> Result<Option<Mapping<L, N>>, StorageError>;

    fn delete_by_new_id(&self, new_id: &N) -> Result<u64, StorageError>;

    fn delete_by_parent_id(&self, parent_id: &str) -> Result<u64, StorageError>;

    fn delete_created_after(&self, checkpoint: Hlc) -> Result<u64, StorageError>;

    fn rewrite_owner(&self, old_owner: &str, new_owner: &str) -> Result<u64, StorageError>;

    fn rewrite_owner_for_aggregate(
        &self,
        aggregate_id: &str,
        new_owner: &str,
    ) -> Result<Vec<Mapping<L, N>>, StorageError>;
}
