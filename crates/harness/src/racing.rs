use std::sync::Mutex;

use crosswalk_core::{Hlc, Mapping, MappingKey, Page, PageRequest};
use crosswalk_storage::{InsertOutcome, MappingKind, MappingStore, MappingTable, StorageError};

/// Wraps a table so that a competing registration lands between the
/// caller's lookups and its insert, once.
pub struct RacingStore<L, N = String> {
    inner: MappingTable<L, N>,
    competitor: Mutex<Option<Mapping<L, N>>>,
}

impl<L: MappingKey, N: MappingKey> RacingStore<L, N> {
    pub fn new(inner: MappingTable<L, N>, competitor: Mapping<L, N>) -> Self {
        Self {
            inner,
            competitor: Mutex::new(Some(competitor)),
        }
    }

    /// True once the competing row has been written.
    pub fn raced(&self) -> Result<bool, StorageError> {
        let pending = self.competitor.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(pending.is_none())
    }
}

impl<L: MappingKey, N: MappingKey> MappingStore<L, N> for RacingStore<L, N> {
    fn kind(&self) -> &'static MappingKind {
        self.inner.kind()
    }

    fn create(&self, mapping: &Mapping<L, N>) -> Result<InsertOutcome<Mapping<L, N>>, StorageError> {
        let competitor = self
            .competitor
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .take();
        if let Some(competitor) = competitor {
            self.inner.create(&competitor)?;
        }
        self.inner.create(mapping)
    }

    fn find_by_legacy_id(&self, legacy_id: &L) -> Result<Option<Mapping<L, N>>, StorageError> {
        self.inner.find_by_legacy_id(legacy_id)
    }

    fn find_by_new_id(&self, new_id: &N) -> Result<Option<Mapping<L, N>>, StorageError> {
        self.inner.find_by_new_id(new_id)
    }

    fn find_all_by_label(
        &self,
        label: &str,
        page: PageRequest,
    ) -> Result<Page<Mapping<L, N>>, StorageError> {
        self.inner.find_all_by_label(label, page)
    }

    fn count_by_label(&self, label: &str, include_provisional: bool) -> Result<u64, StorageError> {
        self.inner.count_by_label(label, include_provisional)
    }

    fn find_latest_migrated(&self) -> Result<Option<Mapping<L, N>>, StorageError> {
        self.inner.find_latest_migrated()
    }

    fn delete_by_new_id(&self, new_id: &N) -> Result<u64, StorageError> {
        self.inner.delete_by_new_id(new_id)
    }

    fn delete_by_parent_id(&self, parent_id: &str) -> Result<u64, StorageError> {
        self.inner.delete_by_parent_id(parent_id)
    }

    fn delete_created_after(&self, checkpoint: Hlc) -> Result<u64, StorageError> {
        self.inner.delete_created_after(checkpoint)
    }

    fn rewrite_owner(&self, old_owner: &str, new_owner: &str) -> Result<u64, StorageError> {
        self.inner.rewrite_owner(old_owner, new_owner)
    }

    fn rewrite_owner_for_aggregate(
        &self,
        aggregate_id: &str,
        new_owner: &str,
    ) -> Result<Vec<Mapping<L, N>>, StorageError> {
        self.inner.rewrite_owner_for_aggregate(aggregate_id, new_owner)
    }
}
