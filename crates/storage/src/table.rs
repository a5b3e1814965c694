use std::marker::PhantomData;

use crosswalk_core::{Hlc, Mapping, MappingKey, Page, PageRequest};

use crate::error::StorageError;
use crate::kind::MappingKind;
use crate::sqlite::SqliteStore;
use crate::traits::{InsertOutcome, MappingStore};

/// Typed view of one crosswalk table, generic over the legacy and
/// new-system key types.
pub struct MappingTable<L, N = String> {
    store: SqliteStore,
    kind: &'static MappingKind,
    _keys: PhantomData<fn() -> (L, N)>,
}

impl<L: MappingKey, N: MappingKey> MappingTable<L, N> {
    pub fn new(store: SqliteStore, kind: &'static MappingKind) -> Result<Self, StorageError> {
        kind.check_layout::<L, N>()?;
        if store.kind(kind.table).is_none() {
            return Err(StorageError::NotFound(format!("table {} is not registered", kind.table)));
        }
        Ok(Self {
            store,
            kind,
            _keys: PhantomData,
        })
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }
}

impl<L, N> Clone for MappingTable<L, N> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            kind: self.kind,
            _keys: PhantomData,
        }
    }
}

fn typed<L: MappingKey, N: MappingKey>(
    row: Option<crosswalk_core::MappingRow>,
) -> Result<Option<Mapping<L, N>>, StorageError> {
    Ok(row.map(Mapping::<L, N>::from_row).transpose()?)
}

impl<L: MappingKey, N: MappingKey> MappingStore<L, N> for MappingTable<L, N> {
    fn kind(&self) -> &'static MappingKind {
        self.kind
    }

    fn create(&self, mapping: &Mapping<L, N>) -> Result<InsertOutcome<Mapping<L, N>>, StorageError> {
        self.store
            .insert(self.kind, &mapping.to_row())?
            .try_map(|row| Ok(Mapping::from_row(row)?))
    }

    fn find_by_legacy_id(&self, legacy_id: &L) -> Result<Option<Mapping<L, N>>, StorageError> {
        typed(self.store.find_by_legacy_id(self.kind, &legacy_id.key_values())?)
    }

    fn find_by_new_id(&self, new_id: &N) -> Result<Option<Mapping<L, N>>, StorageError> {
        typed(self.store.find_by_new_id(self.kind, &new_id.key_values())?)
    }

    fn find_all_by_label(
        &self,
        label: &str,
        page: PageRequest,
    ) -> Result<Page<Mapping<L, N>>, StorageError> {
        self.store
            .find_all_by_label(self.kind, label, page)?
            .try_map(|row| Ok(Mapping::from_row(row)?))
    }

    fn count_by_label(&self, label: &str, include_provisional: bool) -> Result<u64, StorageError> {
        self.store.count_by_label(self.kind, label, include_provisional)
    }

    fn find_latest_migrated(&self) -> Result<Option<Mapping<L, N>>, StorageError> {
        typed(self.store.find_latest_migrated(self.kind)?)
    }

    fn delete_by_new_id(&self, new_id: &N) -> Result<u64, StorageError> {
        self.store.delete_by_new_id(self.kind, &new_id.key_values())
    }

    fn delete_by_parent_id(&self, parent_id: &str) -> Result<u64, StorageError> {
        self.store.delete_by_parent_id(self.kind, parent_id)
    }

    fn delete_created_after(&self, checkpoint: Hlc) -> Result<u64, StorageError> {
        self.store.delete_created_after(self.kind, checkpoint)
    }

    fn rewrite_owner(&self, old_owner: &str, new_owner: &str) -> Result<u64, StorageError> {
        self.store.rewrite_owner(self.kind, old_owner, new_owner)
    }

    fn rewrite_owner_for_aggregate(
        &self,
        aggregate_id: &str,
        new_owner: &str,
    ) -> Result<Vec<Mapping<L, N>>, StorageError> {
        self.store
            .rewrite_owner_for_aggregate(self.kind, aggregate_id, new_owner)?
            .into_iter()
            .map(|row| Ok(Mapping::from_row(row)?))
            .collect()
    }
}
