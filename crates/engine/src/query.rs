use crosswalk_core::{Mapping, MappingKey, Page, PageRequest};
use crosswalk_storage::MappingStore;

use crate::error::EngineError;
use crate::service::MappingService;

impl<L, N, S> MappingService<L, N, S>
where
    L: MappingKey,
    N: MappingKey,
    S: MappingStore<L, N>,
{
    pub fn find_by_legacy_id(&self, legacy_id: &L) -> Result<Mapping<L, N>, EngineError> {
        self.store
            .find_by_legacy_id(legacy_id)?
            .ok_or_else(|| EngineError::not_found(self.kind().table, format!("legacy id {legacy_id:?}")))
    }

    pub fn find_by_new_id(&self, new_id: &N) -> Result<Mapping<L, N>, EngineError> {
        self.store
            .find_by_new_id(new_id)?
            .ok_or_else(|| EngineError::not_found(self.kind().table, format!("new id {new_id:?}")))
    }

    /// A page of one migration run. `page` defaults to the first page of
    /// the configured default size.
    pub fn find_all_by_label(
        &self,
        label: &str,
        page: Option<PageRequest>,
    ) -> Result<Page<Mapping<L, N>>, EngineError> {
        let page = page.unwrap_or(PageRequest::new(0, self.limits.default_size));
        page.validate(self.limits.max_size)?;
        Ok(self.store.find_all_by_label(label, page)?)
    }

    pub fn count_by_label(&self, label: &str, include_provisional: bool) -> Result<u64, EngineError> {
        Ok(self.store.count_by_label(label, include_provisional)?)
    }

    /// The most recently created `MIGRATED` row across all runs.
    pub fn find_latest_migrated(&self) -> Result<Mapping<L, N>, EngineError> {
        self.store
            .find_latest_migrated()?
            .ok_or_else(|| EngineError::not_found(self.kind().table, "no migrated mappings"))
    }
}
