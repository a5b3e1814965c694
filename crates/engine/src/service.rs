use std::marker::PhantomData;

use crosswalk_core::MappingKey;
use crosswalk_storage::{MappingKind, MappingStore, MappingTable};

use crate::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_size: u32,
    pub max_size: u32,
}

impl From<&EngineConfig> for PageLimits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            default_size: config.default_page_size,
            max_size: config.max_page_size,
        }
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// Per-kind mapping operations over any [`MappingStore`].
///
/// Registration lives in `register`, lookups and paging in `query`,
/// deletes in `deletion`, owner rewrites in `owner`.
pub struct MappingService<L, N = String, S = MappingTable<L, N>> {
    pub(crate) store: S,
    pub(crate) limits: PageLimits,
    _keys: PhantomData<fn() -> (L, N)>,
}

impl<L, N, S> MappingService<L, N, S>
where
    L: MappingKey,
    N: MappingKey,
    S: MappingStore<L, N>,
{
    pub fn new(store: S, limits: PageLimits) -> Self {
        Self {
            store,
            limits,
            _keys: PhantomData,
        }
    }

    pub fn kind(&self) -> &'static MappingKind {
        self.store.kind()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn limits(&self) -> PageLimits {
        self.limits
    }
}
