use crosswalk_core::{Mapping, MappingType};
use crosswalk_engine::{Engine, EngineConfig, EngineError, MappingService, kinds};
use crosswalk_storage::MappingKind;
use uuid::Uuid;

/// An engine over a private in-memory database, with typed accessors for
/// the kinds the suites exercise.
pub struct TestEngine {
    pub engine: Engine,
}

impl TestEngine {
    pub fn new() -> Result<Self, EngineError> {
        Ok(Self {
            engine: Engine::in_memory()?,
        })
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            engine: Engine::open(config)?,
        })
    }

    pub fn with_kinds(kinds: &[&'static MappingKind]) -> Result<Self, EngineError> {
        Ok(Self {
            engine: Engine::open_with_kinds(EngineConfig::default(), kinds)?,
        })
    }

    pub fn court_cases(&self) -> Result<MappingService<i64>, EngineError> {
        self.engine.mappings(&kinds::COURT_CASES)
    }

    pub fn court_appearances(&self) -> Result<MappingService<i64>, EngineError> {
        self.engine.mappings(&kinds::COURT_APPEARANCES)
    }

    pub fn court_charges(&self) -> Result<MappingService<i64>, EngineError> {
        self.engine.mappings(&kinds::COURT_CHARGES)
    }

    pub fn sentences(&self) -> Result<MappingService<(i64, i64)>, EngineError> {
        self.engine.mappings(&kinds::SENTENCES)
    }

    pub fn alerts(&self) -> Result<MappingService<(i64, i64), Uuid>, EngineError> {
        self.engine.mappings(&kinds::ALERTS)
    }

    pub fn profile_details(&self) -> Result<MappingService<(i64, String)>, EngineError> {
        self.engine.mappings(&kinds::PROFILE_DETAIL_SYNC)
    }

    /// Registers `count` migrated court cases under `label`, legacy ids
    /// counting up from `first`. New ids are `dps-<legacy>`.
    pub fn seed_court_cases(
        &self,
        label: &str,
        first: i64,
        count: i64,
    ) -> Result<Vec<Mapping<i64>>, EngineError> {
        let service = self.court_cases()?;
        let mut seeded = Vec::new();
        for legacy in first..first + count {
            let mapping = migrated_case(legacy, label);
            service.register_mapping(mapping.clone())?;
            seeded.push(mapping);
        }
        Ok(seeded)
    }
}

/// A court case created in the new system and synced back.
pub fn court_case(legacy: i64, dps: &str) -> Mapping<i64> {
    Mapping::new(legacy, dps.to_string(), MappingType::created("DPS"))
}

pub fn migrated_case(legacy: i64, label: &str) -> Mapping<i64> {
    Mapping::migrated(legacy, format!("dps-{legacy}"), label)
}
