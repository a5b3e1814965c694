use crosswalk_core::CoreError;
use crosswalk_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("{table} mapping not found: {detail}")]
    NotFound { table: &'static str, detail: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unexpected: {0}")]
    Unexpected(String),
}

/// Caller-facing category of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Validation,
    Unexpected,
}

impl EngineError {
    pub fn not_found(table: &'static str, detail: impl Into<String>) -> Self {
        Self::NotFound {
            table,
            detail: detail.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::Validation(_)
            | Self::Core(CoreError::Validation { .. })
            | Self::Storage(StorageError::Core(CoreError::Validation { .. })) => {
                ErrorClass::Validation
            }
            _ => ErrorClass::Unexpected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_validation_classifies_as_validation() {
        let core = || CoreError::validation("label", "too long");
        assert_eq!(EngineError::from(core()).class(), ErrorClass::Validation);
        assert_eq!(
            EngineError::from(StorageError::Core(core())).class(),
            ErrorClass::Validation
        );
        assert_eq!(
            EngineError::from(StorageError::LockPoisoned).class(),
            ErrorClass::Unexpected
        );
        assert_eq!(EngineError::not_found("t", "x").class(), ErrorClass::NotFound);
    }
}
