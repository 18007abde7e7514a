//! Error types for job board operations
//!
//! Every error is `Clone`: a single in-flight cache computation hands the
//! same failure to all of its waiters.

use crate::{EntityId, EntityKind};
use thiserror::Error;

/// Entity store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {kind} with id {id}")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("Insert failed for {kind}: {reason}")]
    InsertFailed { kind: EntityKind, reason: String },

    #[error("Update failed for {kind} with id {id}: {reason}")]
    UpdateFailed {
        kind: EntityKind,
        id: EntityId,
        reason: String,
    },

    #[error("Entity store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Cache layer errors.
///
/// The read path degrades store and index failures to a miss, and the
/// invalidation path records them in its report. Only a value that cannot
/// be serialized surfaces to a `get_or_set` caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Failed to serialize value for key {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Failed to deserialize value for key {key}: {reason}")]
    Deserialization { key: String, reason: String },

    #[error("Cache store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("Tag index unavailable for tag {tag}: {reason}")]
    IndexUnavailable { tag: String, reason: String },
}

/// Input validation errors raised by domain services before any write.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidFieldValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all job board errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobBoardError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for job board operations.
pub type JobBoardResult<T> = Result<T, JobBoardError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            kind: EntityKind::Category,
            id: 7,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Entity not found"));
        assert!(msg.contains("category"));
        assert!(msg.contains('7'));
    }

    #[test]
    fn test_cache_error_display_index_unavailable() {
        let err = CacheError::IndexUnavailable {
            tag: "vacancies".to_string(),
            reason: "connection reset".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("vacancies"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_validation_error_display_invalid_field_value() {
        let err = ValidationError::InvalidFieldValue {
            field: "salary_to".to_string(),
            value: "-1".to_string(),
            reason: "must not be negative".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("salary_to"));
        assert!(msg.contains("-1"));
        assert!(msg.contains("must not be negative"));
    }

    #[test]
    fn test_job_board_error_from_variants() {
        let storage = JobBoardError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, JobBoardError::Storage(_)));

        let cache = JobBoardError::from(CacheError::StoreUnavailable {
            reason: "down".to_string(),
        });
        assert!(matches!(cache, JobBoardError::Cache(_)));

        let validation = JobBoardError::from(ValidationError::RequiredFieldMissing {
            field: "title".to_string(),
        });
        assert!(matches!(validation, JobBoardError::Validation(_)));

        let config = JobBoardError::from(ConfigError::InvalidValue {
            field: "JOBBOARD_CACHE_MAX_ENTRIES".to_string(),
            value: "many".to_string(),
            reason: "not a number".to_string(),
        });
        assert!(matches!(config, JobBoardError::Config(_)));
    }

    #[test]
    fn test_errors_clone_equal() {
        let err = JobBoardError::from(StorageError::Unavailable {
            reason: "timeout".to_string(),
        });
        assert_eq!(err.clone(), err);
    }
}
