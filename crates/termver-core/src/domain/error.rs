//! Domain-level error taxonomy for the versioning core.

use chrono::NaiveDate;
use termver_store::{LockError, RepositoryId, StoreError};

/// Errors produced by version name and effective time validation.
///
/// Validators return these as values so callers can render several field
/// errors at once instead of unwinding on the first.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("version name must not be empty")]
    EmptyVersionId,

    #[error("version name '{word}' is a reserved word")]
    ReservedWord { word: String },

    #[error("version name '{version_id}' contains whitespace or a reserved character")]
    IllegalCharacter { version_id: String },

    #[error("version name '{version_id}' is already in use")]
    DuplicateVersionId { version_id: String },

    #[error("version name '{version_id}' must contain at least one non-digit character")]
    AllDigits { version_id: String },

    #[error("effective time {candidate} must be after {floor}")]
    EffectiveTimeNotAfter {
        candidate: NaiveDate,
        floor: NaiveDate,
    },

    #[error("effective time {candidate} is outside the supported calendar range")]
    EffectiveTimeOutOfBounds { candidate: NaiveDate },
}

/// Versioning workflow errors.
///
/// Each workflow failure is a distinct variant so calling layers can map
/// them to distinct user-facing statuses without inspecting messages.
#[derive(Debug, thiserror::Error)]
pub enum VersioningError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("cannot create new version: content is not available for repository {repository}")]
    NoContent { repository: RepositoryId },

    #[error("cannot create new version: no changes have been made in repository {repository}")]
    NoChanges { repository: RepositoryId },

    #[error("version '{version_id}' already exists for code system {short_name}")]
    AlreadyExists {
        short_name: String,
        version_id: String,
    },

    #[error("lock acquisition failed: {0}")]
    Lock(#[from] LockError),

    #[error("commit failed while versioning {terminology} with '{version_id}': {source}")]
    Commit {
        terminology: String,
        version_id: String,
        #[source]
        source: StoreError,
    },

    #[error("versioning job failed: {0}")]
    Job(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("no publish strategy registered for tooling id '{0}'")]
    UnknownTooling(String),

    #[error("versioning configuration is incomplete: {0}")]
    ConfigurationIncomplete(String),

    #[error("versioning configuration has already been executed")]
    ConfigurationConsumed,
}

/// Result type for versioning operations.
pub type Result<T> = std::result::Result<T, VersioningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display_names_the_field() {
        let err = ValidationError::ReservedWord {
            word: "MAIN".to_string(),
        };
        assert!(err.to_string().contains("MAIN"));
        assert!(err.to_string().contains("reserved"));

        let err = ValidationError::AllDigits {
            version_id: "20210131".to_string(),
        };
        assert!(err.to_string().contains("non-digit"));
    }

    #[test]
    fn workflow_errors_are_distinguishable() {
        let repo = RepositoryId::new();
        assert!(matches!(
            VersioningError::NoContent { repository: repo },
            VersioningError::NoContent { .. }
        ));

        let err = VersioningError::AlreadyExists {
            short_name: "SNOMEDCT".to_string(),
            version_id: "2021-07-31".to_string(),
        };
        assert!(err.to_string().contains("2021-07-31"));
    }

    #[test]
    fn commit_error_carries_context() {
        let err = VersioningError::Commit {
            terminology: "SNOMED CT".to_string(),
            version_id: "2021-07-31".to_string(),
            source: StoreError::Commit {
                branch: "MAIN".to_string(),
                reason: "conflict".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("SNOMED CT"));
        assert!(msg.contains("2021-07-31"));
    }
}
