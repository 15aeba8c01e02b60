//! Error types for termver-store

use thiserror::Error;

/// Errors that can occur in the store collaborator layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// Component lookup failed
    #[error("Component not found on branch '{branch}': {id}")]
    ComponentNotFound { branch: String, id: String },

    /// Branch lookup failed
    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    /// Version lookup failed
    #[error("Version not found: {short_name}/{version_id}")]
    VersionNotFound {
        short_name: String,
        version_id: String,
    },

    /// A version record with the same identifier already exists
    #[error("Version already exists: {short_name}/{version_id}")]
    VersionAlreadyExists {
        short_name: String,
        version_id: String,
    },

    /// Transactional commit failed; staged writes were discarded
    #[error("Commit failed on branch '{branch}': {reason}")]
    Commit { branch: String, reason: String },

    /// Job lookup failed
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Errors produced by the operation lock manager
#[derive(Error, Debug)]
pub enum LockError {
    /// The target is held by another lock context
    #[error("Lock target {target} is already held by '{owner}'")]
    AlreadyHeld { target: String, owner: String },

    /// Blocking acquisition gave up after exhausting its retry budget
    #[error("Timed out waiting for lock target {target}")]
    Timeout { target: String },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
