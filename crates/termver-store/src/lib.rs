//! Termver-Store: Collaborator Layer for the Versioning Core
//!
//! This crate defines the external services the version publication
//! workflow depends on, as backend-agnostic async traits: the branch-aware
//! content store, the version registry, the process-wide operation lock
//! manager, the asynchronous job executor, and the branch oracle.
//!
//! ## Key Components
//!
//! - `ContentStore` / `VersionRegistry`: content and release persistence
//! - `OperationLockManager`: shared (repository, branch) mutual exclusion
//! - `fakes`: in-memory implementations for every trait

mod error;
pub mod fakes;
mod lock_manager;
pub mod traits;

pub use error::{LockError, StoreError};
pub use lock_manager::OperationLockManager;
pub use traits::{
    fake_last_update_time, BranchOracle, BranchPath, Component, ComponentId, ContentStore,
    JobExecutor, JobId, JobRequest, JobStatus, LockContext, LockManager, LockMode, LockTarget,
    RepositoryId, StoreResult, VersionRecord, VersionRegistry, VersionSearchFilter, MAIN_BRANCH,
};
