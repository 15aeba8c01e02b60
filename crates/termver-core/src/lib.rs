//! Termver Core Library
//!
//! Version publication and change comparison for multi-tenant terminology
//! content: incremental configuration and validation of a versioning
//! attempt, locked publication across tooling areas, immutable version
//! records, and predicate-based pruning of hierarchical change trees.

pub mod compare;
pub mod domain;
pub mod lock;
pub mod orchestrator;
pub mod publish;
pub mod telemetry;
pub mod validation;

pub use compare::{filter, filter_with, ChangeKind, CompareResult, DiffArena, NodeDiff, NodeId};

pub use domain::{Result, ValidationError, VersioningConfiguration, VersioningError};

pub use lock::{LockCoordinator, CONFIGURE_VERSION};

pub use orchestrator::{
    OrchestratorState, VersioningOrchestrator, VersioningOutcome, VersioningResult,
    DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT,
};

pub use publish::{PluginRegistry, PublishManager, PublishOutcome, TerminologyPlugin};

pub use validation::{platform_epoch, validate_version_name, TimeValidator};

/// Crate version, exposed for diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
