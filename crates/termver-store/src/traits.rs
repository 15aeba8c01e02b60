//! Collaborator trait definitions for the termver core
//!
//! These traits define the external services the versioning workflow talks to:
//! - `ContentStore`: branch-aware component reads/writes with atomic commits
//! - `VersionRegistry`: immutable version records per code system
//! - `LockManager`: process-wide (repository, branch) mutual exclusion
//! - `JobExecutor`: asynchronous hand-off for long publications
//! - `BranchOracle`: branch head/base timestamps and content availability
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LockError, StoreError};

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Branch and repository identifiers
// ---------------------------------------------------------------------------

/// Slash-separated branch path, e.g. `MAIN` or `MAIN/2021-07-31`.
///
/// The inner field is private so every path is built from `main()` and
/// `child()`, keeping segments non-empty and slash-free.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchPath(String);

/// Name of the repository main branch.
pub const MAIN_BRANCH: &str = "MAIN";

impl BranchPath {
    /// The main branch of a repository.
    pub fn main() -> Self {
        BranchPath(MAIN_BRANCH.to_string())
    }

    /// Parse a slash-separated path. Empty input maps to the main branch.
    pub fn parse(path: &str) -> Self {
        if path.is_empty() {
            Self::main()
        } else {
            BranchPath(path.to_string())
        }
    }

    /// Child branch one segment below this path.
    pub fn child(&self, segment: &str) -> Self {
        BranchPath(format!("{}/{}", self.0, segment))
    }

    pub fn is_main(&self) -> bool {
        self.0 == MAIN_BRANCH
    }

    /// The final path segment (the branch's own name).
    pub fn last_segment(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of one content repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryId(Uuid);

impl RepositoryId {
    /// Generate a new random repository id.
    pub fn new() -> Self {
        RepositoryId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RepositoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ContentStore — branch-aware component access
// ---------------------------------------------------------------------------

/// Opaque identifier of one terminology component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentId(pub String);

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One terminology component as seen by the versioning workflow.
///
/// The content itself is opaque; publication only touches the effective
/// time and the released flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    /// Terminology-specific component type, e.g. "concept" or "description".
    pub component_type: String,
    /// Date the component's current state was released, if ever.
    pub effective_time: Option<NaiveDate>,
    /// Whether the component's current state has been published.
    pub released: bool,
    /// Rare component types carry no released flag but still receive an
    /// effective time on publication.
    pub supports_released_flag: bool,
}

/// Branch-aware content store.
///
/// Guarantees:
/// - Writes are staged per branch and become visible only on `commit`.
/// - `commit` is atomic: on failure all staged writes are discarded.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Ids of all components on the branch whose current state has not been
    /// released yet (changed since the last version).
    async fn find_unversioned_component_ids(
        &self,
        branch: &BranchPath,
    ) -> StoreResult<Vec<ComponentId>>;

    /// Read a single component as visible on the branch.
    async fn read_component(
        &self,
        branch: &BranchPath,
        id: &ComponentId,
    ) -> StoreResult<Component>;

    /// Stage the effective time and released flag onto a component.
    ///
    /// The released flag is only applied when the component supports it;
    /// the effective time is applied unconditionally.
    async fn apply_effective_time_and_released_flag(
        &self,
        branch: &BranchPath,
        id: &ComponentId,
        effective_time: NaiveDate,
        released: bool,
    ) -> StoreResult<()>;

    /// Commit all staged writes on the branch with a descriptive comment.
    async fn commit(&self, branch: &BranchPath, comment: &str) -> StoreResult<()>;
}

// ---------------------------------------------------------------------------
// VersionRegistry — immutable version records
// ---------------------------------------------------------------------------

/// Sentinel written into `last_update` when an existing version's effective
/// time is adjusted without a new release being cut.
pub fn fake_last_update_time() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).unwrap() + chrono::Duration::seconds(1)
}

/// An immutable, dated snapshot of a terminology's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Release identifier, unique within a code system.
    pub version_id: String,
    /// Short name of the code system this version belongs to.
    pub code_system_short_name: String,
    /// Date stamped onto the released components.
    pub effective_date: NaiveDate,
    /// When the version record was created.
    pub import_date: DateTime<Utc>,
    /// The working branch the content was released from.
    pub parent_branch_path: BranchPath,
    pub description: String,
    pub repository_id: RepositoryId,
    /// Last modification marker; bumped to the fake sentinel on
    /// effective-time adjustment.
    pub last_update: DateTime<Utc>,
}

/// Search filter for the bounded existence check.
#[derive(Debug, Clone, Default)]
pub struct VersionSearchFilter {
    pub code_system_short_name: Option<String>,
    pub version_id: Option<String>,
    /// Upper bound on the count; zero-vs-nonzero is all callers need.
    pub limit: usize,
}

/// Registry of immutable version records.
///
/// Guarantees:
/// - At most one record exists per (code system short name, version id).
/// - `create_version` never overwrites; a duplicate fails with
///   `StoreError::VersionAlreadyExists`.
#[async_trait]
pub trait VersionRegistry: Send + Sync {
    /// Look up a single version record, if present.
    async fn find_version(
        &self,
        short_name: &str,
        version_id: &str,
    ) -> StoreResult<Option<VersionRecord>>;

    /// Create a new version record exactly once.
    async fn create_version(&self, record: VersionRecord) -> StoreResult<()>;

    /// Count versions matching the filter, bounded by `filter.limit`.
    async fn count_versions(&self, filter: &VersionSearchFilter) -> StoreResult<usize>;

    /// All versions recorded in the given repository, ordered by effective
    /// date ascending.
    async fn versions_in_repository(
        &self,
        repository: &RepositoryId,
    ) -> StoreResult<Vec<VersionRecord>>;

    /// Bump the last-update marker of an existing version record.
    async fn touch_last_update(
        &self,
        short_name: &str,
        version_id: &str,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<()>;
}

// ---------------------------------------------------------------------------
// LockManager — (repository, branch) mutual exclusion
// ---------------------------------------------------------------------------

/// Who holds a lock and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockContext {
    pub user_id: String,
    /// Human-readable operation description, e.g. "versioning".
    pub description: String,
}

impl LockContext {
    pub fn new(user_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            description: description.into(),
        }
    }
}

/// What a lock covers: one branch of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockTarget {
    pub repository_id: RepositoryId,
    pub branch_path: BranchPath,
}

impl LockTarget {
    pub fn new(repository_id: RepositoryId, branch_path: BranchPath) -> Self {
        Self {
            repository_id,
            branch_path,
        }
    }
}

impl std::fmt::Display for LockTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.repository_id, self.branch_path)
    }
}

/// Acquisition policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Fail immediately when the target is held.
    Immediate,
    /// Retry for a bounded interval before giving up.
    Block(Duration),
}

/// Process-wide operation lock manager.
///
/// Shared across all versioning attempts; conflicting acquisitions are
/// serialized here. `unlock` is idempotent.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Acquire a lock on the target for the context.
    async fn lock(
        &self,
        context: &LockContext,
        mode: LockMode,
        target: &LockTarget,
    ) -> Result<(), LockError>;

    /// Release the target if held by the context. No-op otherwise.
    async fn unlock(&self, context: &LockContext, target: &LockTarget);
}

// ---------------------------------------------------------------------------
// JobExecutor — asynchronous publication hand-off
// ---------------------------------------------------------------------------

/// Unique identifier for a submitted job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        JobId(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observable state of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Done,
    Failed(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

/// A request handed off to the executor. The payload is an opaque
/// serialized configuration the executor-side worker understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub user_id: String,
    pub payload: serde_json::Value,
}

/// External job executor.
///
/// The executor enforces its own consistency (including locking); callers
/// must not hold operation locks across `submit`.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Submit a job and return its id.
    async fn submit(&self, request: JobRequest, description: &str) -> StoreResult<JobId>;

    /// Current status of a previously submitted job.
    async fn status(&self, id: &JobId) -> StoreResult<JobStatus>;
}

// ---------------------------------------------------------------------------
// BranchOracle — branch timestamps and content availability
// ---------------------------------------------------------------------------

/// Read-only oracle over branch commit history and repository content.
#[async_trait]
pub trait BranchOracle: Send + Sync {
    /// Timestamp of the most recent commit on the branch, if any.
    async fn head_timestamp(
        &self,
        repository: &RepositoryId,
        branch: &BranchPath,
    ) -> StoreResult<Option<DateTime<Utc>>>;

    /// Timestamp the branch was created from its parent.
    async fn branch_base_timestamp(
        &self,
        repository: &RepositoryId,
        branch: &BranchPath,
    ) -> StoreResult<Option<DateTime<Utc>>>;

    /// Whether the repository has ever had content imported.
    async fn has_any_content(&self, repository: &RepositoryId) -> StoreResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_path_child_and_segments() {
        let main = BranchPath::main();
        assert!(main.is_main());
        assert_eq!(main.last_segment(), "MAIN");

        let version = main.child("2021-07-31");
        assert!(!version.is_main());
        assert_eq!(version.as_str(), "MAIN/2021-07-31");
        assert_eq!(version.last_segment(), "2021-07-31");
    }

    #[test]
    fn branch_path_parse_empty_is_main() {
        assert!(BranchPath::parse("").is_main());
        assert_eq!(BranchPath::parse("MAIN/ext").last_segment(), "ext");
    }

    #[test]
    fn job_status_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed("boom".into()).is_terminal());
    }

    #[test]
    fn fake_last_update_is_stable() {
        assert_eq!(fake_last_update_time(), fake_last_update_time());
        assert_eq!(fake_last_update_time().timestamp(), 1);
    }
}
