//! Versioning workflow orchestration.
//!
//! One orchestrator per versioning attempt. Configuration operations
//! validate incrementally and are side-effect free; `execute` is the sole
//! mutating transition and consumes the configuration on success.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::domain::config::VersioningConfiguration;
use crate::domain::error::{Result, VersioningError};
use crate::lock::LockCoordinator;
use crate::publish::{PluginRegistry, PublishManager, PublishOutcome};
use crate::validation::{validate_version_name, TimeValidator};
use termver_store::{
    BranchOracle, ContentStore, JobExecutor, JobRequest, JobStatus, LockManager, RepositoryId,
    StoreError, VersionRecord, VersionRegistry,
};

/// Default delay between job status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default upper bound on the whole post-submission poll loop.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Lifecycle of one versioning attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Unconfigured,
    Configuring,
    Ready,
    Locked,
    Publishing,
    Committed,
    Failed,
}

/// What a successful `execute` produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersioningOutcome {
    /// A new version was cut.
    Versioned,
    /// An existing version's effective time was re-applied.
    EffectiveTimeAdjusted,
}

/// Typed result of a successful versioning attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersioningResult {
    pub outcome: VersioningOutcome,
    /// User-facing success message.
    pub message: String,
}

/// Drives one versioning attempt end to end: incremental configuration,
/// read-only precondition checks, then a single locked publication pass
/// over every participating tooling area (or a hand-off to the job
/// executor when one is attached).
pub struct VersioningOrchestrator {
    config: VersioningConfiguration,
    state: OrchestratorState,
    registry: Arc<PluginRegistry>,
    publisher: PublishManager,
    versions: Arc<dyn VersionRegistry>,
    oracle: Arc<dyn BranchOracle>,
    locks: LockCoordinator,
    jobs: Option<Arc<dyn JobExecutor>>,
    /// Versions already released per tooling id, loaded once at
    /// construction, ordered by effective date ascending.
    existing_versions: HashMap<String, Vec<VersionRecord>>,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl VersioningOrchestrator {
    /// Build an orchestrator for the given configuration, loading the
    /// existing version history of every participating tooling area.
    pub async fn new(
        config: VersioningConfiguration,
        registry: Arc<PluginRegistry>,
        content: Arc<dyn ContentStore>,
        versions: Arc<dyn VersionRegistry>,
        oracle: Arc<dyn BranchOracle>,
        lock_manager: Arc<dyn LockManager>,
    ) -> Result<Self> {
        let mut existing_versions = HashMap::new();
        for tooling_id in config.tooling_ids() {
            let plugin = registry.get(tooling_id)?;
            let records = versions
                .versions_in_repository(&plugin.repository_id())
                .await?;
            existing_versions.insert(tooling_id.clone(), records);
        }

        let locks = LockCoordinator::new(lock_manager, config.user_id());
        let publisher = PublishManager::new(content, versions.clone(), registry.clone());

        Ok(Self {
            config,
            state: OrchestratorState::Unconfigured,
            registry,
            publisher,
            versions,
            oracle,
            locks,
            jobs: None,
            existing_versions,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        })
    }

    /// Attach a job executor; `execute` then submits instead of publishing
    /// in-process.
    pub fn with_job_executor(mut self, jobs: Arc<dyn JobExecutor>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    pub fn set_poll_timeout(&mut self, timeout: Duration) {
        self.poll_timeout = timeout;
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn configuration(&self) -> &VersioningConfiguration {
        &self.config
    }

    /// Versions already released for one tooling area, oldest first.
    pub fn existing_versions(&self, tooling_id: &str) -> &[VersionRecord] {
        self.existing_versions
            .get(tooling_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether every participating tooling area carries effective-time
    /// semantics, i.e. the adjustment path is meaningful at all.
    pub fn is_effective_time_adjustment_supported(&self) -> Result<bool> {
        for tooling_id in self.config.tooling_ids() {
            if !self.registry.get(tooling_id)?.effective_time_supported() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Per-tooling decision whether a new version would be cut (true) or
    /// the attempt runs as an adjustment of an already-released version
    /// (false). Requires a configured version id.
    pub fn tag_preferences(&self) -> Result<HashMap<String, bool>> {
        let version_id = self.version_id_or_incomplete()?;
        let mut preferences = HashMap::new();
        for tooling_id in self.config.tooling_ids() {
            let exists = self
                .existing_versions(tooling_id)
                .iter()
                .any(|v| v.version_id == version_id);
            preferences.insert(tooling_id.clone(), !exists);
        }
        Ok(preferences)
    }

    // ---------- Configuration ----------

    /// Set the version id after validating it against every tooling
    /// area's existing version names. With `ignore_validation` the name
    /// checks are skipped and an existing id is accepted; the attempt then
    /// runs as an effective-time adjustment instead of a duplicate.
    pub fn configure_version_id(&mut self, version_id: &str, ignore_validation: bool) -> Result<()> {
        if !ignore_validation {
            for tooling_id in self.config.tooling_ids() {
                let existing_names: Vec<String> = self
                    .existing_versions(tooling_id)
                    .iter()
                    .map(|v| v.version_id.clone())
                    .collect();
                validate_version_name(version_id, &existing_names)?;
            }
        }
        self.config.set_version_id(version_id, ignore_validation);
        self.advance_configuration();
        Ok(())
    }

    /// Set the effective time after validating it per tooling area:
    /// calendar sanity when nothing was ever released, otherwise strictly
    /// greater than the relevant prior version's effective date (the
    /// lineage head on the main branch, the matching named version
    /// elsewhere).
    pub fn configure_effective_time(&mut self, effective_time: chrono::NaiveDate) -> Result<()> {
        for tooling_id in self.config.tooling_ids() {
            let plugin = self.registry.get(tooling_id)?;
            if !plugin.effective_time_supported() {
                continue;
            }
            self.time_validator_for(tooling_id).validate(effective_time)?;
        }
        self.config.set_effective_time(effective_time);
        self.advance_configuration();
        Ok(())
    }

    pub fn configure_description(&mut self, description: Option<&str>) {
        self.config.set_description(description);
        self.advance_configuration();
    }

    fn time_validator_for(&self, tooling_id: &str) -> TimeValidator {
        let versions = self.existing_versions(tooling_id);
        let Some(most_recent) = versions.last() else {
            return TimeValidator::new();
        };
        let parent = self.config.parent_branch_path();
        if parent.is_main() {
            return TimeValidator::after(most_recent.effective_date);
        }
        // Releasing on a named branch: the floor is that version's own
        // effective date when the branch name matches one.
        let named = versions
            .iter()
            .find(|v| v.version_id == parent.last_segment());
        TimeValidator::after(named.unwrap_or(most_recent).effective_date)
    }

    fn advance_configuration(&mut self) {
        self.state = if self.config.version_id().is_some() && self.config.effective_time().is_some()
        {
            OrchestratorState::Ready
        } else {
            OrchestratorState::Configuring
        };
    }

    // ---------- Preconditions ----------

    /// Read-only precondition check on the primary tooling area: fails
    /// with `NoContent` when nothing was ever imported, with `NoChanges`
    /// when the branch has not moved since the last release. Repeatable
    /// and side-effect free.
    pub async fn can_create_new_version(&self) -> Result<()> {
        let primary = self.config.primary_tooling_id();
        let plugin = self.registry.get(primary)?;
        let repository = plugin.repository_id();
        let versions = self.existing_versions(primary);

        if versions.is_empty() {
            if !self.oracle.has_any_content(&repository).await? {
                return Err(VersioningError::NoContent { repository });
            }
            return Ok(());
        }

        let branch = self.config.parent_branch_path();
        let head = self.oracle.head_timestamp(&repository, branch).await?;
        let baseline = if branch.is_main() {
            let latest = versions
                .iter()
                .max_by_key(|v| v.import_date)
                .map(|v| v.import_date.max(v.last_update));
            latest
        } else {
            self.oracle.branch_base_timestamp(&repository, branch).await?
        };

        match (head, baseline) {
            (None, _) => Err(VersioningError::NoChanges { repository }),
            (Some(head), Some(baseline)) if head <= baseline => {
                Err(VersioningError::NoChanges { repository })
            }
            _ => Ok(()),
        }
    }

    // ---------- Execution ----------

    /// The sole mutating transition: duplicate fail-fast, lock
    /// acquisition, publication across every tooling area (primary
    /// first), lock release on every exit path, then post-commit hooks.
    /// Success consumes the configuration.
    pub async fn execute(&mut self) -> Result<VersioningResult> {
        if self.config.is_consumed() {
            return Err(VersioningError::ConfigurationConsumed);
        }
        let version_id = self.version_id_or_incomplete()?.to_string();
        if self.config.effective_time().is_none() {
            return Err(VersioningError::ConfigurationIncomplete(
                "effective time".to_string(),
            ));
        }

        let short_name = self.config.code_system_short_name().to_string();
        if !self.config.ignore_name_validation() {
            if let Some(existing) = self.versions.find_version(&short_name, &version_id).await? {
                self.state = OrchestratorState::Failed;
                return Err(VersioningError::AlreadyExists {
                    short_name: existing.code_system_short_name,
                    version_id: existing.version_id,
                });
            }
        }

        let result = match self.jobs.clone() {
            Some(executor) => self.execute_submitted(executor, &version_id).await,
            None => self.execute_in_process().await,
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state = OrchestratorState::Failed;
                return Err(e);
            }
        };

        for tooling_id in self.config.tooling_ids() {
            self.registry.get(tooling_id)?.post_commit().await?;
        }

        self.config.mark_consumed();
        self.state = OrchestratorState::Committed;
        let message = self.success_message(outcome, &version_id)?;
        info!(version = %version_id, "{message}");
        Ok(VersioningResult { outcome, message })
    }

    /// Publish every tooling area in-process under the operation locks.
    /// Locks are released on every exit path, success and failure alike.
    async fn execute_in_process(&mut self) -> Result<VersioningOutcome> {
        let toolings = self.lock_scope()?;
        self.locks.acquire(&toolings).await?;
        self.state = OrchestratorState::Locked;

        let result = self.publish_all().await;
        self.locks.release().await;
        result
    }

    async fn publish_all(&mut self) -> Result<VersioningOutcome> {
        self.state = OrchestratorState::Publishing;
        let could_create = self.publisher.could_create_version(&self.config).await?;
        let mut primary_outcome = PublishOutcome::VersionCreated;
        for (index, tooling_id) in self.config.tooling_ids().to_vec().iter().enumerate() {
            // The primary tooling area owns the version record.
            let outcome = self
                .publisher
                .publish_scoped(&self.config, tooling_id, could_create, index == 0)
                .await?;
            if index == 0 {
                primary_outcome = outcome;
            }
        }
        Ok(match primary_outcome {
            PublishOutcome::EffectiveTimeAdjusted => VersioningOutcome::EffectiveTimeAdjusted,
            PublishOutcome::VersionCreated => VersioningOutcome::Versioned,
        })
    }

    /// Hand publication off to the job executor and poll until terminal.
    /// No lock is held across the submission: the executor enforces its
    /// own consistency.
    async fn execute_submitted(
        &mut self,
        executor: Arc<dyn JobExecutor>,
        version_id: &str,
    ) -> Result<VersioningOutcome> {
        let could_create = self.publisher.could_create_version(&self.config).await?;
        let payload = serde_json::to_value(&self.config).map_err(StoreError::from)?;
        let request = JobRequest {
            user_id: self.config.user_id().to_string(),
            payload,
        };
        let description = format!(
            "Versioning {} with '{}'",
            self.config.code_system_short_name(),
            version_id
        );

        self.state = OrchestratorState::Publishing;
        let job_id = executor.submit(request, &description).await?;
        info!(job = %job_id, "versioning job submitted");

        let deadline = Instant::now() + self.poll_timeout;
        loop {
            match executor.status(&job_id).await? {
                JobStatus::Done => {
                    break Ok(if could_create {
                        VersioningOutcome::Versioned
                    } else {
                        VersioningOutcome::EffectiveTimeAdjusted
                    })
                }
                JobStatus::Failed(reason) => {
                    warn!(job = %job_id, reason = %reason, "versioning job failed");
                    break Err(VersioningError::Job(reason));
                }
                JobStatus::Pending => {
                    if Instant::now() >= deadline {
                        break Err(VersioningError::Job(format!(
                            "job {job_id} did not reach a terminal state within {:?}",
                            self.poll_timeout
                        )));
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    fn lock_scope(&self) -> Result<Vec<(String, RepositoryId)>> {
        self.config
            .tooling_ids()
            .iter()
            .map(|tooling_id| {
                let plugin = self.registry.get(tooling_id)?;
                Ok((tooling_id.clone(), plugin.repository_id()))
            })
            .collect()
    }

    fn success_message(&self, outcome: VersioningOutcome, version_id: &str) -> Result<String> {
        let primary = self.registry.get(self.config.primary_tooling_id())?;
        Ok(match outcome {
            VersioningOutcome::Versioned => format!(
                "{} has been successfully versioned with '{}'.",
                primary.terminology_name(),
                version_id
            ),
            VersioningOutcome::EffectiveTimeAdjusted => format!(
                "Effective time has been successfully adjusted on unpublished components for {}.",
                primary.terminology_name()
            ),
        })
    }

    fn version_id_or_incomplete(&self) -> Result<&str> {
        self.config
            .version_id()
            .ok_or_else(|| VersioningError::ConfigurationIncomplete("version id".to_string()))
    }
}
