//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `MemoryContentStore`, `MemoryVersionRegistry`,
//! `MemoryJobExecutor`, and `MemoryBranchOracle` that satisfy the trait
//! contracts without any external services. The content store supports
//! commit fault injection so callers can exercise rollback paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::StoreError;
use crate::traits::*;

// ---------------------------------------------------------------------------
// MemoryContentStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StagedWrite {
    id: ComponentId,
    effective_time: NaiveDate,
    released: bool,
}

/// In-memory content store with per-branch component maps and staged,
/// atomically committed writes.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    components: Mutex<HashMap<String, HashMap<ComponentId, Component>>>,
    staged: Mutex<HashMap<String, Vec<StagedWrite>>>,
    commit_comments: Mutex<Vec<String>>,
    fail_next_commit: AtomicBool,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a component onto a branch.
    pub fn insert_component(&self, branch: &BranchPath, component: Component) {
        let mut components = self.components.lock().unwrap();
        components
            .entry(branch.as_str().to_string())
            .or_default()
            .insert(component.id.clone(), component);
    }

    /// Snapshot of the committed components on a branch.
    pub fn components_on(&self, branch: &BranchPath) -> Vec<Component> {
        let components = self.components.lock().unwrap();
        components
            .get(branch.as_str())
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Comments of all successful commits, in order.
    pub fn commit_comments(&self) -> Vec<String> {
        self.commit_comments.lock().unwrap().clone()
    }

    /// Make the next `commit` call fail and discard its staged writes.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn find_unversioned_component_ids(
        &self,
        branch: &BranchPath,
    ) -> StoreResult<Vec<ComponentId>> {
        let components = self.components.lock().unwrap();
        let mut ids: Vec<ComponentId> = components
            .get(branch.as_str())
            .map(|m| {
                m.values()
                    .filter(|c| !c.released || c.effective_time.is_none())
                    .map(|c| c.id.clone())
                    .collect()
            })
            .unwrap_or_default();
        ids.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(ids)
    }

    async fn read_component(
        &self,
        branch: &BranchPath,
        id: &ComponentId,
    ) -> StoreResult<Component> {
        let components = self.components.lock().unwrap();
        components
            .get(branch.as_str())
            .and_then(|m| m.get(id))
            .cloned()
            .ok_or_else(|| StoreError::ComponentNotFound {
                branch: branch.as_str().to_string(),
                id: id.0.clone(),
            })
    }

    async fn apply_effective_time_and_released_flag(
        &self,
        branch: &BranchPath,
        id: &ComponentId,
        effective_time: NaiveDate,
        released: bool,
    ) -> StoreResult<()> {
        {
            let components = self.components.lock().unwrap();
            let exists = components
                .get(branch.as_str())
                .map(|m| m.contains_key(id))
                .unwrap_or(false);
            if !exists {
                return Err(StoreError::ComponentNotFound {
                    branch: branch.as_str().to_string(),
                    id: id.0.clone(),
                });
            }
        }
        let mut staged = self.staged.lock().unwrap();
        staged
            .entry(branch.as_str().to_string())
            .or_default()
            .push(StagedWrite {
                id: id.clone(),
                effective_time,
                released,
            });
        Ok(())
    }

    async fn commit(&self, branch: &BranchPath, comment: &str) -> StoreResult<()> {
        let writes = self
            .staged
            .lock()
            .unwrap()
            .remove(branch.as_str())
            .unwrap_or_default();

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            // Staged writes already drained: nothing partial survives.
            return Err(StoreError::Commit {
                branch: branch.as_str().to_string(),
                reason: "injected commit failure".to_string(),
            });
        }

        let mut components = self.components.lock().unwrap();
        let branch_components = components.entry(branch.as_str().to_string()).or_default();
        for write in writes {
            if let Some(component) = branch_components.get_mut(&write.id) {
                component.effective_time = Some(write.effective_time);
                if component.supports_released_flag {
                    component.released = write.released;
                }
            }
        }
        self.commit_comments
            .lock()
            .unwrap()
            .push(comment.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryVersionRegistry
// ---------------------------------------------------------------------------

/// In-memory version registry keyed by (short name, version id).
#[derive(Debug, Default)]
pub struct MemoryVersionRegistry {
    versions: Mutex<HashMap<(String, String), VersionRecord>>,
}

impl MemoryVersionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing version record, bypassing the duplicate check.
    pub fn insert(&self, record: VersionRecord) {
        let mut versions = self.versions.lock().unwrap();
        versions.insert(
            (
                record.code_system_short_name.clone(),
                record.version_id.clone(),
            ),
            record,
        );
    }

    pub fn len(&self) -> usize {
        self.versions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VersionRegistry for MemoryVersionRegistry {
    async fn find_version(
        &self,
        short_name: &str,
        version_id: &str,
    ) -> StoreResult<Option<VersionRecord>> {
        let versions = self.versions.lock().unwrap();
        Ok(versions
            .get(&(short_name.to_string(), version_id.to_string()))
            .cloned())
    }

    async fn create_version(&self, record: VersionRecord) -> StoreResult<()> {
        let key = (
            record.code_system_short_name.clone(),
            record.version_id.clone(),
        );
        let mut versions = self.versions.lock().unwrap();
        if versions.contains_key(&key) {
            return Err(StoreError::VersionAlreadyExists {
                short_name: key.0,
                version_id: key.1,
            });
        }
        versions.insert(key, record);
        Ok(())
    }

    async fn count_versions(&self, filter: &VersionSearchFilter) -> StoreResult<usize> {
        let versions = self.versions.lock().unwrap();
        let count = versions
            .values()
            .filter(|v| {
                filter
                    .code_system_short_name
                    .as_deref()
                    .map(|s| v.code_system_short_name == s)
                    .unwrap_or(true)
                    && filter
                        .version_id
                        .as_deref()
                        .map(|id| v.version_id == id)
                        .unwrap_or(true)
            })
            .take(filter.limit.max(1))
            .count();
        Ok(count)
    }

    async fn versions_in_repository(
        &self,
        repository: &RepositoryId,
    ) -> StoreResult<Vec<VersionRecord>> {
        let versions = self.versions.lock().unwrap();
        let mut records: Vec<VersionRecord> = versions
            .values()
            .filter(|v| v.repository_id == *repository)
            .cloned()
            .collect();
        records.sort_by_key(|v| v.effective_date);
        Ok(records)
    }

    async fn touch_last_update(
        &self,
        short_name: &str,
        version_id: &str,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut versions = self.versions.lock().unwrap();
        let record = versions
            .get_mut(&(short_name.to_string(), version_id.to_string()))
            .ok_or_else(|| StoreError::VersionNotFound {
                short_name: short_name.to_string(),
                version_id: version_id.to_string(),
            })?;
        record.last_update = timestamp;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryJobExecutor
// ---------------------------------------------------------------------------

/// In-memory job executor. Jobs stay `Pending` until a test marks them
/// terminal, or complete immediately when auto-completion is on.
#[derive(Debug, Default)]
pub struct MemoryJobExecutor {
    jobs: Mutex<HashMap<JobId, (JobRequest, JobStatus)>>,
    auto_complete: AtomicBool,
}

impl MemoryJobExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every future submission as immediately `Done`.
    pub fn auto_complete(&self) {
        self.auto_complete.store(true, Ordering::SeqCst);
    }

    /// Ids of all submitted jobs, in no particular order.
    pub fn submitted(&self) -> Vec<JobId> {
        self.jobs.lock().unwrap().keys().cloned().collect()
    }

    pub fn complete(&self, id: &JobId) {
        if let Some(entry) = self.jobs.lock().unwrap().get_mut(id) {
            entry.1 = JobStatus::Done;
        }
    }

    pub fn fail(&self, id: &JobId, reason: &str) {
        if let Some(entry) = self.jobs.lock().unwrap().get_mut(id) {
            entry.1 = JobStatus::Failed(reason.to_string());
        }
    }
}

#[async_trait]
impl JobExecutor for MemoryJobExecutor {
    async fn submit(&self, request: JobRequest, _description: &str) -> StoreResult<JobId> {
        let id = JobId::new();
        let status = if self.auto_complete.load(Ordering::SeqCst) {
            JobStatus::Done
        } else {
            JobStatus::Pending
        };
        self.jobs
            .lock()
            .unwrap()
            .insert(id.clone(), (request, status));
        Ok(id)
    }

    async fn status(&self, id: &JobId) -> StoreResult<JobStatus> {
        let jobs = self.jobs.lock().unwrap();
        jobs.get(id)
            .map(|(_, status)| status.clone())
            .ok_or_else(|| StoreError::JobNotFound(id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// MemoryBranchOracle
// ---------------------------------------------------------------------------

/// In-memory branch oracle with explicit setters for timestamps and
/// content availability.
#[derive(Debug, Default)]
pub struct MemoryBranchOracle {
    heads: Mutex<HashMap<(RepositoryId, String), DateTime<Utc>>>,
    bases: Mutex<HashMap<(RepositoryId, String), DateTime<Utc>>>,
    content: Mutex<HashSet<RepositoryId>>,
}

impl MemoryBranchOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_head_timestamp(
        &self,
        repository: RepositoryId,
        branch: &BranchPath,
        timestamp: DateTime<Utc>,
    ) {
        self.heads
            .lock()
            .unwrap()
            .insert((repository, branch.as_str().to_string()), timestamp);
    }

    pub fn set_branch_base_timestamp(
        &self,
        repository: RepositoryId,
        branch: &BranchPath,
        timestamp: DateTime<Utc>,
    ) {
        self.bases
            .lock()
            .unwrap()
            .insert((repository, branch.as_str().to_string()), timestamp);
    }

    pub fn set_has_content(&self, repository: RepositoryId, available: bool) {
        let mut content = self.content.lock().unwrap();
        if available {
            content.insert(repository);
        } else {
            content.remove(&repository);
        }
    }
}

#[async_trait]
impl BranchOracle for MemoryBranchOracle {
    async fn head_timestamp(
        &self,
        repository: &RepositoryId,
        branch: &BranchPath,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        let heads = self.heads.lock().unwrap();
        Ok(heads
            .get(&(*repository, branch.as_str().to_string()))
            .copied())
    }

    async fn branch_base_timestamp(
        &self,
        repository: &RepositoryId,
        branch: &BranchPath,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        let bases = self.bases.lock().unwrap();
        Ok(bases
            .get(&(*repository, branch.as_str().to_string()))
            .copied())
    }

    async fn has_any_content(&self, repository: &RepositoryId) -> StoreResult<bool> {
        Ok(self.content.lock().unwrap().contains(repository))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(id: &str) -> Component {
        Component {
            id: ComponentId(id.to_string()),
            component_type: "concept".to_string(),
            effective_time: None,
            released: false,
            supports_released_flag: true,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn staged_writes_become_visible_on_commit() {
        let store = MemoryContentStore::new();
        let branch = BranchPath::main();
        store.insert_component(&branch, component("100"));

        store
            .apply_effective_time_and_released_flag(
                &branch,
                &ComponentId("100".into()),
                date(2021, 7, 31),
                true,
            )
            .await
            .unwrap();

        // Not yet visible.
        let before = store
            .read_component(&branch, &ComponentId("100".into()))
            .await
            .unwrap();
        assert!(before.effective_time.is_none());
        assert!(!before.released);

        store.commit(&branch, "release").await.unwrap();

        let after = store
            .read_component(&branch, &ComponentId("100".into()))
            .await
            .unwrap();
        assert_eq!(after.effective_time, Some(date(2021, 7, 31)));
        assert!(after.released);
        assert_eq!(store.commit_comments(), vec!["release".to_string()]);
    }

    #[tokio::test]
    async fn failed_commit_discards_staged_writes() {
        let store = MemoryContentStore::new();
        let branch = BranchPath::main();
        store.insert_component(&branch, component("100"));

        store
            .apply_effective_time_and_released_flag(
                &branch,
                &ComponentId("100".into()),
                date(2021, 7, 31),
                true,
            )
            .await
            .unwrap();
        store.fail_next_commit();
        assert!(store.commit(&branch, "release").await.is_err());

        // The staged write is gone; a later commit does not resurrect it.
        store.commit(&branch, "retry").await.unwrap();
        let after = store
            .read_component(&branch, &ComponentId("100".into()))
            .await
            .unwrap();
        assert!(after.effective_time.is_none());
        assert!(!after.released);
    }

    #[tokio::test]
    async fn released_flag_skipped_without_support() {
        let store = MemoryContentStore::new();
        let branch = BranchPath::main();
        let mut c = component("200");
        c.supports_released_flag = false;
        store.insert_component(&branch, c);

        store
            .apply_effective_time_and_released_flag(
                &branch,
                &ComponentId("200".into()),
                date(2021, 7, 31),
                true,
            )
            .await
            .unwrap();
        store.commit(&branch, "release").await.unwrap();

        let after = store
            .read_component(&branch, &ComponentId("200".into()))
            .await
            .unwrap();
        assert_eq!(after.effective_time, Some(date(2021, 7, 31)));
        assert!(!after.released);
    }

    #[tokio::test]
    async fn duplicate_version_create_fails() {
        let registry = MemoryVersionRegistry::new();
        let record = VersionRecord {
            version_id: "2021-07-31".to_string(),
            code_system_short_name: "SNOMEDCT".to_string(),
            effective_date: date(2021, 7, 31),
            import_date: Utc::now(),
            parent_branch_path: BranchPath::main(),
            description: String::new(),
            repository_id: RepositoryId::new(),
            last_update: Utc::now(),
        };
        registry.create_version(record.clone()).await.unwrap();
        let err = registry.create_version(record).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionAlreadyExists { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn count_versions_is_bounded() {
        let registry = MemoryVersionRegistry::new();
        let repo = RepositoryId::new();
        for day in 1..=5 {
            registry
                .create_version(VersionRecord {
                    version_id: format!("v{day}"),
                    code_system_short_name: "CS".to_string(),
                    effective_date: date(2021, 1, day),
                    import_date: Utc::now(),
                    parent_branch_path: BranchPath::main(),
                    description: String::new(),
                    repository_id: repo,
                    last_update: Utc::now(),
                })
                .await
                .unwrap();
        }
        let filter = VersionSearchFilter {
            code_system_short_name: Some("CS".to_string()),
            version_id: None,
            limit: 1,
        };
        assert_eq!(registry.count_versions(&filter).await.unwrap(), 1);

        let ordered = registry.versions_in_repository(&repo).await.unwrap();
        assert_eq!(ordered.len(), 5);
        assert!(ordered.windows(2).all(|w| w[0].effective_date <= w[1].effective_date));
    }

    #[tokio::test]
    async fn job_executor_lifecycle() {
        let executor = MemoryJobExecutor::new();
        let id = executor
            .submit(
                JobRequest {
                    user_id: "alice".to_string(),
                    payload: serde_json::json!({}),
                },
                "Creating version 'v1'.",
            )
            .await
            .unwrap();
        assert_eq!(executor.status(&id).await.unwrap(), JobStatus::Pending);
        executor.complete(&id);
        assert_eq!(executor.status(&id).await.unwrap(), JobStatus::Done);
    }
}
