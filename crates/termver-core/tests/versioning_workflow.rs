//! End-to-end versioning workflow tests against the in-memory fakes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use termver_core::{
    PluginRegistry, TerminologyPlugin, VersioningConfiguration, VersioningError,
    VersioningOrchestrator, VersioningOutcome,
};
use termver_store::fakes::{
    MemoryBranchOracle, MemoryContentStore, MemoryJobExecutor, MemoryVersionRegistry,
};
use termver_store::{
    fake_last_update_time, BranchPath, Component, ComponentId, OperationLockManager, RepositoryId,
    VersionRecord, VersionRegistry,
};

struct AreaPlugin {
    tooling: &'static str,
    name: &'static str,
    repository: RepositoryId,
}

#[async_trait]
impl TerminologyPlugin for AreaPlugin {
    fn tooling_id(&self) -> &str {
        self.tooling
    }

    fn terminology_name(&self) -> &str {
        self.name
    }

    fn repository_id(&self) -> RepositoryId {
        self.repository
    }
}

struct World {
    registry: Arc<PluginRegistry>,
    content: Arc<MemoryContentStore>,
    versions: Arc<MemoryVersionRegistry>,
    oracle: Arc<MemoryBranchOracle>,
    locks: Arc<OperationLockManager>,
    snomed_repo: RepositoryId,
}

impl World {
    fn new() -> Self {
        Self::with_extension(false)
    }

    fn with_extension(extension: bool) -> Self {
        let snomed_repo = RepositoryId::new();
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(AreaPlugin {
            tooling: "snomed",
            name: "SNOMED CT",
            repository: snomed_repo,
        }));
        if extension {
            registry.register(Arc::new(AreaPlugin {
                tooling: "snomed-ext",
                name: "SNOMED CT Extension",
                repository: RepositoryId::new(),
            }));
        }
        World {
            registry: Arc::new(registry),
            content: Arc::new(MemoryContentStore::new()),
            versions: Arc::new(MemoryVersionRegistry::new()),
            oracle: Arc::new(MemoryBranchOracle::new()),
            locks: Arc::new(OperationLockManager::new()),
            snomed_repo,
        }
    }

    async fn orchestrator(&self, other_toolings: &[&str]) -> VersioningOrchestrator {
        let config = VersioningConfiguration::new(
            "SNOMEDCT",
            "snomed",
            other_toolings,
            BranchPath::main(),
            "alice",
        );
        VersioningOrchestrator::new(
            config,
            self.registry.clone(),
            self.content.clone(),
            self.versions.clone(),
            self.oracle.clone(),
            self.locks.clone(),
        )
        .await
        .expect("orchestrator construction")
    }

    fn seed_component(&self, branch: &BranchPath, id: &str) {
        self.content.insert_component(
            branch,
            Component {
                id: ComponentId(id.to_string()),
                component_type: "concept".to_string(),
                effective_time: None,
                released: false,
                supports_released_flag: true,
            },
        );
    }

    fn seed_version(&self, version_id: &str, effective: NaiveDate) {
        self.versions.insert(VersionRecord {
            version_id: version_id.to_string(),
            code_system_short_name: "SNOMEDCT".to_string(),
            effective_date: effective,
            import_date: Utc::now(),
            parent_branch_path: BranchPath::main(),
            description: String::new(),
            repository_id: self.snomed_repo,
            last_update: Utc::now(),
        });
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn effective_time_must_advance_past_released_head() {
    let world = World::new();
    world.seed_version("2021-01-31", date(2021, 1, 31));

    let mut orchestrator = world.orchestrator(&[]).await;
    orchestrator.configure_version_id("2021-07-31", false).unwrap();

    let err = orchestrator
        .configure_effective_time(date(2021, 1, 30))
        .unwrap_err();
    assert!(matches!(err, VersioningError::Validation(_)));

    orchestrator.configure_effective_time(date(2021, 2, 1)).unwrap();
}

#[tokio::test]
async fn duplicate_version_succeeds_once_and_conflicts_after() {
    let world = World::new();
    world.seed_component(&BranchPath::main(), "100");

    // Both attempts are configured before either executes, so the second
    // passes name validation against the stale history.
    let mut first = world.orchestrator(&[]).await;
    first.configure_version_id("2021-07-31", false).unwrap();
    first.configure_effective_time(date(2021, 7, 31)).unwrap();

    let mut second = world.orchestrator(&[]).await;
    second.configure_version_id("2021-07-31", false).unwrap();
    second.configure_effective_time(date(2021, 7, 31)).unwrap();

    let result = first.execute().await.unwrap();
    assert_eq!(result.outcome, VersioningOutcome::Versioned);

    let err = second.execute().await.unwrap_err();
    assert!(matches!(err, VersioningError::AlreadyExists { .. }));
    assert_eq!(world.versions.len(), 1);
}

#[tokio::test]
async fn lock_is_released_after_commit_failure() {
    let world = World::new();
    world.seed_component(&BranchPath::main(), "100");
    world.content.fail_next_commit();

    let mut failing = world.orchestrator(&[]).await;
    failing.configure_version_id("2021-07-31", false).unwrap();
    failing.configure_effective_time(date(2021, 7, 31)).unwrap();

    let err = failing.execute().await.unwrap_err();
    assert!(matches!(err, VersioningError::Commit { .. }));
    assert!(world.versions.is_empty());

    // The operation lock must not leak: a fresh attempt on the same
    // target acquires it and succeeds.
    let mut retry = world.orchestrator(&[]).await;
    retry.configure_version_id("2021-07-31", false).unwrap();
    retry.configure_effective_time(date(2021, 7, 31)).unwrap();
    let result = retry.execute().await.unwrap();
    assert_eq!(result.outcome, VersioningOutcome::Versioned);
}

#[tokio::test]
async fn no_content_clears_after_import() {
    let world = World::new();
    let orchestrator = world.orchestrator(&[]).await;

    let err = orchestrator.can_create_new_version().await.unwrap_err();
    assert!(matches!(err, VersioningError::NoContent { .. }));

    world.oracle.set_has_content(world.snomed_repo, true);
    orchestrator.can_create_new_version().await.unwrap();
}

#[tokio::test]
async fn existing_version_is_adjusted_not_duplicated() {
    let world = World::new();
    world.seed_version("2021-07-31", date(2021, 7, 31));
    // The already-cut version's own branch carries the unpublished fixes.
    let version_branch = BranchPath::main().child("2021-07-31");
    world.seed_component(&version_branch, "100");

    let mut orchestrator = world.orchestrator(&[]).await;
    orchestrator.configure_version_id("2021-07-31", true).unwrap();
    orchestrator.configure_effective_time(date(2021, 8, 31)).unwrap();

    let result = orchestrator.execute().await.unwrap();
    assert_eq!(result.outcome, VersioningOutcome::EffectiveTimeAdjusted);
    assert_eq!(
        result.message,
        "Effective time has been successfully adjusted on unpublished components for SNOMED CT."
    );

    assert_eq!(world.versions.len(), 1);
    let record = world
        .versions
        .find_version("SNOMEDCT", "2021-07-31")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.last_update, fake_last_update_time());
    assert_eq!(
        world.content.commit_comments(),
        vec!["Adjusted effective time to '2021-08-31' for SNOMEDCT version '2021-07-31'.".to_string()]
    );
}

#[tokio::test]
async fn submitted_job_reports_versioned_outcome() {
    let world = World::new();
    let executor = Arc::new(MemoryJobExecutor::new());
    executor.auto_complete();

    let mut orchestrator = world
        .orchestrator(&[])
        .await
        .with_job_executor(executor.clone());
    orchestrator.configure_version_id("2021-07-31", false).unwrap();
    orchestrator.configure_effective_time(date(2021, 7, 31)).unwrap();

    let result = orchestrator.execute().await.unwrap();
    assert_eq!(result.outcome, VersioningOutcome::Versioned);
    assert_eq!(executor.submitted().len(), 1);
    // Publication itself happens on the executor side.
    assert!(world.versions.is_empty());
    assert!(world.content.commit_comments().is_empty());
}

#[tokio::test]
async fn pending_job_times_out_with_job_error() {
    let world = World::new();
    let executor = Arc::new(MemoryJobExecutor::new());

    let mut orchestrator = world
        .orchestrator(&[])
        .await
        .with_job_executor(executor);
    orchestrator.set_poll_interval(Duration::from_millis(10));
    orchestrator.set_poll_timeout(Duration::from_millis(50));
    orchestrator.configure_version_id("2021-07-31", false).unwrap();
    orchestrator.configure_effective_time(date(2021, 7, 31)).unwrap();

    let err = orchestrator.execute().await.unwrap_err();
    assert!(matches!(err, VersioningError::Job(_)));
}

#[tokio::test]
async fn failed_job_surfaces_its_reason() {
    let world = World::new();
    let executor = Arc::new(MemoryJobExecutor::new());

    let mut orchestrator = world
        .orchestrator(&[])
        .await
        .with_job_executor(executor.clone());
    orchestrator.set_poll_interval(Duration::from_millis(10));
    orchestrator.configure_version_id("2021-07-31", false).unwrap();
    orchestrator.configure_effective_time(date(2021, 7, 31)).unwrap();

    let handle = tokio::spawn(async move { orchestrator.execute().await });
    // Wait for the submission to land, then fail it.
    let job = loop {
        if let Some(id) = executor.submitted().into_iter().next() {
            break id;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };
    executor.fail(&job, "worker crashed");

    let err = handle.await.unwrap().unwrap_err();
    match err {
        VersioningError::Job(reason) => assert_eq!(reason, "worker crashed"),
        other => panic!("expected job error, got {other:?}"),
    }
}

#[tokio::test]
async fn multi_tooling_release_creates_one_record() {
    let world = World::with_extension(true);
    world.seed_component(&BranchPath::main(), "100");

    let mut orchestrator = world.orchestrator(&["snomed-ext"]).await;
    orchestrator.configure_version_id("2021-07-31", false).unwrap();
    orchestrator.configure_effective_time(date(2021, 7, 31)).unwrap();

    let result = orchestrator.execute().await.unwrap();
    assert_eq!(result.outcome, VersioningOutcome::Versioned);
    assert_eq!(
        result.message,
        "SNOMED CT has been successfully versioned with '2021-07-31'."
    );

    // One commit per participating tooling area, one version record.
    assert_eq!(world.content.commit_comments().len(), 2);
    assert_eq!(world.versions.len(), 1);
}
