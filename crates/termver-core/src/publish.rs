//! Component publication: effective-time stamping and version creation.
//!
//! A `TerminologyPlugin` describes one tooling area's publication policy;
//! the `PublishManager` drives the shared publication sequence against the
//! content store and version registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::domain::config::VersioningConfiguration;
use crate::domain::error::{Result, VersioningError};
use termver_store::{
    fake_last_update_time, BranchPath, ComponentId, ContentStore, RepositoryId, StoreError,
    VersionRecord, VersionRegistry, VersionSearchFilter,
};

/// Publication policy of one terminology tooling area.
///
/// The default hooks do nothing; terminologies override only what they
/// need (ignored types, pre/post processing, post-commit follow-up).
#[async_trait]
pub trait TerminologyPlugin: Send + Sync {
    fn tooling_id(&self) -> &str;

    /// Human-readable terminology name used in commit comments and
    /// outcome messages.
    fn terminology_name(&self) -> &str;

    fn repository_id(&self) -> RepositoryId;

    /// Whether this tooling area carries effective-time semantics at all.
    fn effective_time_supported(&self) -> bool {
        true
    }

    /// Component types excluded from publication.
    fn is_ignored_type(&self, _component_type: &str) -> bool {
        false
    }

    /// Hook before any component is adjusted.
    async fn pre_process(&self, _components: &[ComponentId]) -> Result<()> {
        Ok(())
    }

    /// Hook after adjustment, before the commit.
    async fn post_process(&self) -> Result<()> {
        Ok(())
    }

    /// Hook after a successful commit.
    async fn post_commit(&self) -> Result<()> {
        Ok(())
    }
}

/// Explicit registry mapping tooling ids to their publication policies.
///
/// Constructed once at process start and passed by reference wherever a
/// tooling area's plugin needs resolving.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn TerminologyPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn TerminologyPlugin>) {
        self.plugins
            .insert(plugin.tooling_id().to_string(), plugin);
    }

    pub fn get(&self, tooling_id: &str) -> Result<Arc<dyn TerminologyPlugin>> {
        self.plugins
            .get(tooling_id)
            .cloned()
            .ok_or_else(|| VersioningError::UnknownTooling(tooling_id.to_string()))
    }

    pub fn contains(&self, tooling_id: &str) -> bool {
        self.plugins.contains_key(tooling_id)
    }
}

/// What one publication run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A new version record was created.
    VersionCreated,
    /// An existing version's effective time was re-applied; its record got
    /// the fake last-update bump instead of a duplicate.
    EffectiveTimeAdjusted,
}

/// Drives the publication sequence for one tooling area: collect
/// unversioned components, stamp them, commit atomically, then create or
/// touch the version record.
pub struct PublishManager {
    content: Arc<dyn ContentStore>,
    versions: Arc<dyn VersionRegistry>,
    registry: Arc<PluginRegistry>,
}

impl PublishManager {
    pub fn new(
        content: Arc<dyn ContentStore>,
        versions: Arc<dyn VersionRegistry>,
        registry: Arc<PluginRegistry>,
    ) -> Self {
        Self {
            content,
            versions,
            registry,
        }
    }

    /// True iff no version record exists yet for the configured
    /// (code system short name, version id) pair. Bounded lookup: the
    /// registry only needs to report zero-vs-nonzero.
    pub async fn could_create_version(&self, config: &VersioningConfiguration) -> Result<bool> {
        let version_id = config
            .version_id()
            .ok_or_else(|| VersioningError::ConfigurationIncomplete("version id".to_string()))?;
        let filter = VersionSearchFilter {
            code_system_short_name: Some(config.code_system_short_name().to_string()),
            version_id: Some(version_id.to_string()),
            limit: 1,
        };
        Ok(self.versions.count_versions(&filter).await? == 0)
    }

    /// The branch publication works on: the configured parent branch when
    /// a new version is cut, otherwise the existing version's own branch.
    pub fn publication_branch(
        &self,
        config: &VersioningConfiguration,
        could_create: bool,
    ) -> BranchPath {
        if could_create {
            config.parent_branch_path().clone()
        } else {
            config
                .parent_branch_path()
                .child(config.version_id().unwrap_or_default())
        }
    }

    /// Publish one tooling area's content under the configuration.
    pub async fn publish(
        &self,
        config: &VersioningConfiguration,
        tooling_id: &str,
    ) -> Result<PublishOutcome> {
        let could_create = self.could_create_version(config).await?;
        self.publish_scoped(config, tooling_id, could_create, true)
            .await
    }

    /// Publication step for one tooling area of a multi-area release.
    ///
    /// `could_create` is evaluated once per attempt by the caller so every
    /// area agrees on create-vs-adjust; `manage_record` is true only for
    /// the area that owns the version record (the primary one), dependent
    /// areas stamp and commit without touching the registry.
    pub async fn publish_scoped(
        &self,
        config: &VersioningConfiguration,
        tooling_id: &str,
        could_create: bool,
        manage_record: bool,
    ) -> Result<PublishOutcome> {
        let plugin = self.registry.get(tooling_id)?;
        let version_id = config
            .version_id()
            .ok_or_else(|| VersioningError::ConfigurationIncomplete("version id".to_string()))?
            .to_string();
        let effective_time = config.effective_time().ok_or_else(|| {
            VersioningError::ConfigurationIncomplete("effective time".to_string())
        })?;

        let branch = self.publication_branch(config, could_create);

        info!(tooling = tooling_id, branch = %branch, "collecting unversioned components");
        let component_ids = self.content.find_unversioned_component_ids(&branch).await?;

        plugin.pre_process(&component_ids).await?;

        info!(
            tooling = tooling_id,
            count = component_ids.len(),
            "adjusting effective time on components"
        );
        for id in &component_ids {
            let component = self.content.read_component(&branch, id).await?;
            if plugin.is_ignored_type(&component.component_type) {
                continue;
            }
            self.content
                .apply_effective_time_and_released_flag(&branch, id, effective_time, true)
                .await?;
        }

        plugin.post_process().await?;

        let comment = if could_create {
            format!(
                "Created new version '{}' for {}.",
                version_id,
                config.code_system_short_name()
            )
        } else {
            format!(
                "Adjusted effective time to '{}' for {} version '{}'.",
                effective_time,
                config.code_system_short_name(),
                version_id
            )
        };

        info!(tooling = tooling_id, "persisting changes");
        self.content
            .commit(&branch, &comment)
            .await
            .map_err(|source| VersioningError::Commit {
                terminology: plugin.terminology_name().to_string(),
                version_id: version_id.clone(),
                source,
            })?;

        if !manage_record {
            return Ok(if could_create {
                PublishOutcome::VersionCreated
            } else {
                PublishOutcome::EffectiveTimeAdjusted
            });
        }

        if could_create {
            let record = VersionRecord {
                version_id: version_id.clone(),
                code_system_short_name: config.code_system_short_name().to_string(),
                effective_date: effective_time,
                import_date: Utc::now(),
                parent_branch_path: config.parent_branch_path().clone(),
                description: config.description().to_string(),
                repository_id: plugin.repository_id(),
                last_update: Utc::now(),
            };
            match self.versions.create_version(record).await {
                Ok(()) => {}
                Err(StoreError::VersionAlreadyExists {
                    short_name,
                    version_id,
                }) => {
                    // A concurrent actor created the version between the
                    // existence check and now.
                    return Err(VersioningError::AlreadyExists {
                        short_name,
                        version_id,
                    });
                }
                Err(e) => return Err(e.into()),
            }
            info!(tooling = tooling_id, version = %version_id, "new version created");
            Ok(PublishOutcome::VersionCreated)
        } else {
            self.versions
                .touch_last_update(
                    config.code_system_short_name(),
                    &version_id,
                    fake_last_update_time(),
                )
                .await?;
            info!(tooling = tooling_id, version = %version_id, "effective time adjusted");
            Ok(PublishOutcome::EffectiveTimeAdjusted)
        }
    }
}
