//! Versioning operation configuration.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use termver_store::BranchPath;

/// Single-use configuration of one versioning attempt, built incrementally
/// by the orchestrator's `configure_*` operations.
///
/// Once an execution succeeds the configuration is consumed; re-executing
/// it is rejected rather than silently repeated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersioningConfiguration {
    version_id: Option<String>,
    code_system_short_name: String,
    primary_tooling_id: String,
    /// All participating tooling areas, primary first.
    tooling_ids: Vec<String>,
    parent_branch_path: BranchPath,
    effective_time: Option<NaiveDate>,
    description: String,
    user_id: String,
    /// When set, an existing version id is accepted and the attempt runs
    /// as an effective-time adjustment instead of failing as a duplicate.
    ignore_name_validation: bool,
    consumed: bool,
}

impl VersioningConfiguration {
    pub fn new(
        code_system_short_name: impl Into<String>,
        primary_tooling_id: impl Into<String>,
        other_tooling_ids: &[&str],
        parent_branch_path: BranchPath,
        user_id: impl Into<String>,
    ) -> Self {
        let primary_tooling_id = primary_tooling_id.into();
        let mut tooling_ids = vec![primary_tooling_id.clone()];
        tooling_ids.extend(other_tooling_ids.iter().map(|id| id.to_string()));
        Self {
            version_id: None,
            code_system_short_name: code_system_short_name.into(),
            primary_tooling_id,
            tooling_ids,
            parent_branch_path,
            effective_time: None,
            description: String::new(),
            user_id: user_id.into(),
            ignore_name_validation: false,
            consumed: false,
        }
    }

    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }

    pub fn set_version_id(&mut self, version_id: &str, ignore_name_validation: bool) {
        self.version_id = Some(version_id.to_string());
        self.ignore_name_validation = ignore_name_validation;
    }

    pub fn code_system_short_name(&self) -> &str {
        &self.code_system_short_name
    }

    pub fn primary_tooling_id(&self) -> &str {
        &self.primary_tooling_id
    }

    pub fn tooling_ids(&self) -> &[String] {
        &self.tooling_ids
    }

    pub fn parent_branch_path(&self) -> &BranchPath {
        &self.parent_branch_path
    }

    pub fn effective_time(&self) -> Option<NaiveDate> {
        self.effective_time
    }

    pub fn set_effective_time(&mut self, effective_time: NaiveDate) {
        self.effective_time = Some(effective_time);
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: Option<&str>) {
        self.description = description.unwrap_or_default().to_string();
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn ignore_name_validation(&self) -> bool {
        self.ignore_name_validation
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    pub fn mark_consumed(&mut self) {
        self.consumed = true;
    }
}
