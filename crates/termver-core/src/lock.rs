//! Lock coordination for one versioning attempt.
//!
//! Each attempt owns its own coordinator; the underlying `LockManager` is
//! process-wide shared state that serializes conflicting acquisitions
//! across attempts.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::error::{Result, VersioningError};
use termver_store::{BranchPath, LockContext, LockManager, LockMode, LockTarget, RepositoryId};

/// Lock context description used for version configuration locks.
pub const CONFIGURE_VERSION: &str = "configure new version";

/// Per-attempt map of tooling id to its acquired (context, target) pair.
///
/// Acquisition is all-or-nothing: when any target fails, every lock taken
/// for this attempt is released and the internal map is torn down before
/// the error propagates, so a retry starts clean.
pub struct LockCoordinator {
    manager: Arc<dyn LockManager>,
    user_id: String,
    held: HashMap<String, (LockContext, LockTarget)>,
}

impl LockCoordinator {
    pub fn new(manager: Arc<dyn LockManager>, user_id: impl Into<String>) -> Self {
        Self {
            manager,
            user_id: user_id.into(),
            held: HashMap::new(),
        }
    }

    /// Whether any lock is currently held by this attempt.
    pub fn is_locked(&self) -> bool {
        !self.held.is_empty()
    }

    /// Acquire an immediate lock on the main branch of every listed
    /// tooling area's repository.
    pub async fn acquire(&mut self, toolings: &[(String, RepositoryId)]) -> Result<()> {
        for (tooling_id, repository) in toolings {
            let context = LockContext::new(self.user_id.clone(), CONFIGURE_VERSION);
            let target = LockTarget::new(*repository, BranchPath::main());
            if let Err(e) = self
                .manager
                .lock(&context, LockMode::Immediate, &target)
                .await
            {
                warn!(tooling = %tooling_id, target = %target, "lock acquisition failed, rolling back");
                self.tear_down().await;
                return Err(VersioningError::Lock(e));
            }
            debug!(tooling = %tooling_id, target = %target, "lock acquired");
            self.held
                .insert(tooling_id.clone(), (context, target));
        }
        Ok(())
    }

    /// Release every lock held by this attempt. Idempotent: releasing an
    /// already-released coordinator is a no-op.
    pub async fn release(&mut self) {
        for (context, target) in self.held.values() {
            self.manager.unlock(context, target).await;
        }
        self.held.clear();
    }

    /// Release all locks and clear the per-attempt state after a failure.
    async fn tear_down(&mut self) {
        self.release().await;
    }
}
