//! Process-wide operation lock manager.
//!
//! One instance is shared by every versioning attempt in the process; it
//! serializes conflicting acquisitions on (repository, branch) targets.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::error::LockError;
use crate::traits::{LockContext, LockManager, LockMode, LockTarget};

const BLOCK_RETRY_INTERVAL: std::time::Duration = std::time::Duration::from_millis(50);

/// In-process lock table keyed by lock target.
///
/// A target is held by at most one context at a time. Immediate-mode
/// acquisition fails fast; block mode retries until its deadline.
#[derive(Debug, Default)]
pub struct OperationLockManager {
    held: Mutex<HashMap<LockTarget, LockContext>>,
}

impl OperationLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder of the target, if locked.
    pub fn holder(&self, target: &LockTarget) -> Option<LockContext> {
        self.held.lock().unwrap().get(target).cloned()
    }

    fn try_lock(&self, context: &LockContext, target: &LockTarget) -> Result<(), LockError> {
        let mut held = self.held.lock().unwrap();
        match held.get(target) {
            Some(owner) if owner != context => Err(LockError::AlreadyHeld {
                target: target.to_string(),
                owner: owner.user_id.clone(),
            }),
            _ => {
                held.insert(target.clone(), context.clone());
                Ok(())
            }
        }
    }
}

#[async_trait]
impl LockManager for OperationLockManager {
    async fn lock(
        &self,
        context: &LockContext,
        mode: LockMode,
        target: &LockTarget,
    ) -> Result<(), LockError> {
        match mode {
            LockMode::Immediate => self.try_lock(context, target),
            LockMode::Block(budget) => {
                let deadline = Instant::now() + budget;
                loop {
                    match self.try_lock(context, target) {
                        Ok(()) => return Ok(()),
                        Err(_) if Instant::now() < deadline => {
                            tokio::time::sleep(BLOCK_RETRY_INTERVAL).await;
                        }
                        Err(_) => {
                            return Err(LockError::Timeout {
                                target: target.to_string(),
                            })
                        }
                    }
                }
            }
        }
    }

    async fn unlock(&self, context: &LockContext, target: &LockTarget) {
        let mut held = self.held.lock().unwrap();
        if held.get(target) == Some(context) {
            held.remove(target);
            debug!(target = %target, user = %context.user_id, "lock released");
        }
    }
}
