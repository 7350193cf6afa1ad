//! Mutual exclusion on top of reaction create/delete.
//!
//! GitHub has no lock primitive, but creating a reaction tells us whether
//! the reaction was new (201) or already there (200). Whoever creates it
//! holds the lock until they delete it. A holder that crashes leaves the
//! reaction behind, so the final failed attempt deletes it: that caller
//! still fails, and the next caller gets the lock on its first try.
//!
//! Callers should prefer [`LockCoordinator::with_lock`], which releases on
//! every exit path.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::errors::{Result, SectionCommentError};
use crate::retry::{Attempt, RetryPolicy, retry};
use crate::store::{ReactionStore, ResourceKind};

/// Releases started from `Drop` that have not been awaited yet.
type PendingReleases = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// Acquires reaction-backed locks with bounded retry and self-healing.
#[derive(Clone)]
pub struct LockCoordinator {
    reactions: Arc<dyn ReactionStore>,
    policy: RetryPolicy,
    pending: PendingReleases,
}

impl LockCoordinator {
    pub fn new(reactions: Arc<dyn ReactionStore>, policy: RetryPolicy) -> Self {
        Self {
            reactions,
            policy,
            pending: PendingReleases::default(),
        }
    }

    /// Acquire the lock on a resource, waiting up to the policy's bound.
    ///
    /// On the final attempt an existing reaction is treated as abandoned and
    /// deleted before `LockNotAcquired` is returned.
    pub async fn acquire(&self, kind: ResourceKind, resource_id: u64) -> Result<LockGuard> {
        let reaction_id =
            retry(self.policy, |attempt| self.try_acquire(kind, resource_id, attempt)).await?;

        tracing::debug!(%kind, resource_id, reaction_id, "lock acquired");
        Ok(LockGuard {
            reactions: Arc::clone(&self.reactions),
            pending: Arc::clone(&self.pending),
            kind,
            resource_id,
            reaction_id,
            released: false,
        })
    }

    async fn try_acquire(
        &self,
        kind: ResourceKind,
        resource_id: u64,
        attempt: Attempt,
    ) -> Result<u64> {
        let reaction = self.reactions.create_if_absent(kind, resource_id).await?;
        if reaction.was_created {
            return Ok(reaction.id);
        }

        if attempt.is_last() {
            tracing::warn!(
                %kind,
                resource_id,
                reaction_id = reaction.id,
                attempts = attempt.max_attempts,
                "lock still held after final attempt, removing stale lock"
            );
            if let Err(err) = self.reactions.delete(kind, resource_id, reaction.id).await {
                tracing::error!(
                    %kind,
                    resource_id,
                    reaction_id = reaction.id,
                    error = %err,
                    "failed to remove stale lock"
                );
            }
        } else {
            tracing::debug!(
                %kind,
                resource_id,
                attempt = attempt.number(),
                "lock held elsewhere"
            );
        }

        Err(SectionCommentError::LockNotAcquired {
            kind,
            resource_id,
            attempts: attempt.max_attempts,
        })
    }

    /// Run `body` while holding the lock on a resource.
    ///
    /// The lock is released whether `body` succeeds, fails or panics. A
    /// release failure is returned only when `body` itself succeeded. If the
    /// returned future is dropped mid-body, the guard's `Drop` starts the
    /// release in the background; see [`LockCoordinator::wait_for_releases`].
    pub async fn with_lock<T, F, Fut>(
        &self,
        kind: ResourceKind,
        resource_id: u64,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let guard = self.acquire(kind, resource_id).await?;
        let outcome = AssertUnwindSafe(body()).catch_unwind().await;
        let released = guard.release().await;

        match outcome {
            Err(panic) => std::panic::resume_unwind(panic),
            Ok(Err(err)) => {
                if let Err(release_err) = released {
                    tracing::error!(
                        %kind,
                        resource_id,
                        error = %release_err,
                        "failed to release lock after error"
                    );
                }
                Err(err)
            }
            Ok(Ok(value)) => released.map(|()| value),
        }
    }

    /// Wait for releases started by guards that were dropped unreleased.
    ///
    /// Call this before the runtime shuts down, e.g. after an interrupted
    /// upsert, so that abandoned locks are actually removed.
    pub async fn wait_for_releases(&self) {
        let handles: Vec<_> = {
            let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
            pending.drain(..).collect()
        };
        for handle in handles {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "background lock release did not finish");
            }
        }
    }
}

/// A held lock. Release it exactly once with [`LockGuard::release`].
///
/// Dropping an unreleased guard inside a tokio runtime spawns the delete in
/// the background.
#[must_use = "a lock guard must be released"]
pub struct LockGuard {
    reactions: Arc<dyn ReactionStore>,
    pending: PendingReleases,
    kind: ResourceKind,
    resource_id: u64,
    reaction_id: u64,
    released: bool,
}

impl LockGuard {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn resource_id(&self) -> u64 {
        self.resource_id
    }

    /// Id of the reaction that embodies this lock.
    pub fn token(&self) -> u64 {
        self.reaction_id
    }

    pub async fn release(mut self) -> Result<()> {
        self.reactions
            .delete(self.kind, self.resource_id, self.reaction_id)
            .await?;
        self.released = true;
        tracing::debug!(
            kind = %self.kind,
            resource_id = self.resource_id,
            reaction_id = self.reaction_id,
            "lock released"
        );
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                kind = %self.kind,
                resource_id = self.resource_id,
                reaction_id = self.reaction_id,
                "lock guard dropped outside a runtime; lock stays held until self-healed"
            );
            return;
        };

        tracing::warn!(
            kind = %self.kind,
            resource_id = self.resource_id,
            reaction_id = self.reaction_id,
            "lock guard dropped without release, releasing in background"
        );
        let reactions = Arc::clone(&self.reactions);
        let (kind, resource_id, reaction_id) = (self.kind, self.resource_id, self.reaction_id);
        let task = handle.spawn(async move {
            if let Err(err) = reactions.delete(kind, resource_id, reaction_id).await {
                tracing::error!(
                    %kind,
                    resource_id,
                    reaction_id,
                    error = %err,
                    "background lock release failed"
                );
            }
        });
        self.pending
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(task);
    }
}
