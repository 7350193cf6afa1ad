//! In-memory stores for tests and dry runs.
//!
//! Both stores yield to the scheduler on every call so that concurrent
//! upserts running on one runtime interleave at the same points they would
//! against the network.

use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::{Comment, CommentRef, CommentStore, Reaction, ReactionStore, ResourceKind};
use crate::errors::{Result, SectionCommentError};

/// Call counters shared by the doubles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub create: usize,
    pub get: usize,
    pub update: usize,
}

#[derive(Debug, Default)]
struct CommentState {
    by_issue: BTreeMap<u64, Vec<u64>>,
    comments: HashMap<u64, Comment>,
    next_id: u64,
    calls: CallCounts,
    failing_writes: usize,
}

/// Comment store backed by a map, with write-failure injection.
#[derive(Debug, Default)]
pub struct MemoryCommentStore {
    state: Mutex<CommentState>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a comment on `issue` and return its id.
    pub fn insert(&self, issue: u64, body: &str) -> u64 {
        let mut state = self.lock_state();
        insert_comment(&mut state, issue, body)
    }

    /// Overwrite a comment body behind the orchestrator's back.
    pub fn set_body(&self, comment_id: u64, body: &str) {
        let mut state = self.lock_state();
        if let Some(comment) = state.comments.get_mut(&comment_id) {
            comment.body = body.to_string();
        }
    }

    pub fn body(&self, comment_id: u64) -> Option<String> {
        self.lock_state()
            .comments
            .get(&comment_id)
            .map(|c| c.body.clone())
    }

    /// Comments on `issue`, in insertion order.
    pub fn comments(&self, issue: u64) -> Vec<Comment> {
        let state = self.lock_state();
        state
            .by_issue
            .get(&issue)
            .map(|ids| ids.iter().filter_map(|id| state.comments.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> CallCounts {
        self.lock_state().calls
    }

    /// Make the next `count` create/update calls fail.
    pub fn fail_next_writes(&self, count: usize) {
        self.lock_state().failing_writes = count;
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, CommentState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_write_failure(state: &mut CommentState) -> Result<()> {
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(SectionCommentError::Other(anyhow!("injected write failure")));
        }
        Ok(())
    }
}

fn insert_comment(state: &mut CommentState, issue: u64, body: &str) -> u64 {
    state.next_id += 1;
    let id = state.next_id;
    state.comments.insert(
        id,
        Comment {
            id,
            url: Some(comment_url(issue, id)),
            body: body.to_string(),
        },
    );
    state.by_issue.entry(issue).or_default().push(id);
    id
}

fn comment_url(issue: u64, id: u64) -> String {
    format!("memory://issues/{}#issuecomment-{}", issue, id)
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn list(&self, issue: u64) -> Result<Vec<Comment>> {
        tokio::task::yield_now().await;
        self.lock_state().calls.list += 1;
        Ok(self.comments(issue))
    }

    async fn create(&self, issue: u64, body: &str) -> Result<CommentRef> {
        tokio::task::yield_now().await;
        let mut state = self.lock_state();
        state.calls.create += 1;
        Self::take_write_failure(&mut state)?;
        let id = insert_comment(&mut state, issue, body);
        Ok(CommentRef {
            id,
            url: Some(comment_url(issue, id)),
        })
    }

    async fn get(&self, comment_id: u64) -> Result<Comment> {
        tokio::task::yield_now().await;
        let mut state = self.lock_state();
        state.calls.get += 1;
        state
            .comments
            .get(&comment_id)
            .cloned()
            .ok_or_else(|| SectionCommentError::GitHub {
                status: 404,
                message: format!("comment {} not found", comment_id),
            })
    }

    async fn update(&self, comment_id: u64, body: &str) -> Result<CommentRef> {
        tokio::task::yield_now().await;
        let mut state = self.lock_state();
        state.calls.update += 1;
        Self::take_write_failure(&mut state)?;
        let comment = state
            .comments
            .get_mut(&comment_id)
            .ok_or_else(|| SectionCommentError::GitHub {
                status: 404,
                message: format!("comment {} not found", comment_id),
            })?;
        comment.body = body.to_string();
        Ok(CommentRef {
            id: comment.id,
            url: comment.url.clone(),
        })
    }
}

#[derive(Debug, Default)]
struct ReactionState {
    present: HashMap<(ResourceKind, u64), u64>,
    /// Foreign holders that let go after being observed this many more times.
    releases_after: HashMap<(ResourceKind, u64), u32>,
    next_id: u64,
    create_calls: usize,
    deleted: Vec<u64>,
    failing_creates: usize,
    failing_deletes: usize,
}

/// Reaction store that can simulate a lock held by someone else.
#[derive(Debug, Default)]
pub struct MemoryReactionStore {
    state: Mutex<ReactionState>,
}

impl MemoryReactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a reaction held by another process that never releases it.
    pub fn hold(&self, kind: ResourceKind, resource_id: u64) -> u64 {
        let mut state = self.lock_state();
        state.next_id += 1;
        let id = state.next_id;
        state.present.insert((kind, resource_id), id);
        id
    }

    /// Seed a reaction held by another process that releases it once
    /// `observations` create calls have found it present.
    pub fn hold_for(&self, kind: ResourceKind, resource_id: u64, observations: u32) -> u64 {
        let id = self.hold(kind, resource_id);
        self.lock_state()
            .releases_after
            .insert((kind, resource_id), observations);
        id
    }

    pub fn is_held(&self, kind: ResourceKind, resource_id: u64) -> bool {
        self.lock_state().present.contains_key(&(kind, resource_id))
    }

    pub fn create_calls(&self) -> usize {
        self.lock_state().create_calls
    }

    /// Reaction ids removed through `delete`, in call order.
    pub fn deleted(&self) -> Vec<u64> {
        self.lock_state().deleted.clone()
    }

    /// Make the next `count` create calls fail as if the transport broke.
    pub fn fail_next_creates(&self, count: usize) {
        self.lock_state().failing_creates = count;
    }

    /// Make the next `count` delete calls fail without removing anything.
    pub fn fail_next_deletes(&self, count: usize) {
        self.lock_state().failing_deletes = count;
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ReactionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ReactionStore for MemoryReactionStore {
    async fn create_if_absent(&self, kind: ResourceKind, resource_id: u64) -> Result<Reaction> {
        tokio::task::yield_now().await;
        let mut state = self.lock_state();
        state.create_calls += 1;
        if state.failing_creates > 0 {
            state.failing_creates -= 1;
            return Err(SectionCommentError::Other(anyhow!("injected transport failure")));
        }

        let key = (kind, resource_id);
        if let Some(id) = state.present.get(&key).copied() {
            let released = match state.releases_after.get_mut(&key) {
                Some(remaining) => {
                    *remaining = remaining.saturating_sub(1);
                    *remaining == 0
                }
                None => false,
            };
            if released {
                state.releases_after.remove(&key);
                state.present.remove(&key);
            }
            return Ok(Reaction {
                id,
                was_created: false,
            });
        }

        state.next_id += 1;
        let id = state.next_id;
        state.present.insert(key, id);
        Ok(Reaction {
            id,
            was_created: true,
        })
    }

    async fn delete(&self, kind: ResourceKind, resource_id: u64, reaction_id: u64) -> Result<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock_state();
        if state.failing_deletes > 0 {
            state.failing_deletes -= 1;
            return Err(SectionCommentError::Other(anyhow!("injected transport failure")));
        }
        let key = (kind, resource_id);
        if state.present.get(&key) == Some(&reaction_id) {
            state.present.remove(&key);
            state.releases_after.remove(&key);
        }
        state.deleted.push(reaction_id);
        Ok(())
    }
}
