//! Collaborator seams: where comments live and where lock reactions live.
//!
//! The orchestrator and the lock coordinator only ever talk to these two
//! traits. `GitHubClient` implements both against the REST API; the
//! `memory` module provides deterministic doubles for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::Result;

pub mod memory;

pub use memory::{MemoryCommentStore, MemoryReactionStore};

/// Kind of resource a lock reaction is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Issue,
    Comment,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Issue => write!(f, "issue"),
            ResourceKind::Comment => write!(f, "comment"),
        }
    }
}

/// A comment as returned by a listing or a direct fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub url: Option<String>,
    pub body: String,
}

/// Identity of a comment after a create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRef {
    pub id: u64,
    pub url: Option<String>,
}

/// Result of an idempotent reaction create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaction {
    pub id: u64,
    /// `false` when the reaction already existed and nothing was created.
    pub was_created: bool,
}

/// Comments on a single issue.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// All comments on the issue, in listing order.
    async fn list(&self, issue: u64) -> Result<Vec<Comment>>;

    async fn create(&self, issue: u64, body: &str) -> Result<CommentRef>;

    async fn get(&self, comment_id: u64) -> Result<Comment>;

    async fn update(&self, comment_id: u64, body: &str) -> Result<CommentRef>;
}

/// Reactions used as lock side effects.
#[async_trait]
pub trait ReactionStore: Send + Sync {
    /// Create the lock reaction unless it is already present.
    async fn create_if_absent(&self, kind: ResourceKind, resource_id: u64) -> Result<Reaction>;

    async fn delete(&self, kind: ResourceKind, resource_id: u64, reaction_id: u64) -> Result<()>;
}
