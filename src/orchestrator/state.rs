use serde::{Deserialize, Serialize};
use std::fmt;

/// What an upsert did to the shared comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertStatus {
    /// No managed comment existed; one was created.
    Created,
    /// The managed comment was rewritten with the new section.
    Updated,
    /// The section already held the same rendering; nothing was written.
    Unchanged,
    /// No managed comment and nothing to write.
    Noop,
}

impl fmt::Display for UpsertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpsertStatus::Created => write!(f, "created"),
            UpsertStatus::Updated => write!(f, "updated"),
            UpsertStatus::Unchanged => write!(f, "unchanged"),
            UpsertStatus::Noop => write!(f, "noop"),
        }
    }
}

/// Result of an upsert. `id` and `url` are absent for `Noop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub id: Option<u64>,
    pub url: Option<String>,
    pub status: UpsertStatus,
}

impl UpsertOutcome {
    pub fn noop() -> Self {
        Self {
            id: None,
            url: None,
            status: UpsertStatus::Noop,
        }
    }
}

/// One producer's write to its section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertRequest {
    pub issue: u64,
    pub section: String,
    pub content: String,
    pub title: Option<String>,
    pub collapsed: bool,
}

impl UpsertRequest {
    pub fn new(issue: u64, section: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            issue,
            section: section.into(),
            content: content.into(),
            title: None,
            collapsed: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>, collapsed: bool) -> Self {
        self.title = Some(title.into());
        self.collapsed = collapsed;
        self
    }
}
