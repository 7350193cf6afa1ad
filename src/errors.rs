//! Typed error hierarchy for section-comment.
//!
//! A single enum covers the library: validation failures are fatal and never
//! retried, `LockNotAcquired` is the only contention signal, and the two
//! document variants describe bodies the merger refuses to touch.

use thiserror::Error;

use crate::store::ResourceKind;

/// Errors surfaced by the lock coordinator, the document merger and the
/// comment orchestrator.
#[derive(Debug, Error)]
pub enum SectionCommentError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Could not acquire lock on {kind} {resource_id} after {attempts} attempts")]
    LockNotAcquired {
        kind: ResourceKind,
        resource_id: u64,
        attempts: u32,
    },

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Section '{0}' has no slot in the document")]
    UnknownSection(String),

    #[error("GitHub API returned {status}: {message}")]
    GitHub { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SectionCommentError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedDocument(message.into())
    }
}

pub type Result<T, E = SectionCommentError> = std::result::Result<T, E>;
