//! End-to-end section writes against a shared comment.
//!
//! `CommentOrchestrator::upsert` finds the canonical comment, skips the
//! write when the caller's section is already up to date, and otherwise
//! merges under an issue-level lock.

pub mod runner;
pub mod state;

pub use runner::CommentOrchestrator;
pub use state::{UpsertOutcome, UpsertRequest, UpsertStatus};
