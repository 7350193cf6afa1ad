pub mod config;
pub mod document;
pub mod errors;
pub mod github;
pub mod lock;
pub mod orchestrator;
pub mod retry;
pub mod store;

pub use config::{SectionConfig, Settings};
pub use errors::{Result, SectionCommentError};
pub use github::GitHubClient;
pub use lock::{LockCoordinator, LockGuard};
pub use orchestrator::{CommentOrchestrator, UpsertOutcome, UpsertRequest, UpsertStatus};
pub use retry::RetryPolicy;
