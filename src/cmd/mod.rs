//! CLI command implementations.
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `upsert`   | `Upsert`         |
//! | `show`     | `Show`           |
//! | `validate` | `Validate`       |

pub mod show;
pub mod upsert;
pub mod validate;

pub use show::cmd_show;
pub use upsert::{UpsertArgs, cmd_upsert};
pub use validate::cmd_validate;

use anyhow::{Context, Result};
use std::sync::Arc;

use section_comment::{CommentOrchestrator, GitHubClient, LockCoordinator, Settings};

use crate::Cli;

/// Resolve settings and wire the GitHub client into an orchestrator.
pub(crate) fn build_orchestrator(
    cli: &Cli,
    lock_attempts: Option<u32>,
    lock_delay_ms: Option<u64>,
) -> Result<CommentOrchestrator> {
    let settings = Settings::new(
        cli.token.clone(),
        cli.repo.clone(),
        cli.api_url.clone(),
        lock_attempts,
        lock_delay_ms,
    )?;
    let client =
        Arc::new(GitHubClient::new(&settings).context("Failed to create GitHub client")?);
    tracing::debug!(repo = %settings.repo, api_url = %settings.api_url, "using repository");

    let locks = LockCoordinator::new(client.clone(), settings.lock_policy);
    Ok(CommentOrchestrator::new(client, locks))
}
