use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use section_comment::config::DEFAULT_CONFIG_PATH;

mod cmd;

#[derive(Parser)]
#[command(name = "section-comment")]
#[command(
    version,
    about = "Let many CI jobs share one issue comment, each owning its own section"
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Repository as owner/repo or a github.com URL
    #[arg(long, global = true, env = "GITHUB_REPOSITORY")]
    pub repo: Option<String>,

    /// GitHub token with issues:write permission
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// GitHub REST API base URL (for GitHub Enterprise Server)
    #[arg(long, global = true, env = "GITHUB_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or update this job's section of the shared comment
    Upsert {
        /// Issue or pull request number
        #[arg(long)]
        issue: u64,

        /// Section id, as declared in the section declaration
        #[arg(long)]
        section: String,

        /// Section content (reads stdin when neither --content nor --file is given)
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,

        /// Read section content from a file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Wrap the content in a collapsible block with this heading
        #[arg(long)]
        title: Option<String>,

        /// Render the collapsible block closed
        #[arg(long, requires = "title")]
        collapsed: bool,

        /// Section declaration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Lock acquisition attempts before giving up
        #[arg(long, env = "SECTION_COMMENT_LOCK_ATTEMPTS")]
        lock_attempts: Option<u32>,

        /// Delay between lock attempts, in milliseconds
        #[arg(long, env = "SECTION_COMMENT_LOCK_DELAY_MS")]
        lock_delay_ms: Option<u64>,
    },
    /// Print the shared comment, or one section of it
    Show {
        /// Issue or pull request number
        #[arg(long)]
        issue: u64,

        /// Only print this section's content
        #[arg(long)]
        section: Option<String>,
    },
    /// Check a section declaration and print the empty document it produces
    Validate {
        /// Section declaration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Resolves on Ctrl+C, or on SIGTERM where the platform has it (CI runners
/// cancel jobs with SIGINT followed by SIGTERM).
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    eprintln!("\nShutting down...");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Upsert {
            issue,
            section,
            content,
            file,
            title,
            collapsed,
            config,
            json,
            lock_attempts,
            lock_delay_ms,
        } => {
            let args = cmd::UpsertArgs {
                issue: *issue,
                section: section.clone(),
                content: content.clone(),
                file: file.clone(),
                title: title.clone(),
                collapsed: *collapsed,
                config: config.clone(),
                json: *json,
                lock_attempts: *lock_attempts,
                lock_delay_ms: *lock_delay_ms,
            };
            cmd::cmd_upsert(&cli, args).await?;
        }
        Commands::Show { issue, section } => {
            cmd::cmd_show(&cli, *issue, section.as_deref()).await?;
        }
        Commands::Validate { config } => cmd::cmd_validate(config)?,
    }

    Ok(())
}
