//! `section-comment upsert`: write one section of the shared comment.

use anyhow::{Context, Result, bail};
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

use section_comment::{SectionConfig, UpsertOutcome, UpsertRequest, UpsertStatus};

use crate::Cli;

pub struct UpsertArgs {
    pub issue: u64,
    pub section: String,
    pub content: Option<String>,
    pub file: Option<PathBuf>,
    pub title: Option<String>,
    pub collapsed: bool,
    pub config: PathBuf,
    pub json: bool,
    pub lock_attempts: Option<u32>,
    pub lock_delay_ms: Option<u64>,
}

pub async fn cmd_upsert(cli: &Cli, args: UpsertArgs) -> Result<()> {
    let config = SectionConfig::load(&args.config).with_context(|| {
        format!(
            "Failed to load section declaration {}",
            args.config.display()
        )
    })?;
    let content = read_content(args.content, args.file.as_deref())?;
    let orchestrator = super::build_orchestrator(cli, args.lock_attempts, args.lock_delay_ms)?;

    let mut request = UpsertRequest::new(args.issue, args.section, content);
    if let Some(title) = args.title {
        request = request.with_title(title, args.collapsed);
    }

    // Dropping the upsert on interrupt hands any held lock to a background
    // release, which must finish before the runtime goes away.
    let outcome = tokio::select! {
        outcome = orchestrator.upsert(&request, &config) => outcome?,
        _ = crate::shutdown_signal() => {
            orchestrator.wait_for_releases().await;
            bail!("Interrupted before section '{}' was written", request.section);
        }
    };
    print_outcome(&outcome, args.json)
}

/// Content comes from `--content`, then `--file`, then piped stdin.
fn read_content(content: Option<String>, file: Option<&Path>) -> Result<String> {
    if let Some(content) = content {
        return Ok(content);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read content file {}", path.display()));
    }

    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        bail!("No content given: pass --content, --file, or pipe content on stdin");
    }
    let mut buffer = String::new();
    stdin
        .lock()
        .read_to_string(&mut buffer)
        .context("Failed to read content from stdin")?;
    Ok(buffer)
}

fn print_outcome(outcome: &UpsertOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(outcome)?);
        return Ok(());
    }

    let status = match outcome.status {
        UpsertStatus::Created | UpsertStatus::Updated => {
            console::style(outcome.status.to_string()).green()
        }
        UpsertStatus::Unchanged | UpsertStatus::Noop => {
            console::style(outcome.status.to_string()).dim()
        }
    };
    match (outcome.id, &outcome.url) {
        (Some(id), Some(url)) => println!("{} comment {} {}", status, id, url),
        (Some(id), None) => println!("{} comment {}", status, id),
        _ => println!("{}", status),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn inline_content_wins() {
        let content = read_content(Some("inline".to_string()), None).unwrap();
        assert_eq!(content, "inline");
    }

    #[test]
    fn reads_content_file_verbatim() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.md");
        std::fs::write(&path, "| a | b |\n|---|---|\n").unwrap();
        let content = read_content(None, Some(&path)).unwrap();
        assert_eq!(content, "| a | b |\n|---|---|\n");
    }

    #[test]
    fn missing_content_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = read_content(None, Some(&dir.path().join("missing.md"))).unwrap_err();
        assert!(err.to_string().contains("missing.md"));
    }
}
