//! `section-comment show`: read-only view of the shared comment.

use anyhow::{Result, bail};

use crate::Cli;

pub async fn cmd_show(cli: &Cli, issue: u64, section: Option<&str>) -> Result<()> {
    let orchestrator = super::build_orchestrator(cli, None, None)?;

    match orchestrator.show(issue, section).await? {
        Some(text) => {
            println!("{}", text);
            Ok(())
        }
        None => match section {
            Some(id) => bail!("Section '{}' not found on issue #{}", id, issue),
            None => bail!("No managed comment on issue #{}", issue),
        },
    }
}
