//! `section-comment validate`: check a section declaration.

use anyhow::{Context, Result};
use std::path::Path;

use section_comment::SectionConfig;
use section_comment::document::blank_document;

pub fn cmd_validate(config_path: &Path) -> Result<()> {
    let config = SectionConfig::load(config_path)
        .with_context(|| format!("Invalid section declaration {}", config_path.display()))?;

    eprintln!(
        "{} {} ({} sections)",
        console::style("Valid:").green().bold(),
        config_path.display(),
        config.sections.len()
    );
    print!("{}", blank_document(&config));
    Ok(())
}
