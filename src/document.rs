//! Marker-delimited section documents.
//!
//! A managed comment body looks like this:
//!
//! ```text
//! <!-- section-comment id="main" -->
//!
//! # Optional title
//!
//! Optional intro
//!
//! <!-- section-comment start id="lint" -->
//! rendered content
//! <!-- section-comment end id="lint" -->
//!
//! <!-- section-comment start id="tests" -->
//!
//! <!-- section-comment end id="tests" -->
//! ```
//!
//! Slots are laid out once, in declared order, when the document is
//! created. Every later write replaces the interior of exactly one slot and
//! leaves the rest of the body untouched byte for byte, so writers never
//! need to know about each other's sections.

use regex::Regex;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::LazyLock;

use crate::config::SectionConfig;
use crate::errors::{Result, SectionCommentError};

/// Prefix shared by every marker this crate writes.
pub const MARKER_PREFIX: &str = "<!-- section-comment";

/// Marker that identifies a comment as managed.
pub const OUTER_MARKER: &str = "<!-- section-comment id=\"main\" -->";

static SECTION_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<!-- section-comment (start|end) id="([^"]*)" -->"#).unwrap()
});

/// One section slot found in a document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub id: String,
    /// Interior text, without the newline framing next to the markers.
    pub content: String,
    /// Byte range between the end of the start marker and the start of the
    /// end marker.
    gap: Range<usize>,
}

pub fn start_marker(id: &str) -> String {
    format!("{} start id=\"{}\" -->", MARKER_PREFIX, id)
}

pub fn end_marker(id: &str) -> String {
    format!("{} end id=\"{}\" -->", MARKER_PREFIX, id)
}

/// Whether `body` carries the outer marker.
pub fn is_managed(body: &str) -> bool {
    body.contains(OUTER_MARKER)
}

/// Whether `id` can be embedded in a marker.
pub fn is_valid_section_id(id: &str) -> bool {
    !id.trim().is_empty()
        && !id
            .chars()
            .any(|c| matches!(c, '"' | '<' | '>' | '\n' | '\r'))
}

/// Whether `text` contains anything that would be read back as a marker.
pub fn contains_marker(text: &str) -> bool {
    text.contains(MARKER_PREFIX)
}

/// Render a section's content, optionally wrapped in a collapsible block.
///
/// The exact output is compared against stored slots to skip no-op writes,
/// so the format must not drift.
pub fn render_section(content: &str, title: Option<&str>, collapsed: bool) -> String {
    match title {
        None => content.to_string(),
        Some(title) => {
            let open_tag = if collapsed {
                "<details>"
            } else {
                "<details open>"
            };
            format!(
                "{}\n<summary><h2>{}</h2></summary>\n\n{}\n\n</details>",
                open_tag, title, content
            )
        }
    }
}

/// Build a document with one empty slot per declared section.
pub fn blank_document(config: &SectionConfig) -> String {
    let mut body = String::from(OUTER_MARKER);
    body.push_str("\n\n");

    if let Some(title) = &config.title {
        body.push_str(&format!("# {}\n\n", title));
    }
    if let Some(intro) = &config.intro {
        body.push_str(intro.trim_end());
        body.push_str("\n\n");
    }

    let slots: Vec<String> = config
        .sections
        .iter()
        .map(|id| format!("{}\n\n{}", start_marker(id), end_marker(id)))
        .collect();
    body.push_str(&slots.join("\n\n"));
    body.push('\n');
    body
}

/// Extract every slot in file order.
pub fn parse(body: &str) -> Result<Vec<Slot>> {
    if !is_managed(body) {
        return Err(SectionCommentError::malformed(
            "outer section-comment marker is missing",
        ));
    }

    let mut slots = Vec::new();
    let mut seen = HashSet::new();
    let mut open: Option<(String, usize)> = None;

    for caps in SECTION_MARKER_REGEX.captures_iter(body) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let kind = caps.get(1).map_or("", |m| m.as_str());
        let id = caps.get(2).map_or("", |m| m.as_str());

        match (kind, open.take()) {
            ("start", None) => {
                if !seen.insert(id.to_string()) {
                    return Err(SectionCommentError::malformed(format!(
                        "section '{}' appears more than once",
                        id
                    )));
                }
                open = Some((id.to_string(), whole.end));
            }
            ("start", Some((open_id, _))) => {
                return Err(SectionCommentError::malformed(format!(
                    "section '{}' starts before section '{}' ends",
                    id, open_id
                )));
            }
            (_, None) => {
                return Err(SectionCommentError::malformed(format!(
                    "end marker for section '{}' has no start marker",
                    id
                )));
            }
            (_, Some((open_id, gap_start))) => {
                if open_id != id {
                    return Err(SectionCommentError::malformed(format!(
                        "section '{}' is closed by the end marker of '{}'",
                        open_id, id
                    )));
                }
                let gap = gap_start..whole.start;
                slots.push(Slot {
                    content: interior(&body[gap.clone()]).to_string(),
                    id: open_id,
                    gap,
                });
            }
        }
    }

    if let Some((open_id, _)) = open {
        return Err(SectionCommentError::malformed(format!(
            "section '{}' has no end marker",
            open_id
        )));
    }

    Ok(slots)
}

fn interior(gap: &str) -> &str {
    let inner = gap.strip_prefix('\n').unwrap_or(gap);
    inner.strip_suffix('\n').unwrap_or(inner)
}

/// Interior text of the named slot, if the document has one.
pub fn get_section_content(body: &str, section_id: &str) -> Result<Option<String>> {
    Ok(parse(body)?
        .into_iter()
        .find(|slot| slot.id == section_id)
        .map(|slot| slot.content))
}

/// Replace the interior of one slot, leaving every other byte of `body`
/// unchanged.
pub fn replace_section(body: &str, section_id: &str, new_content: &str) -> Result<String> {
    let slot = parse(body)?
        .into_iter()
        .find(|slot| slot.id == section_id)
        .ok_or_else(|| SectionCommentError::UnknownSection(section_id.to_string()))?;

    let mut updated = String::with_capacity(body.len() + new_content.len());
    updated.push_str(&body[..slot.gap.start]);
    updated.push('\n');
    updated.push_str(new_content);
    updated.push('\n');
    updated.push_str(&body[slot.gap.end..]);
    Ok(updated)
}
