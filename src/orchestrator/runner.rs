use std::sync::Arc;

use crate::config::SectionConfig;
use crate::document::{
    Slot, blank_document, contains_marker, get_section_content, is_managed, is_valid_section_id,
    parse, render_section, replace_section,
};
use crate::errors::{Result, SectionCommentError};
use crate::lock::LockCoordinator;
use crate::store::{Comment, CommentStore, ResourceKind};

use super::state::{UpsertOutcome, UpsertRequest, UpsertStatus};

/// Writes one producer's section into the shared comment on an issue.
///
/// Holds no state between calls: every upsert reads the comment fresh and
/// takes a fresh lock.
pub struct CommentOrchestrator {
    comments: Arc<dyn CommentStore>,
    locks: LockCoordinator,
}

impl CommentOrchestrator {
    pub fn new(comments: Arc<dyn CommentStore>, locks: LockCoordinator) -> Self {
        Self { comments, locks }
    }

    /// Create or update the caller's section.
    ///
    /// Returns without locking when there is nothing to do (`Noop`) or the
    /// stored rendering already matches (`Unchanged`).
    pub async fn upsert(
        &self,
        request: &UpsertRequest,
        config: &SectionConfig,
    ) -> Result<UpsertOutcome> {
        validate_request(request, config)?;

        let rendered = render_section(
            &request.content,
            request.title.as_deref(),
            request.collapsed,
        );

        let existing = self.find_canonical(request.issue).await?;
        match &existing {
            None if request.content.is_empty() => {
                tracing::info!(issue = request.issue, section = %request.section, "nothing to write");
                return Ok(UpsertOutcome::noop());
            }
            Some(comment) => {
                let current = get_section_content(&comment.body, &request.section)?;
                if current.as_deref() == Some(rendered.as_str()) {
                    tracing::info!(
                        issue = request.issue,
                        section = %request.section,
                        comment_id = comment.id,
                        "section unchanged"
                    );
                    return Ok(UpsertOutcome {
                        id: Some(comment.id),
                        url: comment.url.clone(),
                        status: UpsertStatus::Unchanged,
                    });
                }
            }
            None => {}
        }

        let issue = request.issue;
        let section = request.section.as_str();
        let rendered = rendered.as_str();
        let known_id = existing.map(|comment| comment.id);

        self.locks
            .with_lock(ResourceKind::Issue, issue, || async move {
                self.write_locked(issue, known_id, section, rendered, config)
                    .await
            })
            .await
    }

    /// Finish lock releases left behind by abandoned upserts.
    pub async fn wait_for_releases(&self) {
        self.locks.wait_for_releases().await;
    }

    /// Read the canonical comment, or one section of it.
    pub async fn show(&self, issue: u64, section: Option<&str>) -> Result<Option<String>> {
        let Some(comment) = self.find_canonical(issue).await? else {
            return Ok(None);
        };
        match section {
            None => Ok(Some(comment.body)),
            Some(id) => get_section_content(&comment.body, id),
        }
    }

    /// First comment in listing order that carries the outer marker.
    async fn find_canonical(&self, issue: u64) -> Result<Option<Comment>> {
        let comments = self.comments.list(issue).await?;
        let managed = comments.iter().filter(|c| is_managed(&c.body)).count();
        if managed > 1 {
            tracing::warn!(issue, managed, "several managed comments found, using the first");
        }
        Ok(comments.into_iter().find(|c| is_managed(&c.body)))
    }

    /// Re-read the comment under the lock; it may have changed while we
    /// waited.
    async fn refetch(&self, issue: u64, known_id: Option<u64>) -> Result<Option<Comment>> {
        if let Some(id) = known_id {
            match self.comments.get(id).await {
                Ok(comment) if is_managed(&comment.body) => return Ok(Some(comment)),
                Ok(_) | Err(SectionCommentError::GitHub { status: 404, .. }) => {
                    tracing::debug!(issue, comment_id = id, "managed comment moved, relisting");
                }
                Err(err) => return Err(err),
            }
        }
        self.find_canonical(issue).await
    }

    async fn write_locked(
        &self,
        issue: u64,
        known_id: Option<u64>,
        section: &str,
        rendered: &str,
        config: &SectionConfig,
    ) -> Result<UpsertOutcome> {
        match self.refetch(issue, known_id).await? {
            Some(current) => {
                let body = replace_section(&current.body, section, rendered)?;
                ensure_siblings_preserved(&current.body, &body, section)?;
                let updated = self.comments.update(current.id, &body).await?;
                tracing::info!(issue, section, comment_id = updated.id, "section updated");
                Ok(UpsertOutcome {
                    id: Some(updated.id),
                    url: updated.url.or(current.url),
                    status: UpsertStatus::Updated,
                })
            }
            None => {
                let body = replace_section(&blank_document(config), section, rendered)?;
                let created = self.comments.create(issue, &body).await?;
                tracing::info!(issue, section, comment_id = created.id, "comment created");
                Ok(UpsertOutcome {
                    id: Some(created.id),
                    url: created.url,
                    status: UpsertStatus::Created,
                })
            }
        }
    }
}

fn validate_request(request: &UpsertRequest, config: &SectionConfig) -> Result<()> {
    if request.issue == 0 {
        return Err(SectionCommentError::validation(
            "issue number must be a positive integer",
        ));
    }
    if !is_valid_section_id(&request.section) {
        return Err(SectionCommentError::validation(format!(
            "invalid section id '{}'",
            request.section
        )));
    }
    if !config.contains(&request.section) {
        return Err(SectionCommentError::UnknownSection(request.section.clone()));
    }
    if contains_marker(&request.content) {
        return Err(SectionCommentError::validation(
            "content must not contain section-comment markers",
        ));
    }
    if let Some(title) = &request.title {
        if contains_marker(title) || title.contains('\n') {
            return Err(SectionCommentError::validation(
                "title must be a single line without section-comment markers",
            ));
        }
    }
    Ok(())
}

/// Refuse to push a body that lost or altered another producer's slot.
fn ensure_siblings_preserved(before: &str, after: &str, section: &str) -> Result<()> {
    fn others(slots: Vec<Slot>, section: &str) -> Vec<(String, String)> {
        slots
            .into_iter()
            .filter(|slot| slot.id != section)
            .map(|slot| (slot.id, slot.content))
            .collect()
    }

    let before = parse(before)?;
    let after = parse(after)?;
    if before.len() != after.len() || others(before, section) != others(after, section) {
        return Err(SectionCommentError::malformed(format!(
            "rewriting section '{}' would alter other sections",
            section
        )));
    }
    Ok(())
}
