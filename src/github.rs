use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::config::{RepoSlug, Settings};
use crate::errors::{Result, SectionCommentError};
use crate::store::{Comment, CommentRef, CommentStore, Reaction, ReactionStore, ResourceKind};

/// Reaction used as the lock side effect.
pub const LOCK_REACTION: &str = "eyes";

const GITHUB_API_VERSION: &str = "2022-11-28";
const PAGE_SIZE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_BODY_LIMIT: usize = 800;

/// A GitHub issue comment (subset of fields).
#[derive(Debug, Serialize, Deserialize)]
pub struct GitHubComment {
    pub id: u64,
    pub html_url: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl From<GitHubComment> for Comment {
    fn from(c: GitHubComment) -> Self {
        Comment {
            id: c.id,
            url: c.html_url,
            body: c.body.unwrap_or_default(),
        }
    }
}

impl From<GitHubComment> for CommentRef {
    fn from(c: GitHubComment) -> Self {
        CommentRef {
            id: c.id,
            url: c.html_url,
        }
    }
}

/// A GitHub reaction (subset of fields).
#[derive(Debug, Serialize, Deserialize)]
pub struct GitHubReaction {
    pub id: u64,
    pub content: String,
}

fn truncate_for_error(body: &str, limit: usize) -> String {
    if body.chars().count() <= limit {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(limit).collect();
    truncated.push_str("...");
    truncated
}

/// REST client for issue comments and reactions on one repository.
///
/// Implements both [`CommentStore`] and [`ReactionStore`]. Requests are not
/// retried here; only the lock coordinator retries, and only its creates.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    repo: RepoSlug,
}

impl GitHubClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("section-comment"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        let auth = HeaderValue::from_str(&format!("Bearer {}", settings.token))
            .map_err(|_| SectionCommentError::validation("token contains invalid characters"))?;
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            repo: settings.repo.clone(),
        })
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_url, self.repo.owner, self.repo.name, path
        )
    }

    fn reactions_path(kind: ResourceKind, resource_id: u64) -> String {
        match kind {
            ResourceKind::Issue => format!("issues/{}/reactions", resource_id),
            ResourceKind::Comment => format!("issues/comments/{}/reactions", resource_id),
        }
    }

    /// Send a request and turn non-success statuses into `GitHub` errors.
    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!(operation, status = status.as_u16(), "github request ok");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SectionCommentError::GitHub {
            status: status.as_u16(),
            message: format!("{} failed: {}", operation, truncate_for_error(&body, ERROR_BODY_LIMIT)),
        })
    }
}

#[async_trait]
impl CommentStore for GitHubClient {
    /// Paginates through all pages automatically.
    async fn list(&self, issue: u64) -> Result<Vec<Comment>> {
        let url = self.repo_url(&format!("issues/{}/comments", issue));
        let mut all = Vec::new();
        let mut page = 1u32;

        loop {
            let request = self.http.get(&url).query(&[
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ]);
            let chunk: Vec<GitHubComment> =
                self.send("list issue comments", request).await?.json().await?;

            let count = chunk.len();
            all.extend(chunk.into_iter().map(Comment::from));
            if count < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    async fn create(&self, issue: u64, body: &str) -> Result<CommentRef> {
        let request = self
            .http
            .post(self.repo_url(&format!("issues/{}/comments", issue)))
            .json(&json!({ "body": body }));
        let created: GitHubComment = self.send("create issue comment", request).await?.json().await?;
        Ok(created.into())
    }

    async fn get(&self, comment_id: u64) -> Result<Comment> {
        let request = self
            .http
            .get(self.repo_url(&format!("issues/comments/{}", comment_id)));
        let comment: GitHubComment = self.send("get issue comment", request).await?.json().await?;
        Ok(comment.into())
    }

    async fn update(&self, comment_id: u64, body: &str) -> Result<CommentRef> {
        let request = self
            .http
            .patch(self.repo_url(&format!("issues/comments/{}", comment_id)))
            .json(&json!({ "body": body }));
        let updated: GitHubComment = self.send("update issue comment", request).await?.json().await?;
        Ok(updated.into())
    }
}

#[async_trait]
impl ReactionStore for GitHubClient {
    /// GitHub answers 201 for a new reaction and 200 when the same user
    /// already left it.
    async fn create_if_absent(&self, kind: ResourceKind, resource_id: u64) -> Result<Reaction> {
        let request = self
            .http
            .post(self.repo_url(&Self::reactions_path(kind, resource_id)))
            .json(&json!({ "content": LOCK_REACTION }));
        let response = self.send("create reaction", request).await?;
        let was_created = response.status() == StatusCode::CREATED;
        let reaction: GitHubReaction = response.json().await?;
        Ok(Reaction {
            id: reaction.id,
            was_created,
        })
    }

    async fn delete(&self, kind: ResourceKind, resource_id: u64, reaction_id: u64) -> Result<()> {
        let url = self.repo_url(&format!(
            "{}/{}",
            Self::reactions_path(kind, resource_id),
            reaction_id
        ));
        match self.send("delete reaction", self.http.delete(url)).await {
            Ok(_) => Ok(()),
            Err(SectionCommentError::GitHub { status: 404, .. }) => {
                tracing::debug!(%kind, resource_id, reaction_id, "reaction already gone");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::PATCH;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> GitHubClient {
        let settings = Settings::new(
            Some("ghp_test".to_string()),
            Some("octo/widgets".to_string()),
            Some(server.base_url()),
            None,
            None,
        )
        .unwrap();
        GitHubClient::new(&settings).unwrap()
    }

    // ── helpers ──────────────────────────────────────────────────────

    #[test]
    fn test_truncate_for_error() {
        assert_eq!(truncate_for_error("short", 10), "short");
        assert_eq!(truncate_for_error("abcdef", 3), "abc...");
    }

    #[test]
    fn test_github_comment_null_body() {
        let json = r#"{"id": 5, "html_url": "https://github.com/o/r/issues/1#issuecomment-5", "body": null}"#;
        let comment: Comment = serde_json::from_str::<GitHubComment>(json).unwrap().into();
        assert_eq!(comment.id, 5);
        assert_eq!(comment.body, "");
    }

    // ── HTTP mapping ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_list_paginates_until_short_page() {
        let server = MockServer::start_async().await;
        let full_page: Vec<serde_json::Value> = (1..=100)
            .map(|id| json!({"id": id, "html_url": null, "body": "x"}))
            .collect();
        let first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/repos/octo/widgets/issues/7/comments")
                    .query_param("page", "1")
                    .query_param("per_page", "100")
                    .header("authorization", "Bearer ghp_test");
                then.status(200).json_body(json!(full_page));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/repos/octo/widgets/issues/7/comments")
                    .query_param("page", "2");
                then.status(200)
                    .json_body(json!([{"id": 101, "html_url": null, "body": "last"}]));
            })
            .await;

        let comments = client_for(&server).list(7).await.unwrap();
        assert_eq!(comments.len(), 101);
        assert_eq!(comments[100].body, "last");
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_and_update_comment() {
        let server = MockServer::start_async().await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/repos/octo/widgets/issues/7/comments")
                    .json_body(json!({"body": "hello"}));
                then.status(201).json_body(json!({
                    "id": 11,
                    "html_url": "https://github.com/octo/widgets/issues/7#issuecomment-11",
                    "body": "hello"
                }));
            })
            .await;
        let update = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/repos/octo/widgets/issues/comments/11")
                    .json_body(json!({"body": "bye"}));
                then.status(200)
                    .json_body(json!({"id": 11, "html_url": null, "body": "bye"}));
            })
            .await;

        let client = client_for(&server);
        let created = client.create(7, "hello").await.unwrap();
        assert_eq!(created.id, 11);
        assert!(created.url.unwrap().ends_with("#issuecomment-11"));
        let updated = client.update(11, "bye").await.unwrap();
        assert_eq!(updated.id, 11);
        create.assert_async().await;
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_comment() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/widgets/issues/comments/3");
                then.status(200)
                    .json_body(json!({"id": 3, "html_url": null, "body": "text"}));
            })
            .await;

        let comment = client_for(&server).get(3).await.unwrap();
        assert_eq!(comment.body, "text");
    }

    #[tokio::test]
    async fn test_create_reaction_distinguishes_created_from_existing() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/repos/octo/widgets/issues/7/reactions")
                    .json_body(json!({"content": "eyes"}));
                then.status(201).json_body(json!({"id": 900, "content": "eyes"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/repos/octo/widgets/issues/comments/55/reactions");
                then.status(200).json_body(json!({"id": 901, "content": "eyes"}));
            })
            .await;

        let client = client_for(&server);
        let fresh = client.create_if_absent(ResourceKind::Issue, 7).await.unwrap();
        assert_eq!(fresh, Reaction { id: 900, was_created: true });
        let existing = client
            .create_if_absent(ResourceKind::Comment, 55)
            .await
            .unwrap();
        assert_eq!(existing, Reaction { id: 901, was_created: false });
    }

    #[tokio::test]
    async fn test_delete_reaction_tolerates_not_found() {
        let server = MockServer::start_async().await;
        let gone = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/repos/octo/widgets/issues/7/reactions/900");
                then.status(404).body(r#"{"message":"Not Found"}"#);
            })
            .await;
        let ok = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/repos/octo/widgets/issues/comments/55/reactions/901");
                then.status(204);
            })
            .await;

        let client = client_for(&server);
        client.delete(ResourceKind::Issue, 7, 900).await.unwrap();
        client.delete(ResourceKind::Comment, 55, 901).await.unwrap();
        gone.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_becomes_github_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/repos/octo/widgets/issues/7/comments");
                then.status(403).body(r#"{"message":"Resource not accessible by integration"}"#);
            })
            .await;

        let err = client_for(&server).create(7, "x").await.unwrap_err();
        match err {
            SectionCommentError::GitHub { status, message } => {
                assert_eq!(status, 403);
                assert!(message.contains("create issue comment"));
                assert!(message.contains("not accessible"));
            }
            other => panic!("Expected GitHub error, got {:?}", other),
        }
    }
}
