//! GitHub-backed task source.
//!
//! Issues become tasks; open pull requests feed the in-flight heuristic.
//! Pull requests also come through the issues endpoint, so they are
//! filtered out there.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{ChangeRef, TaskSourceAdapter};
use crate::errors::EngineError;
use crate::task::{SourceKind, Task};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct IssueLabel {
    name: String,
}

/// Subset of the issues payload we care about.
#[derive(Debug, Deserialize)]
struct GithubIssue {
    number: i64,
    title: String,
    body: Option<String>,
    #[serde(default)]
    labels: Vec<IssueLabel>,
    created_at: DateTime<Utc>,
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PullHead {
    #[serde(rename = "ref")]
    branch: String,
}

#[derive(Debug, Deserialize)]
struct GithubPull {
    title: String,
    body: Option<String>,
    head: PullHead,
}

pub struct GithubSource {
    owner_repo: String,
    token: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl GithubSource {
    /// Build a source for `owner/repo`, picking up `GITHUB_TOKEN` when
    /// set. Unauthenticated access works for public repositories at a
    /// lower rate limit.
    pub fn from_env(owner_repo: &str) -> Result<Self, EngineError> {
        let token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
        Ok(Self::new(owner_repo, token, DEFAULT_API_BASE))
    }

    pub fn new(owner_repo: &str, token: Option<String>, api_base: &str) -> Self {
        Self {
            owner_repo: owner_repo.to_string(),
            token,
            api_base: api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Canonical source reference stored on tasks and claims.
    pub fn source_ref(&self) -> String {
        format!("github:{}", self.owner_repo)
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .get(url)
            .header("User-Agent", "drydock")
            .header("Accept", "application/vnd.github+json");
        if let Some(ref token) = self.token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        req
    }

    async fn get_page<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        page: u32,
    ) -> Result<Vec<T>, EngineError> {
        let url = format!("{}/repos/{}/{}", self.api_base, self.owner_repo, path);
        let unavailable =
            |e: reqwest::Error| EngineError::SourceUnavailable(format!("GitHub: {e}"));

        self.request(&url)
            .query(&[
                ("state", "open".to_string()),
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ])
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?
            .json::<Vec<T>>()
            .await
            .map_err(unavailable)
    }

    fn normalize(&self, issue: GithubIssue) -> Task {
        Task {
            id: issue.number.to_string(),
            title: issue.title,
            body: issue.body.unwrap_or_default(),
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            created_at: issue.created_at,
            source: self.source_ref(),
            kind: SourceKind::Github,
            score: 0,
        }
    }
}

#[async_trait]
impl TaskSourceAdapter for GithubSource {
    async fn fetch(&self) -> Result<Vec<Task>, EngineError> {
        let mut tasks = Vec::new();
        let mut page = 1u32;
        loop {
            let issues: Vec<GithubIssue> = self.get_page("issues", page).await?;
            let count = issues.len();
            tasks.extend(
                issues
                    .into_iter()
                    .filter(|i| i.pull_request.is_none())
                    .map(|i| self.normalize(i)),
            );
            if count < PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }
        tracing::debug!(source = %self.source_ref(), count = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    async fn open_changes(&self) -> Result<Vec<ChangeRef>, EngineError> {
        let mut changes = Vec::new();
        let mut page = 1u32;
        loop {
            let pulls: Vec<GithubPull> = self.get_page("pulls", page).await?;
            let count = pulls.len();
            changes.extend(pulls.into_iter().map(|p| ChangeRef {
                branch: p.head.branch,
                title: p.title,
                description: p.body.unwrap_or_default(),
            }));
            if count < PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> GithubSource {
        GithubSource::new("acme/app", None, DEFAULT_API_BASE)
    }

    #[test]
    fn normalize_maps_issue_fields() {
        let issue: GithubIssue = serde_json::from_value(serde_json::json!({
            "number": 42,
            "title": "Login crashes on empty password",
            "body": "Steps to reproduce...",
            "labels": [{"name": "bug"}, {"name": "P1"}],
            "created_at": "2026-01-05T10:00:00Z",
            "pull_request": null
        }))
        .unwrap();

        let task = source().normalize(issue);
        assert_eq!(task.id, "42");
        assert_eq!(task.labels, vec!["bug", "P1"]);
        assert_eq!(task.source, "github:acme/app");
        assert_eq!(task.kind, SourceKind::Github);
        assert_eq!(task.score, 0);
    }

    #[test]
    fn normalize_tolerates_missing_body_and_labels() {
        let issue: GithubIssue = serde_json::from_value(serde_json::json!({
            "number": 7,
            "title": "x",
            "body": null,
            "created_at": "2026-01-05T10:00:00Z",
            "pull_request": null
        }))
        .unwrap();
        let task = source().normalize(issue);
        assert!(task.body.is_empty());
        assert!(task.labels.is_empty());
    }

    #[test]
    fn pull_payload_exposes_head_branch() {
        let pull: GithubPull = serde_json::from_value(serde_json::json!({
            "title": "Fix login (#42)",
            "body": "closes #42",
            "head": {"ref": "fix-login-42"}
        }))
        .unwrap();
        assert_eq!(pull.head.branch, "fix-login-42");
    }

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let s = GithubSource::new("acme/app", None, "https://ghe.local/api/v3/");
        assert_eq!(s.api_base, "https://ghe.local/api/v3");
    }
}
