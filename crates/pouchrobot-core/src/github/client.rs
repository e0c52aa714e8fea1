// SPDX-License-Identifier: Apache-2.0

//! Octocrab-backed [`GitHubApi`] implementation.
//!
//! Reads go through raw REST routes deserialized into small local structs and
//! are retried with exponential backoff. Mutations are sent once.

use anyhow::{Context, Result};
use async_trait::async_trait;
use backon::Retryable;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use octocrab::models::CommentId;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::{
    Comment, Commit, GitHubApi, Issue, NewPullRequest, PullRequest, RepoStats, Review,
    SearchResult,
};
use crate::retry::{is_retryable_anyhow, retry_backoff};

const PER_PAGE: usize = 100;

/// GitHub search returns at most this many results per query.
const SEARCH_LIMIT: u64 = 1000;

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    #[serde(default)]
    title: String,
    body: Option<String>,
    user: Option<RawUser>,
    #[serde(default)]
    labels: Vec<RawLabel>,
    state: String,
    pull_request: Option<serde_json::Value>,
    #[serde(default)]
    html_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RawIssue> for Issue {
    fn from(raw: RawIssue) -> Self {
        Issue {
            number: raw.number,
            title: raw.title,
            body: raw.body,
            user: raw.user.map(|u| u.login).unwrap_or_default(),
            labels: raw.labels.into_iter().map(|l| l.name).collect(),
            state: raw.state,
            is_pull_request: raw.pull_request.is_some(),
            html_url: raw.html_url,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPull {
    number: u64,
    #[serde(default)]
    title: String,
    body: Option<String>,
    user: Option<RawUser>,
    state: String,
    mergeable: Option<bool>,
    additions: Option<u64>,
    deletions: Option<u64>,
    #[serde(default)]
    author_association: String,
    #[serde(default)]
    labels: Vec<RawLabel>,
    #[serde(default)]
    html_url: String,
}

impl From<RawPull> for PullRequest {
    fn from(raw: RawPull) -> Self {
        PullRequest {
            number: raw.number,
            title: raw.title,
            body: raw.body,
            user: raw.user.map(|u| u.login).unwrap_or_default(),
            state: raw.state,
            mergeable: raw.mergeable,
            additions: raw.additions,
            deletions: raw.deletions,
            author_association: raw.author_association,
            labels: raw.labels.into_iter().map(|l| l.name).collect(),
            html_url: raw.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: u64,
    body: Option<String>,
    user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawCommitDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    sha: String,
    commit: RawCommitDetail,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    user: Option<RawUser>,
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RawRepo {
    #[serde(default)]
    subscribers_count: u64,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
}

#[derive(Debug, Deserialize)]
struct RawSearch {
    total_count: u64,
    items: Vec<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct Created {
    number: u64,
}

/// GitHub client bound to one repository.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubClient {
    /// Wraps an authenticated octocrab client for `owner/repo`.
    #[must_use]
    pub fn new(client: Octocrab, owner: &str, repo: &str) -> Self {
        Self {
            client,
            owner: owner.to_string(),
            repo: repo.to_string(),
        }
    }

    fn repo_route(&self, path: &str) -> String {
        format!("/repos/{}/{}{path}", self.owner, self.repo)
    }

    /// GET with retry on transient failures.
    async fn get_json<T: DeserializeOwned>(&self, route: &str) -> Result<T> {
        (|| async {
            self.client
                .get::<T, _, _>(route, None::<&()>)
                .await
                .map_err(|e| anyhow::anyhow!(e))
        })
        .retry(retry_backoff())
        .when(is_retryable_anyhow)
        .notify(|err, dur| {
            warn!(
                error = %err,
                retry_after = ?dur,
                route = %route,
                "Retrying GitHub read"
            );
        })
        .await
        .with_context(|| format!("Failed to GET {route}"))
    }

    /// Collects every page of a list endpoint.
    async fn get_all_pages<T: DeserializeOwned>(&self, route: &str) -> Result<Vec<T>> {
        let separator = if route.contains('?') { '&' } else { '?' };
        let mut items = Vec::new();
        for page in 1.. {
            let paged = format!("{route}{separator}per_page={PER_PAGE}&page={page}");
            let batch: Vec<T> = self.get_json(&paged).await?;
            let done = batch.len() < PER_PAGE;
            items.extend(batch);
            if done {
                break;
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    fn owner(&self) -> &str {
        &self.owner
    }

    fn repo(&self) -> &str {
        &self.repo
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn get_issue(&self, number: u64) -> Result<Issue> {
        let raw: RawIssue = self
            .get_json(&self.repo_route(&format!("/issues/{number}")))
            .await?;
        Ok(raw.into())
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn list_open_issues(&self) -> Result<Vec<Issue>> {
        let raw: Vec<RawIssue> = self
            .get_all_pages(&self.repo_route("/issues?state=open"))
            .await?;
        Ok(raw
            .into_iter()
            .map(Issue::from)
            .filter(|i| !i.is_pull_request)
            .collect())
    }

    #[instrument(skip(self, body), fields(owner = %self.owner, repo = %self.repo))]
    async fn create_issue(&self, title: &str, body: &str) -> Result<u64> {
        debug!("Creating GitHub issue");

        let issue = self
            .client
            .issues(&self.owner, &self.repo)
            .create(title)
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to create issue in {}/{}", self.owner, self.repo))?;

        debug!(number = issue.number, "Issue created successfully");
        Ok(issue.number)
    }

    #[instrument(skip(self, body), fields(owner = %self.owner, repo = %self.repo))]
    async fn edit_issue_body(&self, number: u64, body: &str) -> Result<()> {
        let route = self.repo_route(&format!("/issues/{number}"));
        let payload = serde_json::json!({ "body": body });
        self.client
            .patch::<serde_json::Value, _, _>(route, Some(&payload))
            .await
            .with_context(|| format!("Failed to edit body of issue #{number}"))?;
        Ok(())
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn close_issue(&self, number: u64) -> Result<()> {
        let route = self.repo_route(&format!("/issues/{number}"));
        let payload = serde_json::json!({ "state": "closed" });
        self.client
            .patch::<serde_json::Value, _, _>(route, Some(&payload))
            .await
            .with_context(|| format!("Failed to close issue #{number}"))?;
        Ok(())
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn add_assignee(&self, number: u64, login: &str) -> Result<()> {
        let route = self.repo_route(&format!("/issues/{number}/assignees"));
        let payload = serde_json::json!({ "assignees": [login] });
        self.client
            .post::<_, serde_json::Value>(route, Some(&payload))
            .await
            .with_context(|| format!("Failed to assign {login} to issue #{number}"))?;
        Ok(())
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            debug!("No labels to apply");
            return Ok(());
        }

        let route = self.repo_route(&format!("/issues/{number}/labels"));
        let payload = serde_json::json!({ "labels": labels });

        self.client
            .post::<_, serde_json::Value>(route, Some(&payload))
            .await
            .with_context(|| {
                format!(
                    "Failed to apply labels to issue/PR #{number} in {}/{}",
                    self.owner, self.repo
                )
            })?;

        debug!(labels = ?labels, "Labels applied successfully");
        Ok(())
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        let encoded = utf8_percent_encode(label, NON_ALPHANUMERIC);
        let route = self.repo_route(&format!("/issues/{number}/labels/{encoded}"));
        self.client
            .delete::<serde_json::Value, _, _>(route, None::<&()>)
            .await
            .with_context(|| format!("Failed to remove label {label} from #{number}"))?;
        Ok(())
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn list_comments(&self, number: u64) -> Result<Vec<Comment>> {
        let raw: Vec<RawComment> = self
            .get_all_pages(&self.repo_route(&format!("/issues/{number}/comments")))
            .await?;
        Ok(raw
            .into_iter()
            .map(|c| Comment {
                id: c.id,
                body: c.body.unwrap_or_default(),
                user: c.user.map(|u| u.login).unwrap_or_default(),
            })
            .collect())
    }

    #[instrument(skip(self, body), fields(owner = %self.owner, repo = %self.repo))]
    async fn create_comment(&self, number: u64, body: &str) -> Result<()> {
        debug!("Posting comment");

        let comment = self
            .client
            .issues(&self.owner, &self.repo)
            .create_comment(number, body)
            .await
            .with_context(|| format!("Failed to post comment to #{number}"))?;

        debug!(url = %comment.html_url, "Comment posted successfully");
        Ok(())
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn delete_comment(&self, comment_id: u64) -> Result<()> {
        self.client
            .issues(&self.owner, &self.repo)
            .delete_comment(CommentId(comment_id))
            .await
            .with_context(|| format!("Failed to delete comment {comment_id}"))?;
        Ok(())
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn get_pull(&self, number: u64) -> Result<PullRequest> {
        let raw: RawPull = self
            .get_json(&self.repo_route(&format!("/pulls/{number}")))
            .await?;
        Ok(raw.into())
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn list_open_pulls(&self) -> Result<Vec<PullRequest>> {
        let raw: Vec<RawPull> = self
            .get_all_pages(&self.repo_route("/pulls?state=open"))
            .await?;
        Ok(raw.into_iter().map(PullRequest::from).collect())
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn list_pull_commits(&self, number: u64) -> Result<Vec<Commit>> {
        let raw: Vec<RawCommit> = self
            .get_all_pages(&self.repo_route(&format!("/pulls/{number}/commits")))
            .await?;
        Ok(raw
            .into_iter()
            .map(|c| Commit {
                sha: c.sha,
                message: c.commit.message,
            })
            .collect())
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn list_pull_reviews(&self, number: u64) -> Result<Vec<Review>> {
        let raw: Vec<RawReview> = self
            .get_all_pages(&self.repo_route(&format!("/pulls/{number}/reviews")))
            .await?;
        Ok(raw
            .into_iter()
            .map(|r| Review {
                user: r.user.map(|u| u.login).unwrap_or_default(),
                submitted_at: r.submitted_at,
            })
            .collect())
    }

    #[instrument(skip(self, pull), fields(owner = %self.owner, repo = %self.repo, head = %pull.head))]
    async fn create_pull(&self, pull: &NewPullRequest) -> Result<u64> {
        let route = self.repo_route("/pulls");
        let payload = serde_json::json!({
            "title": pull.title,
            "head": pull.head,
            "base": pull.base,
            "body": pull.body,
        });
        let created: Created = self
            .client
            .post(route, Some(&payload))
            .await
            .with_context(|| format!("Failed to open pull request from {}", pull.head))?;

        debug!(number = created.number, "Pull request created successfully");
        Ok(created.number)
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn repo_stats(&self) -> Result<RepoStats> {
        let raw: RawRepo = self.get_json(&self.repo_route("")).await?;
        Ok(RepoStats {
            watchers: raw.subscribers_count,
            stars: raw.stargazers_count,
            forks: raw.forks_count,
        })
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn count_contributors(&self) -> Result<u64> {
        let raw: Vec<serde_json::Value> = self
            .get_all_pages(&self.repo_route("/contributors"))
            .await?;
        Ok(raw.len() as u64)
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn search_issues(&self, query: &str) -> Result<SearchResult> {
        let q = utf8_percent_encode(query, NON_ALPHANUMERIC).to_string();
        let mut result = SearchResult::default();
        let mut page = 1;
        loop {
            let route = format!("/search/issues?q={q}&per_page={PER_PAGE}&page={page}");
            let raw: RawSearch = self.get_json(&route).await?;
            result.total_count = raw.total_count;
            let short = raw.items.len() < PER_PAGE;
            result.items.extend(raw.items.into_iter().map(Issue::from));
            if short || page >= last_search_page(raw.total_count) {
                break;
            }
            page += 1;
        }
        if result.total_count > SEARCH_LIMIT {
            warn!(
                total = result.total_count,
                collected = result.items.len(),
                "Search truncated at the GitHub result limit"
            );
        }
        debug!(total = result.total_count, "Search completed");
        Ok(result)
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn count_issues(&self, query: &str) -> Result<u64> {
        let q = utf8_percent_encode(query, NON_ALPHANUMERIC).to_string();
        let raw: RawSearch = self
            .get_json(&format!("/search/issues?q={q}&per_page=1"))
            .await?;
        Ok(raw.total_count)
    }
}

/// Last page GitHub serves for a search with `total_count` matches.
fn last_search_page(total_count: u64) -> u64 {
    total_count.min(SEARCH_LIMIT).div_ceil(PER_PAGE as u64).max(1)
}
