// SPDX-License-Identifier: Apache-2.0

//! GitHub integration module.
//!
//! [`GitHubApi`] is the seam between the triage rules and the REST API. The
//! octocrab-backed [`client::GitHubClient`] talks to GitHub. The in-memory
//! `memory::MemoryGitHub` (feature `test-util`) backs tests. Both are bound
//! to a single repository.

use anyhow::Result;
use async_trait::async_trait;
use bon::Builder;
use chrono::{DateTime, Utc};

pub mod auth;
pub mod client;
pub mod comments;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;

/// `author_association` value GitHub reports for first-time contributors.
pub const FIRST_TIME_CONTRIBUTOR: &str = "FIRST_TIME_CONTRIBUTOR";

/// An issue, or the issue half of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct Issue {
    /// Issue number.
    pub number: u64,
    /// Title.
    #[builder(into, default)]
    pub title: String,
    /// Body, absent when the author left it empty.
    #[builder(into)]
    pub body: Option<String>,
    /// Author login.
    #[builder(into, default)]
    pub user: String,
    /// Attached label names.
    #[builder(default)]
    pub labels: Vec<String>,
    /// `open` or `closed`.
    #[builder(into, default = "open".to_string())]
    pub state: String,
    /// True when GitHub reports pull request links for this issue.
    #[builder(default)]
    pub is_pull_request: bool,
    /// Web URL.
    #[builder(into, default)]
    pub html_url: String,
    /// Creation time.
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    /// Last update time.
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    /// Returns true if `label` is attached.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// A pull request as returned by the single pull request endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct PullRequest {
    /// Pull request number.
    pub number: u64,
    /// Title.
    #[builder(into, default)]
    pub title: String,
    /// Body.
    #[builder(into)]
    pub body: Option<String>,
    /// Author login.
    #[builder(into, default)]
    pub user: String,
    /// `open` or `closed`.
    #[builder(into, default = "open".to_string())]
    pub state: String,
    /// `None` while GitHub is still computing mergeability.
    pub mergeable: Option<bool>,
    /// Added lines.
    pub additions: Option<u64>,
    /// Deleted lines.
    pub deletions: Option<u64>,
    /// Author relationship to the repository, e.g. `FIRST_TIME_CONTRIBUTOR`.
    #[builder(into, default)]
    pub author_association: String,
    /// Attached label names.
    #[builder(default)]
    pub labels: Vec<String>,
    /// Web URL.
    #[builder(into, default)]
    pub html_url: String,
}

impl PullRequest {
    /// Returns true if `label` is attached.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Returns true if the pull request is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == "open"
    }
}

/// A comment on an issue or pull request conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Comment id.
    pub id: u64,
    /// Body, empty when GitHub returned none.
    pub body: String,
    /// Author login.
    pub user: String,
}

/// A commit of a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Commit SHA.
    pub sha: String,
    /// Full commit message.
    pub message: String,
}

/// A pull request review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    /// Reviewer login.
    pub user: String,
    /// Submission time; pending reviews have none.
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Repository counters shown in the weekly report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepoStats {
    /// Watchers (subscribers).
    pub watchers: u64,
    /// Stargazers.
    pub stars: u64,
    /// Forks.
    pub forks: u64,
}

/// Issue search results, every page collected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    /// Total matches reported by GitHub.
    pub total_count: u64,
    /// Matching issues.
    pub items: Vec<Issue>,
}

/// Parameters for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    /// Title.
    pub title: String,
    /// Head in `user:branch` form.
    pub head: String,
    /// Base branch.
    pub base: String,
    /// Body.
    pub body: String,
}

/// Repository-scoped GitHub operations used by the bot.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Repository owner.
    fn owner(&self) -> &str;

    /// Repository name.
    fn repo(&self) -> &str;

    /// Fetches one issue (or the issue half of a pull request).
    async fn get_issue(&self, number: u64) -> Result<Issue>;

    /// Lists open issues, excluding pull requests.
    async fn list_open_issues(&self) -> Result<Vec<Issue>>;

    /// Opens an issue and returns its number.
    async fn create_issue(&self, title: &str, body: &str) -> Result<u64>;

    /// Replaces an issue body.
    async fn edit_issue_body(&self, number: u64, body: &str) -> Result<()>;

    /// Closes an issue.
    async fn close_issue(&self, number: u64) -> Result<()>;

    /// Assigns a user to an issue.
    async fn add_assignee(&self, number: u64, login: &str) -> Result<()>;

    /// Adds labels to an issue or pull request.
    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<()>;

    /// Removes one label from an issue or pull request.
    async fn remove_label(&self, number: u64, label: &str) -> Result<()>;

    /// Lists every conversation comment, oldest first.
    async fn list_comments(&self, number: u64) -> Result<Vec<Comment>>;

    /// Posts a conversation comment.
    async fn create_comment(&self, number: u64, body: &str) -> Result<()>;

    /// Deletes a conversation comment.
    async fn delete_comment(&self, comment_id: u64) -> Result<()>;

    /// Fetches one pull request, including mergeability and diff size.
    async fn get_pull(&self, number: u64) -> Result<PullRequest>;

    /// Lists open pull requests.
    async fn list_open_pulls(&self) -> Result<Vec<PullRequest>>;

    /// Lists the commits of a pull request.
    async fn list_pull_commits(&self, number: u64) -> Result<Vec<Commit>>;

    /// Lists the reviews of a pull request.
    async fn list_pull_reviews(&self, number: u64) -> Result<Vec<Review>>;

    /// Opens a pull request and returns its number.
    async fn create_pull(&self, pull: &NewPullRequest) -> Result<u64>;

    /// Fetches watcher, star and fork counts.
    async fn repo_stats(&self) -> Result<RepoStats>;

    /// Counts repository contributors.
    async fn count_contributors(&self) -> Result<u64>;

    /// Runs an issue search and collects every page GitHub serves.
    async fn search_issues(&self, query: &str) -> Result<SearchResult>;

    /// Total matches of an issue search, without collecting items.
    async fn count_issues(&self, query: &str) -> Result<u64> {
        Ok(self.search_issues(query).await?.total_count)
    }
}
