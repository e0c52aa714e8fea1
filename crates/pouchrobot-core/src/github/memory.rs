// SPDX-License-Identifier: Apache-2.0

//! In-memory [`GitHubApi`] implementation.
//!
//! Holds issues, pull requests, comments and labels for a single repository
//! and applies mutations the way GitHub would. Tests seed it with fixtures and
//! assert on the resulting state.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::{
    Comment, Commit, GitHubApi, Issue, NewPullRequest, PullRequest, RepoStats, Review,
    SearchResult,
};

#[derive(Debug, Default)]
struct State {
    issues: BTreeMap<u64, Issue>,
    pulls: BTreeMap<u64, PullRequest>,
    comments: BTreeMap<u64, Vec<Comment>>,
    commits: BTreeMap<u64, Vec<Commit>>,
    reviews: BTreeMap<u64, Vec<Review>>,
    assignees: BTreeMap<u64, Vec<String>>,
    searches: Vec<(String, SearchResult)>,
    created_pulls: Vec<NewPullRequest>,
    stats: RepoStats,
    contributors: u64,
    next_comment_id: u64,
    fail_closes: usize,
}

/// In-memory repository.
#[derive(Debug)]
pub struct MemoryGitHub {
    owner: String,
    repo: String,
    state: Mutex<State>,
}

impl MemoryGitHub {
    /// Creates an empty repository.
    #[must_use]
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            state: Mutex::new(State {
                next_comment_id: 1,
                ..State::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Adds or replaces an issue.
    pub fn insert_issue(&self, issue: Issue) {
        self.lock().issues.insert(issue.number, issue);
    }

    /// Adds or replaces a pull request together with its issue half.
    pub fn insert_pull(&self, pull: PullRequest) {
        let issue = Issue::builder()
            .number(pull.number)
            .title(pull.title.clone())
            .maybe_body(pull.body.clone())
            .user(pull.user.clone())
            .labels(pull.labels.clone())
            .state(pull.state.clone())
            .is_pull_request(true)
            .html_url(pull.html_url.clone())
            .build();
        let mut state = self.lock();
        state.issues.insert(pull.number, issue);
        state.pulls.insert(pull.number, pull);
    }

    /// Sets the mergeable flag of a pull request.
    pub fn set_mergeable(&self, number: u64, mergeable: Option<bool>) {
        if let Some(pull) = self.lock().pulls.get_mut(&number) {
            pull.mergeable = mergeable;
        }
    }

    /// Sets the diff size of a pull request.
    pub fn set_diff(&self, number: u64, additions: u64, deletions: u64) {
        if let Some(pull) = self.lock().pulls.get_mut(&number) {
            pull.additions = Some(additions);
            pull.deletions = Some(deletions);
        }
    }

    /// Sets the commits of a pull request.
    pub fn set_commits(&self, number: u64, commits: Vec<Commit>) {
        self.lock().commits.insert(number, commits);
    }

    /// Sets the reviews of a pull request.
    pub fn set_reviews(&self, number: u64, reviews: Vec<Review>) {
        self.lock().reviews.insert(number, reviews);
    }

    /// Sets repository counters.
    pub fn set_stats(&self, stats: RepoStats, contributors: u64) {
        let mut state = self.lock();
        state.stats = stats;
        state.contributors = contributors;
    }

    /// Answers searches whose query contains `needle` with `result`.
    pub fn set_search(&self, needle: &str, result: SearchResult) {
        self.lock().searches.push((needle.to_string(), result));
    }

    /// Makes the next `count` close calls fail.
    pub fn fail_next_closes(&self, count: usize) {
        self.lock().fail_closes = count;
    }

    /// Posts a comment as `user`.
    pub fn push_comment(&self, number: u64, user: &str, body: &str) {
        let mut state = self.lock();
        let id = state.next_comment_id;
        state.next_comment_id += 1;
        state.comments.entry(number).or_default().push(Comment {
            id,
            body: body.to_string(),
            user: user.to_string(),
        });
    }

    /// Comment bodies on an issue, oldest first.
    #[must_use]
    pub fn comments(&self, number: u64) -> Vec<String> {
        self.lock()
            .comments
            .get(&number)
            .map(|c| c.iter().map(|c| c.body.clone()).collect())
            .unwrap_or_default()
    }

    /// Labels attached to an issue.
    #[must_use]
    pub fn labels(&self, number: u64) -> Vec<String> {
        self.lock()
            .issues
            .get(&number)
            .map(|i| i.labels.clone())
            .unwrap_or_default()
    }

    /// Users assigned to an issue.
    #[must_use]
    pub fn assignees(&self, number: u64) -> Vec<String> {
        self.lock()
            .assignees
            .get(&number)
            .cloned()
            .unwrap_or_default()
    }

    /// Issue body as currently stored.
    #[must_use]
    pub fn body(&self, number: u64) -> Option<String> {
        self.lock().issues.get(&number).and_then(|i| i.body.clone())
    }

    /// Issue state as currently stored.
    #[must_use]
    pub fn state(&self, number: u64) -> Option<String> {
        self.lock().issues.get(&number).map(|i| i.state.clone())
    }

    /// Pull requests opened through the API.
    #[must_use]
    pub fn created_pulls(&self) -> Vec<NewPullRequest> {
        self.lock().created_pulls.clone()
    }

    /// Issues opened through the API, by number.
    #[must_use]
    pub fn issue(&self, number: u64) -> Option<Issue> {
        self.lock().issues.get(&number).cloned()
    }
}

#[async_trait]
impl GitHubApi for MemoryGitHub {
    fn owner(&self) -> &str {
        &self.owner
    }

    fn repo(&self) -> &str {
        &self.repo
    }

    async fn get_issue(&self, number: u64) -> Result<Issue> {
        match self.lock().issues.get(&number) {
            Some(issue) => Ok(issue.clone()),
            None => bail!("issue #{number} not found"),
        }
    }

    async fn list_open_issues(&self) -> Result<Vec<Issue>> {
        Ok(self
            .lock()
            .issues
            .values()
            .filter(|i| i.state == "open" && !i.is_pull_request)
            .cloned()
            .collect())
    }

    async fn create_issue(&self, title: &str, body: &str) -> Result<u64> {
        let mut state = self.lock();
        let number = state.issues.keys().next_back().map_or(1, |n| n + 1);
        state.issues.insert(
            number,
            Issue::builder()
                .number(number)
                .title(title)
                .body(body)
                .build(),
        );
        Ok(number)
    }

    async fn edit_issue_body(&self, number: u64, body: &str) -> Result<()> {
        match self.lock().issues.get_mut(&number) {
            Some(issue) => {
                issue.body = Some(body.to_string());
                Ok(())
            }
            None => bail!("issue #{number} not found"),
        }
    }

    async fn close_issue(&self, number: u64) -> Result<()> {
        let mut state = self.lock();
        if state.fail_closes > 0 {
            state.fail_closes -= 1;
            bail!("close of issue #{number} rejected");
        }
        match state.issues.get_mut(&number) {
            Some(issue) => {
                issue.state = "closed".to_string();
                Ok(())
            }
            None => bail!("issue #{number} not found"),
        }
    }

    async fn add_assignee(&self, number: u64, login: &str) -> Result<()> {
        let mut state = self.lock();
        let assignees = state.assignees.entry(number).or_default();
        if !assignees.iter().any(|a| a == login) {
            assignees.push(login.to_string());
        }
        Ok(())
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        let mut state = self.lock();
        let Some(issue) = state.issues.get_mut(&number) else {
            bail!("issue #{number} not found");
        };
        for label in labels {
            if !issue.has_label(label) {
                issue.labels.push(label.clone());
            }
        }
        let current = issue.labels.clone();
        if let Some(pull) = state.pulls.get_mut(&number) {
            pull.labels = current;
        }
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        let mut state = self.lock();
        let Some(issue) = state.issues.get_mut(&number) else {
            bail!("issue #{number} not found");
        };
        if !issue.has_label(label) {
            bail!("label {label} does not exist on #{number}");
        }
        issue.labels.retain(|l| l != label);
        let current = issue.labels.clone();
        if let Some(pull) = state.pulls.get_mut(&number) {
            pull.labels = current;
        }
        Ok(())
    }

    async fn list_comments(&self, number: u64) -> Result<Vec<Comment>> {
        Ok(self
            .lock()
            .comments
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_comment(&self, number: u64, body: &str) -> Result<()> {
        self.push_comment(number, "pouchrobot", body);
        Ok(())
    }

    async fn delete_comment(&self, comment_id: u64) -> Result<()> {
        let mut state = self.lock();
        for comments in state.comments.values_mut() {
            if let Some(pos) = comments.iter().position(|c| c.id == comment_id) {
                comments.remove(pos);
                return Ok(());
            }
        }
        bail!("comment {comment_id} not found")
    }

    async fn get_pull(&self, number: u64) -> Result<PullRequest> {
        match self.lock().pulls.get(&number) {
            Some(pull) => Ok(pull.clone()),
            None => bail!("pull request #{number} not found"),
        }
    }

    async fn list_open_pulls(&self) -> Result<Vec<PullRequest>> {
        Ok(self
            .lock()
            .pulls
            .values()
            .filter(|p| p.is_open())
            .cloned()
            .collect())
    }

    async fn list_pull_commits(&self, number: u64) -> Result<Vec<Commit>> {
        Ok(self
            .lock()
            .commits
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_pull_reviews(&self, number: u64) -> Result<Vec<Review>> {
        Ok(self
            .lock()
            .reviews
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_pull(&self, pull: &NewPullRequest) -> Result<u64> {
        let mut state = self.lock();
        state.created_pulls.push(pull.clone());
        let number = state.pulls.keys().next_back().map_or(1, |n| n + 1);
        Ok(number)
    }

    async fn repo_stats(&self) -> Result<RepoStats> {
        Ok(self.lock().stats)
    }

    async fn count_contributors(&self) -> Result<u64> {
        Ok(self.lock().contributors)
    }

    async fn search_issues(&self, query: &str) -> Result<SearchResult> {
        Ok(self
            .lock()
            .searches
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default())
    }
}
