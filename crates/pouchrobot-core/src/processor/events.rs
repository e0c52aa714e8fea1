// SPDX-License-Identifier: Apache-2.0

//! Webhook payload shapes and event classification.
//!
//! Payloads are decoded once per request into the fields the triage rules
//! read; everything else GitHub sends is ignored.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::RobotError;

/// Account reference inside a payload.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookUser {
    /// Login name.
    pub login: String,
}

/// Label reference inside a payload.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookLabel {
    /// Label name.
    pub name: String,
}

/// The `issue` object of `issues` and `issue_comment` events.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookIssue {
    /// Issue number.
    pub number: u64,
    /// Title.
    pub title: Option<String>,
    /// Body.
    pub body: Option<String>,
    /// Author.
    pub user: Option<WebhookUser>,
    /// Labels at the time of the event.
    #[serde(default)]
    pub labels: Vec<WebhookLabel>,
    /// Present only when the issue is a pull request.
    pub pull_request: Option<serde_json::Value>,
}

/// The `pull_request` object of `pull_request` events.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPullRequest {
    /// Pull request number.
    pub number: u64,
    /// Title.
    pub title: Option<String>,
    /// Body.
    pub body: Option<String>,
    /// Author.
    pub user: Option<WebhookUser>,
    /// Labels at the time of the event.
    #[serde(default)]
    pub labels: Vec<WebhookLabel>,
    /// Added lines.
    pub additions: Option<u64>,
    /// Deleted lines.
    pub deletions: Option<u64>,
    /// Author relationship to the repository.
    pub author_association: Option<String>,
}

/// The `comment` object of `issue_comment` events.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookComment {
    /// Comment id.
    pub id: u64,
    /// Body.
    pub body: Option<String>,
    /// Author.
    pub user: Option<WebhookUser>,
}

fn login(user: Option<&WebhookUser>) -> &str {
    user.map_or("", |u| u.login.as_str())
}

fn names(labels: &[WebhookLabel]) -> Vec<String> {
    labels.iter().map(|l| l.name.clone()).collect()
}

impl WebhookIssue {
    /// Author login, empty when GitHub omitted the user.
    #[must_use]
    pub fn author(&self) -> &str {
        login(self.user.as_ref())
    }

    /// Label names.
    #[must_use]
    pub fn label_names(&self) -> Vec<String> {
        names(&self.labels)
    }

    /// True when GitHub attached pull request links.
    #[must_use]
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

impl WebhookPullRequest {
    /// Author login, empty when GitHub omitted the user.
    #[must_use]
    pub fn author(&self) -> &str {
        login(self.user.as_ref())
    }

    /// Label names.
    #[must_use]
    pub fn label_names(&self) -> Vec<String> {
        names(&self.labels)
    }
}

impl WebhookComment {
    /// Author login, empty when GitHub omitted the user.
    #[must_use]
    pub fn author(&self) -> &str {
        login(self.user.as_ref())
    }
}

/// `issues` event.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuesEvent {
    /// Action, e.g. `opened`.
    pub action: String,
    /// The issue.
    pub issue: WebhookIssue,
}

/// `pull_request` event.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    /// Action, e.g. `synchronize`.
    pub action: String,
    /// The pull request.
    pub pull_request: WebhookPullRequest,
}

/// `issue_comment` event, for issues and pull requests alike.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentEvent {
    /// Action, e.g. `created`.
    pub action: String,
    /// The commented issue.
    pub issue: WebhookIssue,
    /// The comment.
    pub comment: WebhookComment,
    /// Previous values, present on `edited`.
    #[serde(default)]
    pub changes: Option<CommentChanges>,
}

/// `changes` object of an edited comment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentChanges {
    /// Body before the edit.
    pub body: Option<ChangedText>,
}

/// A field value before an edit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangedText {
    /// Previous text.
    pub from: String,
}

impl IssueCommentEvent {
    /// Body before an edit, if GitHub reported one.
    #[must_use]
    pub fn previous_body(&self) -> Option<&str> {
        self.changes
            .as_ref()
            .and_then(|c| c.body.as_ref())
            .map(|b| b.from.as_str())
    }
}

/// A decoded webhook event.
#[derive(Debug, Clone)]
pub enum Event {
    /// GitHub verifying the hook.
    Ping,
    /// Issue lifecycle event.
    Issues(IssuesEvent),
    /// Pull request lifecycle event.
    PullRequest(PullRequestEvent),
    /// Comment on a plain issue.
    IssueComment(IssueCommentEvent),
    /// Comment on a pull request conversation.
    PullRequestComment(IssueCommentEvent),
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, RobotError> {
    serde_json::from_slice(body).map_err(RobotError::InvalidPayload)
}

/// Decodes a webhook body according to its `X-Github-Event` type.
///
/// Comments are routed to the pull request variant when the commented issue
/// carries pull request links.
///
/// # Errors
///
/// Returns `RobotError::UnknownEvent` for unsupported event types and
/// `RobotError::InvalidPayload` when the body does not decode.
pub fn parse_event(event_type: &str, body: &[u8]) -> Result<Event, RobotError> {
    match event_type {
        "ping" => Ok(Event::Ping),
        "issues" => decode(body).map(Event::Issues),
        "pull_request" => decode(body).map(Event::PullRequest),
        "issue_comment" => {
            let event: IssueCommentEvent = decode(body)?;
            if event.issue.is_pull_request() {
                Ok(Event::PullRequestComment(event))
            } else {
                Ok(Event::IssueComment(event))
            }
        }
        other => Err(RobotError::UnknownEvent(other.to_string())),
    }
}
