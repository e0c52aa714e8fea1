// SPDX-License-Identifier: Apache-2.0

//! CI build notifications.
//!
//! Travis CI and CircleCI post a payload when a pull request build finishes.
//! A passed build clears the bot's failure comment; a failed build replaces
//! it with a fresh one carrying the build link.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::error::RobotError;
use crate::github::GitHubApi;
use crate::github::comments::remove_comments_containing;
use crate::templates::{CommentKind, Templates};

/// Outcome of a finished build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    /// `passed` (Travis) or `success` (CircleCI).
    Passed,
    /// `failed`.
    Failed,
    /// Any other state, e.g. `errored` or `canceled`.
    Other(String),
}

impl BuildStatus {
    fn parse(state: &str) -> Self {
        match state {
            "passed" | "success" => BuildStatus::Passed,
            "failed" => BuildStatus::Failed,
            other => BuildStatus::Other(other.to_string()),
        }
    }
}

/// A build notification reduced to what the bot acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiBuild {
    /// Pull request the build ran for.
    pub pull_number: u64,
    /// Build outcome.
    pub status: BuildStatus,
    /// Link to the build.
    pub build_url: String,
    /// Build duration in seconds.
    pub duration_secs: i64,
}

/// Travis CI webhook payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TravisPayload {
    /// Build id.
    pub id: i64,
    /// Build number.
    pub number: String,
    /// Pull request number; absent for push builds.
    pub pull_request_number: Option<i64>,
    /// Pull request title.
    pub pull_request_title: Option<String>,
    /// Duration in seconds.
    pub duration: Option<i64>,
    /// Commit author name.
    pub author_name: String,
    /// Commit author email.
    pub author_email: String,
    /// `push`, `pull_request`, ...
    #[serde(rename = "type")]
    pub kind: String,
    /// `passed`, `failed`, `errored`, ...
    pub state: String,
    /// Link to the build.
    pub build_url: String,
}

/// CircleCI build fields under the top-level `payload` key.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CircleCiPayload {
    /// `success`, `failed`, ...
    pub status: String,
    /// Branch, `pull/<n>` for pull request builds.
    pub branch: String,
    /// Commit subject.
    pub subject: String,
    /// Build number.
    pub build_num: i64,
    /// Link to the build.
    pub build_url: String,
    /// Duration in milliseconds.
    pub build_time_millis: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CircleCiEnvelope {
    payload: CircleCiPayload,
}

/// Turns the `\"` quoting some senders apply into plain quotes.
#[must_use]
pub fn unescape_quotes(input: &str) -> String {
    input.replace("\\\"", "\"")
}

/// Decodes `input` as-is, falling back to the unescaped form.
fn decode<T: DeserializeOwned>(input: &str) -> Result<T, RobotError> {
    match serde_json::from_str(input) {
        Ok(value) => Ok(value),
        Err(first) => {
            let unescaped = unescape_quotes(input);
            if unescaped == input {
                return Err(RobotError::InvalidPayload(first));
            }
            serde_json::from_str(&unescaped).map_err(RobotError::InvalidPayload)
        }
    }
}

fn pull_number(raw: i64) -> Result<u64, RobotError> {
    u64::try_from(raw)
        .ok()
        .filter(|n| *n > 0)
        .ok_or(RobotError::InvalidPullNumber(raw))
}

/// Decodes a Travis CI notification.
pub fn parse_travis(input: &str) -> Result<CiBuild, RobotError> {
    let payload: TravisPayload = decode(input)?;
    Ok(CiBuild {
        pull_number: pull_number(payload.pull_request_number.unwrap_or(0))?,
        status: BuildStatus::parse(&payload.state),
        build_url: payload.build_url,
        duration_secs: payload.duration.unwrap_or(0),
    })
}

/// Decodes a CircleCI notification.
///
/// Only `pull/<n>` branches are accepted; anything else is reported as an
/// invalid pull request number 0.
pub fn parse_circleci(input: &str) -> Result<CiBuild, RobotError> {
    let CircleCiEnvelope { payload } = decode(input)?;
    let raw = payload
        .branch
        .strip_prefix("pull/")
        .and_then(|n| n.parse::<i64>().ok())
        .unwrap_or(0);
    Ok(CiBuild {
        pull_number: pull_number(raw)?,
        status: BuildStatus::parse(&payload.status),
        build_url: payload.build_url,
        duration_secs: payload.build_time_millis.unwrap_or(0) / 1000,
    })
}

/// Keeps the CI failure comment of a pull request in line with its builds.
pub struct CiNotifier {
    api: Arc<dyn GitHubApi>,
    templates: Templates,
}

impl std::fmt::Debug for CiNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CiNotifier")
            .field("owner", &self.api.owner())
            .field("repo", &self.api.repo())
            .finish_non_exhaustive()
    }
}

impl CiNotifier {
    /// Creates a notifier for the repository `api` is bound to.
    #[must_use]
    pub fn new(api: Arc<dyn GitHubApi>) -> Self {
        let templates = Templates::new(api.owner(), api.repo());
        Self { api, templates }
    }

    /// Handles a Travis CI payload.
    pub async fn process_travis(&self, input: &str) -> Result<()> {
        let build = parse_travis(input)?;
        self.notify(&build).await
    }

    /// Handles a CircleCI payload.
    pub async fn process_circleci(&self, input: &str) -> Result<()> {
        let build = parse_circleci(input)?;
        self.notify(&build).await
    }

    /// Applies a decoded build outcome.
    #[instrument(skip(self, build), fields(number = build.pull_number, status = ?build.status))]
    pub async fn notify(&self, build: &CiBuild) -> Result<()> {
        let api = self.api.as_ref();
        let number = build.pull_number;
        let marker = self.templates.marker(CommentKind::CiFailure);
        info!("CI notification received");

        match &build.status {
            BuildStatus::Passed => {
                remove_comments_containing(api, number, &marker).await?;
                Ok(())
            }
            BuildStatus::Failed => {
                remove_comments_containing(api, number, &marker).await?;
                let pull = api
                    .get_pull(number)
                    .await
                    .with_context(|| format!("Failed to fetch pull request #{number}"))?;
                if !pull.is_open() {
                    debug!(state = %pull.state, "Pull request not open, no failure comment");
                    return Ok(());
                }
                let body = self
                    .templates
                    .ci_failure(&pull.user, &build.build_url, build.duration_secs);
                api.create_comment(number, &body).await?;
                info!("Posted CI failure comment");
                Ok(())
            }
            BuildStatus::Other(state) => {
                debug!(%state, "Ignoring CI state");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::PullRequest;
    use crate::github::memory::MemoryGitHub;

    fn travis(state: &str, number: i64) -> String {
        serde_json::json!({
            "id": 1,
            "number": "88",
            "pull_request_number": number,
            "duration": 512,
            "type": "pull_request",
            "state": state,
            "build_url": "https://travis-ci.org/pouchcontainer/pouch/builds/1"
        })
        .to_string()
    }

    #[test]
    fn test_parse_travis_escaped() {
        let escaped = travis("failed", 12).replace('"', "\\\"");
        let build = parse_travis(&escaped).unwrap();
        assert_eq!(build.pull_number, 12);
        assert_eq!(build.status, BuildStatus::Failed);
        assert_eq!(build.duration_secs, 512);
    }

    #[test]
    fn test_parse_travis_rejects_bad_number() {
        assert!(matches!(
            parse_travis(&travis("passed", 0)),
            Err(RobotError::InvalidPullNumber(0))
        ));
        assert!(matches!(
            parse_travis(&travis("passed", -3)),
            Err(RobotError::InvalidPullNumber(-3))
        ));
        assert!(matches!(
            parse_travis("not json"),
            Err(RobotError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_parse_circleci() {
        let body = serde_json::json!({
            "payload": {
                "status": "success",
                "branch": "pull/2044",
                "build_url": "https://circleci.com/gh/pouchcontainer/pouch/7",
                "build_time_millis": 61999
            }
        })
        .to_string();
        let build = parse_circleci(&body).unwrap();
        assert_eq!(build.pull_number, 2044);
        assert_eq!(build.status, BuildStatus::Passed);
        assert_eq!(build.duration_secs, 61);

        let master = body.replace("pull/2044", "master");
        assert!(matches!(
            parse_circleci(&master),
            Err(RobotError::InvalidPullNumber(0))
        ));
    }

    fn seeded(state: &str) -> Arc<MemoryGitHub> {
        let gh = Arc::new(MemoryGitHub::new("pouchcontainer", "pouch"));
        gh.insert_pull(PullRequest::builder().number(12).user("dev").state(state).build());
        gh
    }

    #[tokio::test]
    async fn test_failed_then_passed_leaves_no_comment() {
        let gh = seeded("open");
        let notifier = CiNotifier::new(gh.clone());

        notifier.process_travis(&travis("failed", 12)).await.unwrap();
        notifier.process_travis(&travis("failed", 12)).await.unwrap();
        let comments = gh.comments(12);
        assert_eq!(comments.len(), 1);
        assert!(comments[0].contains("build duration: 512s"));
        assert!(comments[0].starts_with("ping @dev"));

        notifier.process_travis(&travis("passed", 12)).await.unwrap();
        assert!(gh.comments(12).is_empty());
    }

    #[tokio::test]
    async fn test_failed_on_closed_pull_only_cleans() {
        let gh = seeded("closed");
        let notifier = CiNotifier::new(gh.clone());
        notifier.process_travis(&travis("failed", 12)).await.unwrap();
        assert!(gh.comments(12).is_empty());
    }

    #[tokio::test]
    async fn test_other_states_are_ignored() {
        let gh = seeded("open");
        let notifier = CiNotifier::new(gh.clone());
        notifier.process_travis(&travis("errored", 12)).await.unwrap();
        assert!(gh.comments(12).is_empty());
    }
}
