// SPDX-License-Identifier: Apache-2.0

//! Closes issues that saw no activity for too long.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, instrument, warn};

use crate::config::SchedulerConfig;
use crate::github::{GitHubApi, Issue};

/// Returns true if `issue` was last updated more than `max_days` before `now`.
#[must_use]
pub fn is_out_of_date(issue: &Issue, now: DateTime<Utc>, max_days: i64) -> bool {
    now - issue.updated_at > Duration::days(max_days)
}

/// Close-out-of-date issue task.
pub struct IssueScheduler {
    api: Arc<dyn GitHubApi>,
    config: SchedulerConfig,
}

impl std::fmt::Debug for IssueScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueScheduler")
            .field("repo", &self.api.repo())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IssueScheduler {
    /// Creates the task.
    #[must_use]
    pub fn new(api: Arc<dyn GitHubApi>, config: SchedulerConfig) -> Self {
        Self { api, config }
    }

    /// Returns false when no day limit is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.max_day_of_no_action_issue > 0
    }

    /// Closes out-of-date issues, re-running the pass after a failure.
    ///
    /// Up to `max_retry` extra passes run, without delay. Returns the number
    /// of issues closed across all passes, or the last error once retries
    /// are exhausted.
    #[instrument(skip(self), fields(repo = %self.api.repo()))]
    pub async fn close_out_of_date_issues(&self, now: DateTime<Utc>) -> Result<usize> {
        if !self.is_enabled() {
            return Ok(0);
        }

        let mut closed = 0;
        let mut retries_left = self.config.max_retry;
        loop {
            let (count, failure) = self.close_pass(now).await;
            closed += count;
            match failure {
                None => {
                    info!(closed, "Closed out-of-date issues");
                    return Ok(closed);
                }
                Some(e) if retries_left > 0 => {
                    warn!(error = %e, retries_left, "Close pass failed, retrying");
                    retries_left -= 1;
                }
                Some(e) => return Err(e.context("Closing out-of-date issues failed")),
            }
        }
    }

    /// One pass. Keeps closing after a failed close and reports the last error.
    async fn close_pass(&self, now: DateTime<Utc>) -> (usize, Option<anyhow::Error>) {
        let issues = match self
            .api
            .list_open_issues()
            .await
            .context("Failed to list open issues")
        {
            Ok(issues) => issues,
            Err(e) => return (0, Some(e)),
        };

        let max_days = self.config.max_day_of_no_action_issue;
        let mut closed = 0;
        let mut failure = None;
        for issue in issues.iter().filter(|i| is_out_of_date(i, now, max_days)) {
            match self.api.close_issue(issue.number).await {
                Ok(()) => {
                    info!(number = issue.number, "Closed out-of-date issue");
                    closed += 1;
                }
                Err(e) => {
                    error!(number = issue.number, error = %e, "Failed to close issue");
                    failure = Some(e);
                }
            }
        }
        (closed, failure)
    }
}
