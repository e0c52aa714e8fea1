// SPDX-License-Identifier: Apache-2.0

//! Pull request triage: labels, size, length checks, sign-off and welcome.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use super::events::{PullRequestEvent, WebhookPullRequest};
use super::{Processor, text_len};
use crate::error::RobotError;
use crate::github::comments::{
    drop_label, ensure_comment, remove_comments_containing, replace_comment,
};
use crate::github::{Commit, FIRST_TIME_CONTRIBUTOR};
use crate::labels::{CONFLICT_LABEL, is_size_label, label_delta};
use crate::templates::CommentKind;

/// Developer Certificate of Origin trailer.
static SIGN_OFF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)(Docker-DCO-1.1-)?Signed-off-by: ([^<]+) <([^<>@]+@[^<>]+)>( \(github: ([a-zA-Z0-9][a-zA-Z0-9-]+)\))?",
    )
    .expect("sign-off pattern is a valid regex")
});

/// Returns true if every commit message carries a sign-off trailer.
#[must_use]
pub fn all_signed_off(commits: &[Commit]) -> bool {
    commits.iter().all(|c| SIGN_OFF.is_match(&c.message))
}

impl Processor {
    pub(super) async fn process_pull_request(&self, event: PullRequestEvent) -> Result<()> {
        let pr = &event.pull_request;
        info!(number = pr.number, action = %event.action, "Processing pull request event");

        match event.action.as_str() {
            "opened" => self.pull_request_opened(pr).await,
            "edited" => self.pull_request_edited(pr).await,
            "synchronize" => self.pull_request_synchronized(pr).await,
            "labeled" | "review_requested" | "pull_request_review" | "closed" | "reopened"
            | "assigned" | "unassigned" | "unlabeled" | "review_request_removed"
            | "ready_for_review" => {
                debug!(action = %event.action, "Nothing to do for pull request action");
                Ok(())
            }
            other => Err(RobotError::UnknownAction(other.to_string()).into()),
        }
    }

    #[instrument(skip(self, pr), fields(number = pr.number))]
    async fn pull_request_opened(&self, pr: &WebhookPullRequest) -> Result<()> {
        self.attach_pull_request_labels(pr).await?;
        self.sync_size_label(pr.number, pr.additions, pr.deletions)
            .await?;
        self.check_pull_request_lengths(pr).await?;
        self.sync_sign_off_comment(pr.number, pr.author()).await?;
        self.welcome_first_time_contributor(pr).await
    }

    #[instrument(skip(self, pr), fields(number = pr.number))]
    async fn pull_request_edited(&self, pr: &WebhookPullRequest) -> Result<()> {
        self.attach_pull_request_labels(pr).await?;
        self.check_pull_request_lengths(pr).await
    }

    /// New commits were pushed: clear a resolved conflict, resize, re-check
    /// sign-off.
    #[instrument(skip(self, pr), fields(number = pr.number))]
    async fn pull_request_synchronized(&self, pr: &WebhookPullRequest) -> Result<()> {
        let api = self.api.as_ref();
        let fresh = api.get_pull(pr.number).await?;

        if fresh.mergeable == Some(true) && fresh.has_label(CONFLICT_LABEL) {
            api.remove_label(pr.number, CONFLICT_LABEL).await?;
            let marker = self.templates.marker(CommentKind::Conflict);
            let removed = remove_comments_containing(api, pr.number, &marker).await?;
            info!(removed, "Conflict resolved");
        }

        self.sync_size_label(pr.number, fresh.additions, fresh.deletions)
            .await?;
        self.sync_sign_off_comment(pr.number, pr.author()).await
    }

    async fn attach_pull_request_labels(&self, pr: &WebhookPullRequest) -> Result<()> {
        let current = self.api.get_issue(pr.number).await?.labels;
        let candidates = self.rules.classify(pr.title.as_deref(), pr.body.as_deref());
        let delta = label_delta(&candidates, &current);
        if delta.is_empty() {
            return Ok(());
        }
        self.api.add_labels(pr.number, &delta).await?;
        info!(labels = ?delta, "Attached classified labels");
        Ok(())
    }

    /// Replaces any stale `size/*` label with the one matching the diff.
    async fn sync_size_label(
        &self,
        number: u64,
        additions: Option<u64>,
        deletions: Option<u64>,
    ) -> Result<()> {
        let api = self.api.as_ref();
        let wanted = self
            .triage
            .size_thresholds
            .label_for_diff(additions, deletions);
        let current = api.get_issue(number).await?.labels;

        for stale in current.iter().filter(|l| is_size_label(l) && **l != wanted) {
            if let Err(e) = drop_label(api, number, &current, stale).await {
                warn!(label = %stale, error = %e, "Failed to remove stale size label");
            }
        }
        if current.iter().any(|l| *l == wanted) {
            return Ok(());
        }
        api.add_labels(number, std::slice::from_ref(&wanted)).await?;
        info!(label = %wanted, "Set size label");
        Ok(())
    }

    /// Posts or clears the title and description length comments.
    async fn check_pull_request_lengths(&self, pr: &WebhookPullRequest) -> Result<()> {
        let checks = [
            (
                CommentKind::PrTitleTooShort,
                text_len(pr.title.as_deref()),
                self.triage.title_min_len,
            ),
            (
                CommentKind::PrDescriptionTooShort,
                text_len(pr.body.as_deref()),
                self.triage.pr_body_min_len,
            ),
        ];

        for (kind, len, min_len) in checks {
            let marker = self.templates.marker(kind);
            if len < min_len {
                let body = self.templates.too_short(kind, pr.author(), min_len);
                ensure_comment(self.api.as_ref(), pr.number, &marker, &body).await?;
            } else {
                remove_comments_containing(self.api.as_ref(), pr.number, &marker).await?;
            }
        }
        Ok(())
    }

    /// Leaves exactly one sign-off reminder while any commit lacks a trailer.
    async fn sync_sign_off_comment(&self, number: u64, author: &str) -> Result<()> {
        let api = self.api.as_ref();
        let commits = api.list_pull_commits(number).await?;
        let marker = self.templates.marker(CommentKind::NeedsSignOff);

        if all_signed_off(&commits) {
            remove_comments_containing(api, number, &marker).await?;
            return Ok(());
        }

        let body = self.templates.render(CommentKind::NeedsSignOff, author);
        replace_comment(api, number, &marker, &body).await?;
        info!(number, "Asked author to sign off commits");
        Ok(())
    }

    async fn welcome_first_time_contributor(&self, pr: &WebhookPullRequest) -> Result<()> {
        let association = match &pr.author_association {
            Some(a) => a.clone(),
            None => self.api.get_pull(pr.number).await?.author_association,
        };
        if association != FIRST_TIME_CONTRIBUTOR {
            return Ok(());
        }

        let marker = self.templates.marker(CommentKind::FirstContribution);
        let body = self
            .templates
            .render(CommentKind::FirstContribution, pr.author());
        if ensure_comment(self.api.as_ref(), pr.number, &marker, &body).await? {
            info!(number = pr.number, user = %pr.author(), "Welcomed first-time contributor");
        }
        Ok(())
    }
}
