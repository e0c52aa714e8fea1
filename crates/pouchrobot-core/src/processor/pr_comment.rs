// SPDX-License-Identifier: Apache-2.0

//! Pull request comments: maintainer LGTM votes and `/retest`.

use anyhow::Result;
use tracing::{debug, info, instrument};

use super::Processor;
use super::events::IssueCommentEvent;
use crate::config::LgtmPolicy;
use crate::github::comments::ensure_label;
use crate::labels::{APPROVED_LABEL, LGTM_LABEL};

/// Returns true if the comment starts or ends with `lgtm`, ignoring case.
#[must_use]
pub fn is_lgtm(body: &str) -> bool {
    let lowered = body.trim().to_lowercase();
    lowered.starts_with("lgtm") || lowered.ends_with("lgtm")
}

impl Processor {
    pub(super) async fn process_pr_comment(&self, event: IssueCommentEvent) -> Result<()> {
        if !matches!(event.action.as_str(), "created" | "edited") {
            debug!(action = %event.action, "Ignoring pull request comment action");
            return Ok(());
        }
        let Some(body) = event.comment.body.as_deref() else {
            return Ok(());
        };

        if body.contains("/retest") {
            debug!(number = event.issue.number, "Retest requested, nothing to trigger");
        }
        if !is_lgtm(body) {
            return Ok(());
        }
        if event.action == "edited" && event.previous_body().is_some_and(is_lgtm) {
            debug!(number = event.issue.number, "LGTM comment edited, already counted");
            return Ok(());
        }
        self.count_lgtm(&event).await
    }

    /// First maintainer LGTM adds `LGTM`. `APPROVED` needs an earlier
    /// maintainer LGTM comment, from another maintainer under
    /// [`LgtmPolicy::DistinctMaintainer`].
    #[instrument(skip(self, event), fields(number = event.issue.number))]
    async fn count_lgtm(&self, event: &IssueCommentEvent) -> Result<()> {
        let api = self.api.as_ref();
        let number = event.issue.number;
        let user = event.comment.author();

        if !self.triage.is_maintainer(user) {
            debug!(user, "LGTM from non-maintainer ignored");
            return Ok(());
        }

        let labels = api.get_issue(number).await?.labels;
        if !labels.iter().any(|l| l == LGTM_LABEL) {
            api.add_labels(number, &[LGTM_LABEL.to_string()]).await?;
            info!(user, "Added LGTM label");
            return Ok(());
        }

        let comments = api.list_comments(number).await?;
        let mut earlier = comments
            .iter()
            .filter(|c| c.id != event.comment.id)
            .filter(|c| is_lgtm(&c.body) && self.triage.is_maintainer(&c.user));
        let approve = match self.triage.lgtm_policy {
            LgtmPolicy::AnyMaintainer => earlier.next().is_some(),
            LgtmPolicy::DistinctMaintainer => earlier.any(|c| !c.user.eq_ignore_ascii_case(user)),
        };
        if !approve {
            debug!(user, "No earlier maintainer LGTM to pair with");
            return Ok(());
        }

        if ensure_label(api, number, &labels, APPROVED_LABEL).await? {
            info!(user, "Added APPROVED label");
        }
        Ok(())
    }
}
