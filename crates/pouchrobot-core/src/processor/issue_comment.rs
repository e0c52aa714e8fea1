// SPDX-License-Identifier: Apache-2.0

//! Issue comments: claiming an issue with `#dibs` or `/assign`.

use anyhow::Result;
use tracing::{debug, info};

use super::Processor;
use super::events::IssueCommentEvent;

const CLAIM_TOKENS: &[&str] = &["#dibs", "/assign"];

/// Returns true if the comment claims the issue for its author.
#[must_use]
pub fn is_claim(body: &str) -> bool {
    let lowered = body.trim_start().to_lowercase();
    CLAIM_TOKENS.iter().any(|t| lowered.starts_with(t))
}

impl Processor {
    pub(super) async fn process_issue_comment(&self, event: IssueCommentEvent) -> Result<()> {
        if !matches!(event.action.as_str(), "created" | "edited") {
            debug!(action = %event.action, "Ignoring issue comment action");
            return Ok(());
        }

        let Some(body) = event.comment.body.as_deref() else {
            return Ok(());
        };
        let user = event.comment.author();
        if user.is_empty() || !is_claim(body) {
            return Ok(());
        }

        self.api.add_assignee(event.issue.number, user).await?;
        info!(number = event.issue.number, user, "Assigned issue to claimer");
        Ok(())
    }
}
