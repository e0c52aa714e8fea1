// SPDX-License-Identifier: Apache-2.0

//! Webhook event dispatcher and triage rules.
//!
//! [`Processor::dispatch`] decodes an event by its `X-Github-Event` type and
//! hands it to one of four sub-processors:
//!
//! - `issue` - issue opened/edited/labeled
//! - `pull_request` - pull request opened/edited/synchronize
//! - `issue_comment` - `#dibs` and `/assign` claims on issues
//! - `pr_comment` - maintainer LGTM votes and `/retest` on pull requests
//!
//! Every rule reads the current remote state first and only mutates what
//! differs, so concurrent deliveries and retries converge.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::config::TriageConfig;
use crate::github::GitHubApi;
use crate::labels::LabelRules;
use crate::templates::Templates;
use crate::translator::Translator;

pub mod events;
mod issue;
mod issue_comment;
mod pr_comment;
mod pull_request;

pub use events::{Event, parse_event};
pub use issue_comment::is_claim;
pub use pr_comment::is_lgtm;
pub use pull_request::all_signed_off;

/// Applies triage rules to webhook events.
pub struct Processor {
    api: Arc<dyn GitHubApi>,
    templates: Templates,
    triage: TriageConfig,
    rules: LabelRules,
    translator: Option<Arc<dyn Translator>>,
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("owner", &self.api.owner())
            .field("repo", &self.api.repo())
            .field("translator", &self.translator.is_some())
            .finish_non_exhaustive()
    }
}

impl Processor {
    /// Creates a processor acting on the repository `api` is bound to.
    #[must_use]
    pub fn new(
        api: Arc<dyn GitHubApi>,
        triage: TriageConfig,
        rules: LabelRules,
        translator: Option<Arc<dyn Translator>>,
    ) -> Self {
        let templates = Templates::new(api.owner(), api.repo());
        Self {
            api,
            templates,
            triage,
            rules,
            translator,
        }
    }

    /// Decodes and processes one webhook delivery.
    ///
    /// # Errors
    ///
    /// Returns an error wrapping `RobotError::UnknownEvent`,
    /// `RobotError::UnknownAction` or `RobotError::InvalidPayload` for
    /// deliveries the bot cannot handle, or the GitHub error that aborted
    /// the triage pass.
    #[instrument(skip(self, body), fields(owner = %self.api.owner(), repo = %self.api.repo()))]
    pub async fn dispatch(&self, event_type: &str, body: &[u8]) -> Result<()> {
        let event = parse_event(event_type, body)?;
        info!(event_type, "Received webhook event");

        match event {
            Event::Ping => {
                debug!("Got ping from GitHub");
                Ok(())
            }
            Event::Issues(e) => self.process_issue(e).await,
            Event::PullRequest(e) => self.process_pull_request(e).await,
            Event::IssueComment(e) => self.process_issue_comment(e).await,
            Event::PullRequestComment(e) => self.process_pr_comment(e).await,
        }
    }
}

/// Length in characters, so multi-byte titles are not over-counted.
fn text_len(text: Option<&str>) -> usize {
    text.map_or(0, |t| t.chars().count())
}
