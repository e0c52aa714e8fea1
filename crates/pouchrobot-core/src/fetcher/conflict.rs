// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use super::Fetcher;
use crate::github::PullRequest;
use crate::github::comments::{drop_label, ensure_label, refresh_comment, remove_comments_containing};
use crate::labels::{CONFLICT_LABEL, LGTM_LABEL};
use crate::templates::CommentKind;

impl Fetcher {
    /// Re-fetches every open pull request and syncs its conflict state.
    pub async fn check_conflicts(&self) -> Result<()> {
        let pulls = self
            .api
            .list_open_pulls()
            .await
            .context("Failed to list open pull requests")?;
        info!(count = pulls.len(), "Checking pull requests for conflicts");

        for listed in pulls {
            let number = listed.number;
            let result = match self.api.get_pull(number).await {
                Ok(pull) => self.sync_conflict(&pull).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(number, error = %e, "Failed to check conflict");
            }
        }
        Ok(())
    }

    /// Applies the conflict label and comment to match `pull.mergeable`.
    #[instrument(skip(self, pull), fields(number = pull.number))]
    pub(super) async fn sync_conflict(&self, pull: &PullRequest) -> Result<()> {
        let api = self.api.as_ref();
        let number = pull.number;
        let marker = self.templates.marker(CommentKind::Conflict);

        if pull.mergeable != Some(false) {
            if drop_label(api, number, &pull.labels, CONFLICT_LABEL).await? {
                info!("Conflict resolved, removed label");
            }
            remove_comments_containing(api, number, &marker).await?;
            return Ok(());
        }

        if drop_label(api, number, &pull.labels, LGTM_LABEL).await? {
            info!("Removed LGTM from conflicting pull request");
        }
        if ensure_label(api, number, &pull.labels, CONFLICT_LABEL).await? {
            info!("Marked pull request as conflicting");
        }
        if pull.user.is_empty() {
            debug!("Pull request has no author, skipping conflict comment");
            return Ok(());
        }
        let body = self.templates.render(CommentKind::Conflict, &pull.user);
        refresh_comment(api, number, &marker, &body).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::FetcherConfig;
    use crate::git::ScriptedRunner;
    use crate::github::memory::MemoryGitHub;

    fn fetcher(gh: &Arc<MemoryGitHub>) -> Fetcher {
        Fetcher::new(
            gh.clone(),
            Arc::new(ScriptedRunner::new()),
            FetcherConfig {
                check_gap: false,
                ..FetcherConfig::default()
            },
        )
    }

    fn seeded(mergeable: Option<bool>, labels: &[&str]) -> Arc<MemoryGitHub> {
        let gh = Arc::new(MemoryGitHub::new("pouchcontainer", "pouch"));
        gh.insert_pull(
            PullRequest::builder()
                .number(5)
                .user("bob")
                .maybe_mergeable(mergeable)
                .labels(labels.iter().map(ToString::to_string).collect())
                .build(),
        );
        gh
    }

    #[tokio::test]
    async fn test_conflict_labels_and_comments_once() {
        let gh = seeded(Some(false), &["LGTM"]);
        let f = fetcher(&gh);

        f.run_once().await.unwrap();
        f.run_once().await.unwrap();

        assert_eq!(gh.labels(5), vec![CONFLICT_LABEL.to_string()]);
        let comments = gh.comments(5);
        assert_eq!(comments.len(), 1);
        assert!(comments[0].starts_with("ping @bob"));
    }

    #[tokio::test]
    async fn test_conflict_comment_moves_to_bottom() {
        let gh = seeded(Some(false), &[]);
        let f = fetcher(&gh);
        f.run_once().await.unwrap();
        gh.push_comment(5, "bob", "rebased, sorry");

        f.run_once().await.unwrap();
        let comments = gh.comments(5);
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0], "rebased, sorry");
        assert!(comments[1].contains("Conflict happens"));
    }

    #[tokio::test]
    async fn test_resolved_conflict_cleans_up() {
        let gh = seeded(Some(false), &[]);
        let f = fetcher(&gh);
        f.run_once().await.unwrap();

        gh.set_mergeable(5, Some(true));
        f.run_once().await.unwrap();
        assert!(gh.labels(5).is_empty());
        assert!(gh.comments(5).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_mergeability_counts_as_clean() {
        let gh = seeded(None, &[CONFLICT_LABEL]);
        let f = fetcher(&gh);
        f.run_once().await.unwrap();
        assert!(gh.labels(5).is_empty());
    }
}
