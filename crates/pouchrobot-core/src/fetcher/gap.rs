// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use super::Fetcher;
use crate::github::PullRequest;
use crate::github::comments::{drop_label, ensure_label, refresh_comment, remove_comments_containing};
use crate::labels::{GAP_LABEL, LGTM_LABEL};
use crate::templates::CommentKind;

/// Number of master commits missing from a pull request branch.
///
/// Both arguments are `git log --oneline` outputs, newest first. The first
/// line of the branch log that also appears in the master log is the merge
/// base; everything in master above it is the gap.
#[must_use]
pub fn compare_and_get_gap(master_log: &str, pr_log: &str) -> usize {
    let master: Vec<&str> = master_log.lines().filter(|l| !l.is_empty()).collect();
    let pr: Vec<&str> = pr_log.lines().filter(|l| !l.is_empty()).collect();
    let known: HashSet<&str> = master.iter().copied().collect();

    let shared = pr
        .iter()
        .position(|line| known.contains(line))
        .map_or(0, |k| pr.len() - k);
    master.len().saturating_sub(shared)
}

impl Fetcher {
    /// Measures how far each open pull request is behind master.
    ///
    /// Pull requests are checked one at a time because they share one
    /// worktree. Master is checked out again afterwards.
    pub async fn check_gaps(&self) -> Result<()> {
        let dir = self.repo_path();
        let master_log = self
            .prepare_master(&dir)
            .await
            .context("Failed to prepare master for gap check")?;

        let pulls = self
            .api
            .list_open_pulls()
            .await
            .context("Failed to list open pull requests")?;
        info!(count = pulls.len(), "Checking pull requests for gaps");

        for pull in &pulls {
            if let Err(e) = self.check_pull_gap(&dir, &master_log, pull).await {
                warn!(number = pull.number, error = %e, "Failed to check gap");
            }
        }

        self.git(&dir, &["checkout", "master"]).await?;
        Ok(())
    }

    async fn git(&self, dir: &Path, args: &[&str]) -> Result<String> {
        Ok(self.runner.run(dir, "git", args).await?)
    }

    async fn prepare_master(&self, dir: &Path) -> Result<String> {
        self.git(dir, &["checkout", "master"]).await?;
        self.git(dir, &["fetch", "upstream", "master"]).await?;
        self.git(dir, &["rebase", "upstream/master"]).await?;
        self.git(dir, &["log", "--oneline"]).await
    }

    async fn pull_branch_log(&self, dir: &Path, number: u64) -> Result<String> {
        let branch = format!("new-{number}");
        if let Err(e) = self.git(dir, &["branch", "-D", &branch]).await {
            debug!(%branch, error = %e, "No stale branch to delete");
        }
        let refspec = format!("pull/{number}/head:{branch}");
        self.git(dir, &["pull", "upstream", &refspec]).await?;
        self.git(dir, &["checkout", &branch]).await?;
        self.git(dir, &["log", "--oneline"]).await
    }

    #[instrument(skip(self, dir, master_log, pull), fields(number = pull.number))]
    async fn check_pull_gap(&self, dir: &Path, master_log: &str, pull: &PullRequest) -> Result<()> {
        let pr_log = self.pull_branch_log(dir, pull.number).await?;
        let gap = compare_and_get_gap(master_log, &pr_log);
        debug!(gap, "Computed gap");

        let api = self.api.as_ref();
        let number = pull.number;
        let marker = self.templates.marker(CommentKind::Gap);

        if gap < self.config.commits_gap {
            if drop_label(api, number, &pull.labels, GAP_LABEL).await? {
                info!(gap, "Gap closed, removed label");
                remove_comments_containing(api, number, &marker).await?;
            }
            return Ok(());
        }

        info!(gap, "Pull request is behind master");
        drop_label(api, number, &pull.labels, LGTM_LABEL).await?;
        ensure_label(api, number, &pull.labels, GAP_LABEL).await?;
        if pull.user.is_empty() {
            return Ok(());
        }
        let body = self.templates.gap(&pull.user, gap);
        refresh_comment(api, number, &marker, &body).await
    }
}
