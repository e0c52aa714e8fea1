// SPDX-License-Identifier: Apache-2.0

//! Periodic pull request checks.
//!
//! Each pass walks every open pull request twice: once for merge conflicts
//! reported by GitHub, once for the number of commits the branch is behind
//! master in a local clone.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, instrument};

use crate::config::FetcherConfig;
use crate::git::CommandRunner;
use crate::github::GitHubApi;
use crate::templates::Templates;

mod conflict;
mod gap;

pub use gap::compare_and_get_gap;

/// Conflict and gap checker for open pull requests.
pub struct Fetcher {
    api: Arc<dyn GitHubApi>,
    runner: Arc<dyn CommandRunner>,
    templates: Templates,
    config: FetcherConfig,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("owner", &self.api.owner())
            .field("repo", &self.api.repo())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    /// Creates a fetcher for the repository `api` is bound to.
    #[must_use]
    pub fn new(
        api: Arc<dyn GitHubApi>,
        runner: Arc<dyn CommandRunner>,
        config: FetcherConfig,
    ) -> Self {
        let templates = Templates::new(api.owner(), api.repo());
        Self {
            api,
            runner,
            templates,
            config,
        }
    }

    fn repo_path(&self) -> PathBuf {
        PathBuf::from(&self.config.repo_path)
    }

    /// Runs the conflict check, then the gap check.
    ///
    /// A failed conflict check is logged and does not skip the gap check.
    #[instrument(skip(self), fields(owner = %self.api.owner(), repo = %self.api.repo()))]
    pub async fn run_once(&self) -> Result<()> {
        if let Err(e) = self.check_conflicts().await {
            error!(error = %e, "Conflict check failed");
        }
        if self.config.check_gap {
            self.check_gaps().await?;
        }
        info!("Fetcher pass finished");
        Ok(())
    }
}
