// SPDX-License-Identifier: Apache-2.0

//! Daily documentation refresh.
//!
//! [`GitDocRegenerator`] rebuilds the API docs, CLI docs and `CONTRIBUTORS`
//! file on a dated branch of a local clone and pushes it. [`DocGenerator`]
//! then proposes the branch as a pull request, unless nothing changed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{error, info, instrument};

use crate::config::DocGeneratorConfig;
use crate::error::{RobotError, is_nothing_changed};
use crate::git::CommandRunner;
use crate::github::{GitHubApi, NewPullRequest};

/// Path of the swagger2markup CLI jar on the bot host.
pub const SWAGGER2MARKUP_JAR: &str = "/root/swagger2markup-cli-1.3.1.jar";

/// Branch the docs for `date` are generated on.
#[must_use]
pub fn branch_name(date: NaiveDate) -> String {
    format!("auto-doc-{}", date.format("%Y-%m-%d"))
}

/// Regenerates docs in a worktree and pushes them to `branch`.
#[async_trait]
pub trait DocRegenerator: Send + Sync {
    /// Returns false when regeneration left the worktree unchanged.
    async fn regenerate(&self, repo_path: &Path, branch: &str) -> Result<bool>;
}

/// [`DocRegenerator`] driving `git`, `java` and the configured CLI command.
pub struct GitDocRegenerator {
    runner: Arc<dyn CommandRunner>,
    config: DocGeneratorConfig,
    repo: String,
}

impl std::fmt::Debug for GitDocRegenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitDocRegenerator")
            .field("config", &self.config)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

impl GitDocRegenerator {
    /// Creates a regenerator for `repo`.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, config: DocGeneratorConfig, repo: &str) -> Self {
        Self {
            runner,
            config,
            repo: repo.to_string(),
        }
    }

    async fn git(&self, dir: &Path, args: &[&str]) -> Result<String, RobotError> {
        self.runner.run(dir, "git", args).await
    }

    async fn prepare(&self, dir: &Path, branch: &str) -> Result<(), RobotError> {
        self.git(dir, &["checkout", "master"]).await?;
        self.git(dir, &["fetch", "upstream", "master"]).await?;
        self.git(dir, &["rebase", "upstream/master"]).await?;
        self.git(dir, &["push", "-f", "origin", "master"]).await?;
        self.git(dir, &["checkout", "-b", branch]).await?;
        Ok(())
    }

    async fn generate_api_doc(&self, dir: &Path) -> Result<(), RobotError> {
        if self.config.swagger_path.is_empty() {
            return Ok(());
        }
        let input = dir.join(&self.config.swagger_path);
        let output = dir.join(&self.config.api_doc_path);
        let properties = dir.join("docs").join("config.properties");
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        let properties = properties.to_string_lossy();
        self.runner
            .run(
                dir,
                "java",
                &[
                    "-jar",
                    SWAGGER2MARKUP_JAR,
                    "convert",
                    "-i",
                    &input,
                    "-f",
                    &output,
                    "-c",
                    &properties,
                ],
            )
            .await?;
        Ok(())
    }

    async fn generate_cli_doc(&self, dir: &Path) -> Result<(), RobotError> {
        let cmd = self.config.cli_doc_generator_cmd.trim();
        if cmd.is_empty() {
            return Ok(());
        }
        self.runner.run(dir, "sh", &["-c", cmd]).await?;
        Ok(())
    }

    async fn generate_contributors(&self, dir: &Path) -> Result<()> {
        let log = self.git(dir, &["log", "--format=%aN <%aE>"]).await?;
        let body = contributors_file(&log);
        tokio::fs::write(dir.join("CONTRIBUTORS"), body)
            .await
            .context("Failed to write CONTRIBUTORS")?;
        Ok(())
    }

    async fn commit_and_push(&self, dir: &Path, branch: &str) -> Result<(), RobotError> {
        self.git(dir, &["add", "."]).await?;
        let status = self.git(dir, &["status"]).await?;
        if status.contains("nothing to commit") {
            return Err(RobotError::NothingChanged);
        }

        let message = format!("docs: auto generate {} cli/api docs via code", self.repo);
        self.git(dir, &["commit", "-s", "-m", &message]).await?;
        self.git(dir, &["push", "-f", "origin", branch]).await?;
        self.git(dir, &["checkout", "master"]).await?;
        Ok(())
    }
}

/// Deduplicated, sorted `Name <email>` lines.
#[must_use]
pub fn contributors_file(log: &str) -> String {
    let authors: BTreeSet<&str> = log
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let mut out = authors.into_iter().collect::<Vec<_>>().join("\n");
    out.push('\n');
    out
}

#[async_trait]
impl DocRegenerator for GitDocRegenerator {
    #[instrument(skip(self), fields(dir = %repo_path.display()))]
    async fn regenerate(&self, repo_path: &Path, branch: &str) -> Result<bool> {
        self.prepare(repo_path, branch)
            .await
            .with_context(|| format!("Failed to prepare branch {branch}"))?;

        // Each generator is independent; a failure leaves the others' output.
        if let Err(e) = self.generate_api_doc(repo_path).await {
            error!(error = %e, "Failed to generate API doc");
        }
        if let Err(e) = self.generate_cli_doc(repo_path).await {
            error!(error = %e, "Failed to generate CLI doc");
        }
        if let Err(e) = self.generate_contributors(repo_path).await {
            error!(error = %e, "Failed to generate CONTRIBUTORS");
        }

        match self.commit_and_push(repo_path, branch).await {
            Ok(()) => Ok(true),
            Err(e) => {
                let err = anyhow::Error::new(e);
                if is_nothing_changed(&err) {
                    return Ok(false);
                }
                Err(err.context(format!("Failed to push branch {branch}")))
            }
        }
    }
}

/// Opens a doc refresh pull request when regeneration changed anything.
pub struct DocGenerator {
    api: Arc<dyn GitHubApi>,
    regenerator: Arc<dyn DocRegenerator>,
    root_dir: PathBuf,
    cli_doc_generator_cmd: String,
    bot_login: String,
}

impl std::fmt::Debug for DocGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocGenerator")
            .field("repo", &self.api.repo())
            .field("root_dir", &self.root_dir)
            .field("bot_login", &self.bot_login)
            .finish_non_exhaustive()
    }
}

impl DocGenerator {
    /// Creates a generator pushing from `bot_login`'s fork.
    #[must_use]
    pub fn new(
        api: Arc<dyn GitHubApi>,
        regenerator: Arc<dyn DocRegenerator>,
        config: &DocGeneratorConfig,
        bot_login: &str,
    ) -> Self {
        Self {
            api,
            regenerator,
            root_dir: PathBuf::from(&config.root_dir),
            cli_doc_generator_cmd: config.cli_doc_generator_cmd.clone(),
            bot_login: bot_login.to_string(),
        }
    }

    /// Regenerates docs for `date` and opens a pull request if they changed.
    ///
    /// Returns the pull request number, or `None` when nothing changed.
    #[instrument(skip(self), fields(repo = %self.api.repo()))]
    pub async fn run_once(&self, date: NaiveDate) -> Result<Option<u64>> {
        let branch = branch_name(date);
        info!(%branch, "Regenerating docs");

        if !self.regenerator.regenerate(&self.root_dir, &branch).await? {
            info!(%branch, "Docs unchanged, no pull request");
            return Ok(None);
        }

        let pull = self.pull_request(&branch);
        let number = self
            .api
            .create_pull(&pull)
            .await
            .context("Failed to open doc pull request")?;
        info!(number, "Opened doc pull request");
        Ok(Some(number))
    }

    fn pull_request(&self, branch: &str) -> NewPullRequest {
        let repo = self.api.repo();
        NewPullRequest {
            title: format!("docs: auto generate {repo} cli/api/contributors docs via code"),
            head: format!("{}:{branch}", self.bot_login),
            base: "master".to_string(),
            body: format!(
                "Signed-off-by: {bot} <{bot}@users.noreply.github.com>\n\n\
                 **1.Describe what this PR did**\n\
                 This PR is automatically done by AI-based collaborating [robot](https://github.com/pouchcontainer/pouchrobot).\n\
                 {bot} will auto-generate cli/api document via https://github.com/spf13/cobra/tree/master/doc every day.\n\n\
                 **2.Does this pull request fix one issue?**\n\
                 None\n\n\
                 **3.Describe how you did it**\n\
                 We use the following user input CLI document generating command to generate CLI doc: \n\
                 {cmd}\n\n\
                 For API part, we use a tool swagger2markup to make it.\n\n\
                 **4.Describe how to verify it**\n\
                 None\n\n\
                 **5.Special notes for reviews**\n\
                 The cli/api doc must be automatically generated.",
                bot = self.bot_login,
                cmd = self.cli_doc_generator_cmd,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::ScriptedRunner;
    use crate::github::memory::MemoryGitHub;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn config(root: &Path) -> DocGeneratorConfig {
        DocGeneratorConfig {
            root_dir: root.to_string_lossy().into_owned(),
            swagger_path: "apis/swagger.yml".to_string(),
            api_doc_path: "docs/api/HTTP_API.md".to_string(),
            cli_doc_generator_cmd: "make client && ./pouch gen-doc".to_string(),
            ..DocGeneratorConfig::default()
        }
    }

    #[test]
    fn test_branch_name() {
        assert_eq!(branch_name(date()), "auto-doc-2026-10-16");
    }

    #[test]
    fn test_contributors_file_sorted_and_unique() {
        let log = "Zed <z@x.io>\nAmy <a@x.io>\nZed <z@x.io>\n\n";
        assert_eq!(contributors_file(log), "Amy <a@x.io>\nZed <z@x.io>\n");
    }

    #[tokio::test]
    async fn test_regenerate_commits_changes() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .respond("git log --format", "Amy <a@x.io>\n")
                .respond("git status", "Changes to be committed:\n"),
        );
        let regen = GitDocRegenerator::new(runner.clone(), config(dir.path()), "pouch");

        assert!(regen.regenerate(dir.path(), "auto-doc-2026-10-16").await.unwrap());

        let calls = runner.calls();
        assert_eq!(calls[4], "git checkout -b auto-doc-2026-10-16");
        assert!(calls.iter().any(|c| c.starts_with("java -jar /root/swagger2markup")));
        assert!(calls.contains(&"sh -c make client && ./pouch gen-doc".to_string()));
        assert!(calls.contains(&"git commit -s -m docs: auto generate pouch cli/api docs via code".to_string()));
        assert!(calls.contains(&"git push -f origin auto-doc-2026-10-16".to_string()));
        let contributors = std::fs::read_to_string(dir.path().join("CONTRIBUTORS")).unwrap();
        assert_eq!(contributors, "Amy <a@x.io>\n");
    }

    #[tokio::test]
    async fn test_regenerate_nothing_to_commit() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .respond("git status", "On branch auto-doc\nnothing to commit, working tree clean\n"),
        );
        let regen = GitDocRegenerator::new(runner.clone(), config(dir.path()), "pouch");

        assert!(!regen.regenerate(dir.path(), "auto-doc-2026-10-16").await.unwrap());
        assert!(!runner.calls().iter().any(|c| c.starts_with("git commit")));
    }

    #[tokio::test]
    async fn test_failed_generator_does_not_stop_commit() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .fail("java", "Unable to access jarfile")
                .respond("git status", "modified: CONTRIBUTORS\n"),
        );
        let regen = GitDocRegenerator::new(runner.clone(), config(dir.path()), "pouch");
        assert!(regen.regenerate(dir.path(), "b").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_prepare_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().fail("git push -f origin master", "denied"));
        let regen = GitDocRegenerator::new(runner, config(dir.path()), "pouch");
        let err = regen.regenerate(dir.path(), "b").await.unwrap_err();
        assert!(format!("{err:#}").contains("denied"));
    }

    struct Fixed(bool);

    #[async_trait]
    impl DocRegenerator for Fixed {
        async fn regenerate(&self, _: &Path, _: &str) -> Result<bool> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn test_run_once_opens_pull_only_on_change() {
        let gh = Arc::new(MemoryGitHub::new("pouchcontainer", "pouch"));
        let cfg = DocGeneratorConfig::default();

        let unchanged = DocGenerator::new(gh.clone(), Arc::new(Fixed(false)), &cfg, "pouchrobot");
        assert_eq!(unchanged.run_once(date()).await.unwrap(), None);
        assert!(gh.created_pulls().is_empty());

        let changed = DocGenerator::new(gh.clone(), Arc::new(Fixed(true)), &cfg, "pouchrobot");
        assert!(changed.run_once(date()).await.unwrap().is_some());
        let pulls = gh.created_pulls();
        assert_eq!(pulls.len(), 1);
        assert_eq!(pulls[0].head, "pouchrobot:auto-doc-2026-10-16");
        assert_eq!(pulls[0].base, "master");
        assert_eq!(
            pulls[0].title,
            "docs: auto generate pouch cli/api/contributors docs via code"
        );
        assert!(pulls[0].body.contains("**5.Special notes for reviews**"));
    }
}
