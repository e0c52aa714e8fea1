// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! # Pouchrobot Core
//!
//! Core library for pouchrobot - rule-based GitHub issue and pull request
//! automation for a single repository.
//!
//! This crate provides:
//! - Webhook decoding and triage rules (labels, length checks, sign-off,
//!   LGTM counting, claims, translation)
//! - Periodic pollers (conflict and gap checks, weekly report, doc
//!   regeneration, closing inactive issues)
//! - CI build notifications from Travis CI and CircleCI
//! - A [`GitHubApi`] seam with an octocrab client, plus an in-memory fake
//!   behind the `test-util` feature
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use pouchrobot_core::{GitHubClient, Processor, create_client, load_config};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = load_config(Path::new("config.json"))?;
//! let octocrab = create_client(config.access_token.as_ref())?;
//! let api = Arc::new(GitHubClient::new(octocrab, &config.owner, &config.repo));
//!
//! let processor = Processor::new(api, config.triage.clone(), config.labels.clone(), None);
//! processor.dispatch("ping", b"{}").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`processor`] - Webhook event dispatch and triage rules
//! - [`fetcher`] - Conflict and gap checks for open pull requests
//! - [`reporter`] - Weekly activity report
//! - [`docgen`] - Daily doc regeneration pull request
//! - [`scheduler`] - Closing inactive issues
//! - [`ci`] - CI build notifications
//! - [`tasks`] - Background task scheduling
//! - [`github`] - GitHub API seam, client and fake
//! - [`config`] - Configuration loading

// ============================================================================
// Error Handling
// ============================================================================

pub use error::{RobotError, is_nothing_changed};

/// Convenience Result type for pouchrobot operations.
///
/// This is equivalent to `std::result::Result<T, RobotError>`.
pub type Result<T> = std::result::Result<T, RobotError>;

// ============================================================================
// Configuration
// ============================================================================

pub use config::{
    AppConfig, BaiduConfig, DocGeneratorConfig, FetcherConfig, LgtmPolicy, SchedulerConfig,
    TranslatorConfig, TriageConfig, WeeklyReportConfig, load_config,
};

// ============================================================================
// GitHub Integration
// ============================================================================

pub use github::auth::{TokenSource, create_client, resolve_token};
pub use github::client::GitHubClient;
#[cfg(any(test, feature = "test-util"))]
pub use github::memory::MemoryGitHub;
pub use github::{Comment, Commit, GitHubApi, Issue, PullRequest};

// ============================================================================
// Triage
// ============================================================================

pub use labels::{LabelRules, SizeThresholds};
pub use processor::{Event, Processor, parse_event};
pub use templates::{CommentKind, Templates};
pub use translator::{BaiduTranslator, Translator};

// ============================================================================
// Pollers
// ============================================================================

pub use docgen::{DocGenerator, DocRegenerator, GitDocRegenerator};
pub use fetcher::Fetcher;
pub use reporter::{Reporter, StatsLastWeek, WeekReport};
pub use scheduler::IssueScheduler;
pub use tasks::{PeriodicTask, Schedule, TaskRunner};

// ============================================================================
// CI Notifications
// ============================================================================

pub use ci::{CiBuild, CiNotifier, parse_circleci, parse_travis};

// ============================================================================
// Subprocesses
// ============================================================================

pub use git::{CommandRunner, SystemRunner};
#[cfg(any(test, feature = "test-util"))]
pub use git::ScriptedRunner;

// ============================================================================
// Retry Logic
// ============================================================================

pub use retry::{is_retryable_anyhow, is_retryable_http, retry_backoff};

// ============================================================================
// Modules
// ============================================================================

pub mod ci;
pub mod config;
pub mod docgen;
pub mod error;
pub mod fetcher;
pub mod git;
pub mod github;
pub mod labels;
pub mod processor;
pub mod reporter;
pub mod retry;
pub mod scheduler;
pub mod tasks;
pub mod templates;
pub mod translator;
