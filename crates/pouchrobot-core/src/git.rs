// SPDX-License-Identifier: Apache-2.0

//! Subprocess execution for `git` and the doc tooling.
//!
//! Pollers never spawn processes directly; they go through [`CommandRunner`]
//! so the gap check and the doc generator can be exercised with
//! `ScriptedRunner` (feature `test-util`) instead of a real worktree.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::RobotError;

/// Runs a program to completion and returns its combined output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program args..` inside `dir`.
    ///
    /// Returns stdout followed by stderr on success, or
    /// [`RobotError::Command`] carrying the same text on a non-zero exit.
    async fn run(&self, dir: &Path, program: &str, args: &[&str]) -> Result<String, RobotError>;
}

/// Joins a program and its arguments for logs and errors.
#[must_use]
pub fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    #[instrument(skip(self, args), fields(dir = %dir.display()))]
    async fn run(&self, dir: &Path, program: &str, args: &[&str]) -> Result<String, RobotError> {
        let command = command_line(program, args);
        debug!(%command, "Running command");

        let output = Command::new(program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RobotError::Command {
                command: command.clone(),
                output: e.to_string(),
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(combined)
        } else {
            Err(RobotError::Command {
                command,
                output: combined,
            })
        }
    }
}

/// [`CommandRunner`] that answers from a script and records every call.
///
/// A response applies to any command line starting with its prefix. When
/// several responses share a prefix they are consumed in order, the last one
/// sticking. Unmatched commands succeed with empty output.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: std::sync::Mutex<Vec<(String, Result<String, String>)>>,
    calls: std::sync::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-util"))]
impl ScriptedRunner {
    /// Creates a runner with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers commands starting with `prefix` with `output`.
    #[must_use]
    pub fn respond(self, prefix: &str, output: &str) -> Self {
        self.push(prefix, Ok(output.to_string()))
    }

    /// Fails commands starting with `prefix`, reporting `output`.
    #[must_use]
    pub fn fail(self, prefix: &str, output: &str) -> Self {
        self.push(prefix, Err(output.to_string()))
    }

    fn push(self, prefix: &str, response: Result<String, String>) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((prefix.to_string(), response));
        self
    }

    /// Every command line run so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, _dir: &Path, program: &str, args: &[&str]) -> Result<String, RobotError> {
        let command = command_line(program, args);
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(command.clone());

        let mut responses = self
            .responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let matching: Vec<usize> = responses
            .iter()
            .enumerate()
            .filter(|(_, (prefix, _))| command.starts_with(prefix.as_str()))
            .map(|(i, _)| i)
            .collect();

        let response = match matching.as_slice() {
            [] => Ok(String::new()),
            [only] => responses[*only].1.clone(),
            [first, ..] => responses.remove(*first).1,
        };
        response.map_err(|output| RobotError::Command { command, output })
    }
}
