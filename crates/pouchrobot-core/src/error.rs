// SPDX-License-Identifier: Apache-2.0

//! Error types for pouchrobot.
//!
//! Uses `thiserror` for deriving `std::error::Error` implementations.
//! Orchestration code uses `anyhow::Result` and downcasts to [`RobotError`]
//! where a caller needs to branch on a specific failure.

use thiserror::Error;

/// Errors that can occur during pouchrobot operations.
#[derive(Error, Debug)]
pub enum RobotError {
    /// GitHub API error from octocrab.
    #[error("GitHub API error: {message}")]
    GitHub {
        /// Error message.
        message: String,
    },

    /// Configuration file error.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// Webhook carried an `X-Github-Event` value the bot does not handle.
    #[error("unknown event type {0}")]
    UnknownEvent(String),

    /// Webhook carried an action the bot does not handle for its event.
    #[error("unknown action type {0}")]
    UnknownAction(String),

    /// Webhook or CI payload could not be decoded.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    /// CI payload referenced a pull request number that cannot exist.
    #[error("invalid pull request number {0}")]
    InvalidPullNumber(i64),

    /// External command exited unsuccessfully.
    #[error("failed to run `{command}`: {output}")]
    Command {
        /// Command line that was executed.
        command: String,
        /// Combined stdout and stderr of the command.
        output: String,
    },

    /// Doc regeneration produced no changes, so there is nothing to propose.
    #[error("nothing changed")]
    NothingChanged,

    /// Translation API error.
    #[error("translator error: {message}")]
    Translator {
        /// Error message.
        message: String,
    },

    /// Network/HTTP error from reqwest.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl From<octocrab::Error> for RobotError {
    fn from(err: octocrab::Error) -> Self {
        RobotError::GitHub {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for RobotError {
    fn from(err: config::ConfigError) -> Self {
        RobotError::Config {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for RobotError {
    fn from(err: serde_json::Error) -> Self {
        RobotError::InvalidPayload(err)
    }
}

/// Returns true if the error chain ends in the [`RobotError::NothingChanged`] sentinel.
#[must_use]
pub fn is_nothing_changed(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<RobotError>(),
        Some(RobotError::NothingChanged)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_event_message() {
        let err = RobotError::UnknownEvent("deployment".to_string());
        assert_eq!(err.to_string(), "unknown event type deployment");
    }

    #[test]
    fn test_unknown_action_message() {
        let err = RobotError::UnknownAction("transferred".to_string());
        assert_eq!(err.to_string(), "unknown action type transferred");
    }

    #[test]
    fn test_command_error_carries_output() {
        let err = RobotError::Command {
            command: "git rebase upstream/master".to_string(),
            output: "CONFLICT (content)".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("git rebase upstream/master"));
        assert!(msg.contains("CONFLICT (content)"));
    }

    #[test]
    fn test_is_nothing_changed() {
        let err = anyhow::Error::new(RobotError::NothingChanged);
        assert!(is_nothing_changed(&err));

        let other = anyhow::anyhow!("boom");
        assert!(!is_nothing_changed(&other));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: RobotError = config::ConfigError::Message("bad key".to_string()).into();
        assert!(matches!(err, RobotError::Config { .. }));
        assert!(err.to_string().contains("bad key"));
    }
}
