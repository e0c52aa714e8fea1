// SPDX-License-Identifier: Apache-2.0

//! GitHub token resolution and client construction.
//!
//! The token is taken from the first source that provides one:
//! 1. `access_token` in the configuration file
//! 2. Environment variable (`GH_TOKEN` or `GITHUB_TOKEN`)

use std::fmt;

use anyhow::{Context, Result};
use octocrab::Octocrab;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument};

/// Source of the GitHub authentication token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Token from the configuration file.
    Config,
    /// Token from `GH_TOKEN` or `GITHUB_TOKEN` environment variable.
    Environment,
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Config => write!(f, "configuration file"),
            TokenSource::Environment => write!(f, "environment variable"),
        }
    }
}

fn token_from_env() -> Option<SecretString> {
    ["GH_TOKEN", "GITHUB_TOKEN"].into_iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                debug!(var = name, "Using token from environment");
                SecretString::from(v)
            })
    })
}

/// Picks a token from the configured value or the environment.
///
/// An empty configured token counts as absent.
#[must_use]
pub fn resolve_token(configured: Option<&SecretString>) -> Option<(SecretString, TokenSource)> {
    if let Some(token) = configured
        && !token.expose_secret().trim().is_empty()
    {
        return Some((token.clone(), TokenSource::Config));
    }
    token_from_env().map(|t| (t, TokenSource::Environment))
}

/// Creates an authenticated Octocrab client using a provided token.
///
/// # Errors
///
/// Returns an error if the Octocrab client cannot be built.
#[instrument(skip(token))]
pub fn create_client_with_token(token: &SecretString) -> Result<Octocrab> {
    info!("Creating GitHub client with provided token");

    let client = Octocrab::builder()
        .personal_token(token.expose_secret().to_string())
        .build()
        .context("Failed to build GitHub client")?;

    debug!("Created authenticated GitHub client");
    Ok(client)
}

/// Creates a client from the configured token, falling back to the environment.
///
/// # Errors
///
/// Returns an error if no token is available or the client cannot be built.
#[instrument(skip(configured))]
pub fn create_client(configured: Option<&SecretString>) -> Result<Octocrab> {
    let (token, source) = resolve_token(configured)
        .context("No GitHub token - set access_token in the config file or GITHUB_TOKEN")?;
    info!(source = %source, "Resolved GitHub token");
    create_client_with_token(&token)
}
