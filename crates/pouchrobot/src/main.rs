// SPDX-License-Identifier: Apache-2.0

//! pouchrobot - GitHub automation bot for a single repository.
//!
//! Serves webhooks and CI notifications and runs the periodic pollers until
//! Ctrl+C.

use anyhow::{Context, Result};
use clap::Parser;
use pouchrobot::cli::Cli;
use pouchrobot::logging;
use pouchrobot_core::load_config;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.debug);

    let config = load_config(&cli.config).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            cli.config.display()
        )
    })?;
    debug!(path = %cli.config.display(), "Configuration loaded");

    pouchrobot::run(config).await
}
