// SPDX-License-Identifier: Apache-2.0

//! Command-line interface definition for pouchrobot.

use std::path::PathBuf;

use clap::Parser;

/// GitHub automation bot: webhook triage, periodic pollers and weekly reports.
#[derive(Debug, Parser)]
#[command(name = "pouchrobot", version, about)]
pub struct Cli {
    /// Configuration file (JSON or TOML, by extension).
    #[arg(short = 'c', long = "config", default_value = "config.json")]
    pub config: PathBuf,

    /// Enable debug logging (overridden by `RUST_LOG`).
    #[arg(short = 'D', long = "debug")]
    pub debug: bool,
}
