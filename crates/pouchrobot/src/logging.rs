// SPDX-License-Identifier: Apache-2.0

//! Logging initialization for pouchrobot.
//!
//! Uses `tracing` with `tracing-subscriber`. The `RUST_LOG` environment
//! variable takes precedence over the `-D/--debug` flag.
//!
//! # Examples
//!
//! ```bash
//! # Default: info for the bot, warn for octocrab
//! pouchrobot -c config.json
//!
//! # Trace the GitHub client only
//! RUST_LOG=pouchrobot_core::github=trace pouchrobot -c config.json
//! ```

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Default directives without `-D`.
pub const DEFAULT_FILTER: &str = "pouchrobot=info,pouchrobot_core=info,octocrab=warn";

/// Default directives with `-D`.
pub const DEBUG_FILTER: &str = "pouchrobot=debug,pouchrobot_core=debug,octocrab=info";

/// Picks the default filter directives for the `debug` flag.
#[must_use]
pub fn default_filter(debug: bool) -> &'static str {
    if debug { DEBUG_FILTER } else { DEFAULT_FILTER }
}

/// Initialize the logging subsystem.
///
/// Logs go to stderr without module targets.
pub fn init_logging(debug: bool) {
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(debug)))
        .expect("valid default filter directives");

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filters_parse() {
        assert!(EnvFilter::try_new(default_filter(false)).is_ok());
        assert!(EnvFilter::try_new(default_filter(true)).is_ok());
        assert_eq!(default_filter(false), DEFAULT_FILTER);
    }
}
