// SPDX-License-Identifier: Apache-2.0

//! Retry logic with exponential backoff for transient failures.
//!
//! Only idempotent GitHub reads and translation lookups are retried; label,
//! comment and issue mutations are sent once.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Determines if an HTTP status code is retryable.
///
/// Retryable status codes are 429, 500, 502, 503 and 504.
#[must_use]
pub fn is_retryable_http(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Determines if an octocrab error is retryable.
///
/// GitHub answers secondary rate limits with 403, so that status is retried
/// for octocrab errors in addition to the generic HTTP set.
#[must_use]
pub fn is_retryable_octocrab(e: &octocrab::Error) -> bool {
    match e {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            status == 403 || is_retryable_http(status)
        }
        octocrab::Error::Service { .. } | octocrab::Error::Hyper { .. } => true,
        _ => false,
    }
}

/// Determines if an anyhow error is retryable.
///
/// Looks for an octocrab or reqwest error in the chain.
#[must_use]
pub fn is_retryable_anyhow(e: &anyhow::Error) -> bool {
    for cause in e.chain() {
        if let Some(oct_err) = cause.downcast_ref::<octocrab::Error>() {
            return is_retryable_octocrab(oct_err);
        }
        if let Some(req_err) = cause.downcast_ref::<reqwest::Error>() {
            if req_err.is_timeout() || req_err.is_connect() {
                return true;
            }
            return req_err
                .status()
                .is_some_and(|s| is_retryable_http(s.as_u16()));
        }
    }
    false
}

/// Creates a configured exponential backoff builder for retries.
///
/// Factor 2, 1 second minimum delay, 3 retries, jitter enabled.
#[must_use]
pub fn retry_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_factor(2.0)
        .with_min_delay(Duration::from_secs(1))
        .with_max_times(3)
        .with_jitter()
}
