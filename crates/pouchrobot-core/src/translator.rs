// SPDX-License-Identifier: Apache-2.0

//! Translation of non-English issue bodies.
//!
//! [`Translator`] is the seam used by issue triage. [`BaiduTranslator`] talks to
//! the Baidu general translation API one line at a time.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use backon::Retryable;
use md5::{Digest, Md5};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::BaiduConfig;
use crate::error::RobotError;
use crate::retry::{is_retryable_anyhow, retry_backoff};

const BAIDU_API_URL: &str = "http://api.fanyi.baidu.com/api/trans/vip/translate";
const TARGET_LANGUAGE: &str = "en";

/// Translates free text into English.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Returns the text with translations interleaved, or `None` when the
    /// text is already English and nothing needs to change.
    async fn translate(&self, text: &str) -> Result<Option<String>>;
}

/// Translation of a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineTranslation {
    /// Source language already matches the target.
    Unchanged,
    /// Translated text.
    Translated(String),
}

/// Interleaves each line with its translation.
///
/// `lines` pairs every source line with its translation; blank lines and
/// failed lookups carry `None`. Returns `None` when no line was translated.
#[must_use]
pub fn interleave(lines: &[(&str, Option<LineTranslation>)]) -> Option<String> {
    let mut out = String::new();
    let mut translated_any = false;

    for (line, translation) in lines {
        if line.is_empty() {
            out.push_str("\r\n");
            continue;
        }
        out.push_str(line);
        if let Some(LineTranslation::Translated(dst)) = translation {
            out.push_str("\r\n// ");
            out.push_str(dst.trim_end());
            translated_any = true;
        }
        out.push_str("\r\n");
    }

    translated_any.then(|| out.trim().to_string())
}

/// Splits text on `\r\n` or `\n`.
fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect()
}

/// Request signature: lower-hex MD5 of `appid + q + salt + key`.
#[must_use]
pub fn sign(app_id: &str, query: &str, salt: &str, key: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(app_id.as_bytes());
    hasher.update(query.as_bytes());
    hasher.update(salt.as_bytes());
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorCode {
    Number(i64),
    Text(String),
}

impl ErrorCode {
    fn is_success(&self) -> bool {
        match self {
            ErrorCode::Number(n) => *n == 0 || *n == 52000,
            ErrorCode::Text(s) => s == "0" || s == "52000",
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransUnit {
    dst: String,
}

#[derive(Debug, Deserialize)]
struct BaiduResponse {
    error_code: Option<ErrorCode>,
    error_msg: Option<String>,
    #[serde(default)]
    from: String,
    trans_result: Option<Vec<TransUnit>>,
}

impl BaiduResponse {
    fn into_translation(self) -> Result<LineTranslation, RobotError> {
        if let Some(code) = &self.error_code
            && !code.is_success()
        {
            return Err(RobotError::Translator {
                message: self
                    .error_msg
                    .unwrap_or_else(|| "unknown translation error".to_string()),
            });
        }
        let Some(units) = self.trans_result else {
            return Err(RobotError::Translator {
                message: "response carried no translation".to_string(),
            });
        };
        if self.from == TARGET_LANGUAGE {
            return Ok(LineTranslation::Unchanged);
        }
        let joined = units
            .into_iter()
            .map(|u| u.dst)
            .collect::<Vec<_>>()
            .join(" ");
        Ok(LineTranslation::Translated(joined))
    }
}

/// Baidu general translation API client.
#[derive(Debug, Clone)]
pub struct BaiduTranslator {
    http: Client,
    app_id: String,
    key: SecretString,
}

impl BaiduTranslator {
    /// Builds a translator from configuration.
    ///
    /// Returns `Ok(None)` when the app id or key is missing, which disables
    /// translation.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &BaiduConfig) -> Result<Option<Self>> {
        let Some(key) = config.key.clone() else {
            return Ok(None);
        };
        if config.app_id.trim().is_empty() {
            return Ok(None);
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Some(Self {
            http,
            app_id: config.app_id.clone(),
            key,
        }))
    }

    #[instrument(skip(self, line))]
    async fn translate_line(&self, line: &str) -> Result<LineTranslation> {
        let salt = fastrand::u32(..100_000).to_string();
        let signature = sign(&self.app_id, line, &salt, self.key.expose_secret());

        let response: BaiduResponse = (|| async {
            let resp = self
                .http
                .get(BAIDU_API_URL)
                .query(&[
                    ("q", line),
                    ("from", "auto"),
                    ("to", TARGET_LANGUAGE),
                    ("appid", self.app_id.as_str()),
                    ("salt", salt.as_str()),
                    ("sign", signature.as_str()),
                ])
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, anyhow::Error>(resp.json::<BaiduResponse>().await?)
        })
        .retry(retry_backoff())
        .when(is_retryable_anyhow)
        .notify(|err, dur| {
            warn!(error = %err, retry_after = ?dur, "Retrying translation request");
        })
        .await
        .context("Failed to call translation API")?;

        Ok(response.into_translation()?)
    }
}

#[async_trait]
impl Translator for BaiduTranslator {
    async fn translate(&self, text: &str) -> Result<Option<String>> {
        let lines = split_lines(text);
        let mut pairs = Vec::with_capacity(lines.len());

        for line in lines {
            if line.is_empty() {
                pairs.push((line, None));
                continue;
            }
            match self.translate_line(line).await {
                Ok(t) => pairs.push((line, Some(t))),
                Err(e) => {
                    warn!(error = %e, "Failed to translate line");
                    pairs.push((line, None));
                }
            }
        }

        let result = interleave(&pairs);
        debug!(translated = result.is_some(), "Translation finished");
        Ok(result)
    }
}
