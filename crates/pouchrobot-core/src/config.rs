// SPDX-License-Identifier: Apache-2.0

//! Configuration management for pouchrobot.
//!
//! Provides layered configuration from a file and environment variables.
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment variables (prefix: `POUCHROBOT_`)
//! 2. Config file given by `-c/--config` (JSON or TOML, by extension)
//! 3. Built-in defaults
//!
//! # Examples
//!
//! ```bash
//! # Override the commit gap threshold via environment variable
//! POUCHROBOT_FETCHER__COMMITS_GAP=30 pouchrobot -c config.json
//! ```

use std::path::Path;

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::error::RobotError;
use crate::labels::{LabelRules, SizeThresholds};

/// Maintainers whose LGTM counts when none are configured.
const DEFAULT_MAINTAINERS: &[&str] = &[
    "allencloud",
    "yyb196",
    "Ace-Tang",
    "skoo87",
    "sunyuan3",
    "furykerry",
    "WIZARD-CXY",
    "skyline09",
    "rudyfly",
    "houqianming",
    "Letty5411",
    "HusterWan",
    "shaloulcy",
];

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// HTTP listen address; `:port` binds every interface.
    #[serde(alias = "httpListen")]
    pub http_listen: String,
    /// GitHub token used for every API call.
    #[serde(alias = "accessToken", deserialize_with = "deserialize_secret")]
    pub access_token: Option<SecretString>,
    /// GitHub login of the bot account, used as the head of doc pull requests.
    #[serde(alias = "botLogin")]
    pub bot_login: String,
    /// Conflict and gap fetcher settings.
    pub fetcher: FetcherConfig,
    /// Doc generator settings.
    #[serde(alias = "docGenerator")]
    pub doc_generator: DocGeneratorConfig,
    /// Translation settings.
    pub translator: TranslatorConfig,
    /// Weekly report settings.
    #[serde(alias = "weeklyReport")]
    pub weekly_report: WeeklyReportConfig,
    /// Close-out-of-date scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Triage thresholds and policies.
    pub triage: TriageConfig,
    /// Keyword tables for label classification.
    pub labels: LabelRules,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            http_listen: ":6789".to_string(),
            access_token: None,
            bot_login: "pouchrobot".to_string(),
            fetcher: FetcherConfig::default(),
            doc_generator: DocGeneratorConfig::default(),
            translator: TranslatorConfig::default(),
            weekly_report: WeeklyReportConfig::default(),
            scheduler: SchedulerConfig::default(),
            triage: TriageConfig::default(),
            labels: LabelRules::default(),
        }
    }
}

impl AppConfig {
    /// Socket address string for the HTTP listener.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        if self.http_listen.starts_with(':') {
            format!("0.0.0.0{}", self.http_listen)
        } else {
            self.http_listen.clone()
        }
    }

    /// Checks the settings every component depends on.
    pub fn validate(&self) -> Result<(), RobotError> {
        if self.owner.trim().is_empty() || self.repo.trim().is_empty() {
            return Err(RobotError::Config {
                message: "owner and repo must both be set".to_string(),
            });
        }
        if self.doc_generator.generation_hour > 23
            || self.weekly_report.report_hour > 23
            || self.scheduler.hour > 23
        {
            return Err(RobotError::Config {
                message: "hours must be within 0-23".to_string(),
            });
        }
        if self.weekly_report.weekday().is_none() {
            return Err(RobotError::Config {
                message: format!(
                    "unknown weekly report day {}",
                    self.weekly_report.report_day
                ),
            });
        }
        Ok(())
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(SecretString::from))
}

/// Conflict and gap fetcher settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Commits behind master at which a pull request gets the gap label.
    #[serde(alias = "commitsGap")]
    pub commits_gap: usize,
    /// Seconds between two fetcher passes.
    pub interval_secs: u64,
    /// Local clone (with an `upstream` remote) used for gap checks.
    pub repo_path: String,
    /// Run the git based gap check.
    pub check_gap: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            commits_gap: 20,
            interval_secs: 180,
            repo_path: ".".to_string(),
            check_gap: true,
        }
    }
}

/// Doc generator settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocGeneratorConfig {
    /// Root of the local clone; empty disables the generator.
    #[serde(alias = "rootDir")]
    pub root_dir: String,
    /// Swagger spec path relative to `root_dir`.
    #[serde(alias = "swaggerPath")]
    pub swagger_path: String,
    /// Generated API doc path relative to `root_dir`.
    #[serde(alias = "APIDocPath", alias = "apiDocPath")]
    pub api_doc_path: String,
    /// Local hour (0-23) at which docs are regenerated.
    #[serde(alias = "generationHour")]
    pub generation_hour: u32,
    /// Shell command regenerating CLI docs.
    #[serde(alias = "cliDocGeneratorCmd")]
    pub cli_doc_generator_cmd: String,
}

impl Default for DocGeneratorConfig {
    fn default() -> Self {
        Self {
            root_dir: String::new(),
            swagger_path: String::new(),
            api_doc_path: String::new(),
            generation_hour: 1,
            cli_doc_generator_cmd: String::new(),
        }
    }
}

/// Translation settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Baidu translation API credentials.
    pub baidu: BaiduConfig,
}

/// Baidu translation API credentials.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BaiduConfig {
    /// Application id.
    #[serde(alias = "appID", alias = "appId")]
    pub app_id: String,
    /// Signing key.
    #[serde(deserialize_with = "deserialize_secret")]
    pub key: Option<SecretString>,
}

/// Weekly report settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeeklyReportConfig {
    /// Post the report at all.
    pub enabled: bool,
    /// English weekday name, e.g. `Friday`.
    #[serde(alias = "reportDay")]
    pub report_day: String,
    /// Local hour (0-23) at which the report is posted.
    #[serde(alias = "reportHour")]
    pub report_hour: u32,
}

impl Default for WeeklyReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            report_day: "Friday".to_string(),
            report_hour: 8,
        }
    }
}

impl WeeklyReportConfig {
    /// Parsed report weekday.
    #[must_use]
    pub fn weekday(&self) -> Option<chrono::Weekday> {
        self.report_day.parse().ok()
    }
}

/// Close-out-of-date scheduler settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Days without activity after which an open issue is closed; 0 disables.
    #[serde(alias = "maxDayOfNoActionIssue")]
    pub max_day_of_no_action_issue: i64,
    /// Extra passes attempted after a failed pass.
    #[serde(alias = "maxRetryOfScheduler")]
    pub max_retry: u32,
    /// Local hour (0-23) at which the pass runs.
    pub hour: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_day_of_no_action_issue: 0,
            max_retry: 3,
            hour: 6,
        }
    }
}

/// How a repeated maintainer LGTM is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LgtmPolicy {
    /// Any maintainer LGTM on an `LGTM` labelled PR approves it, including
    /// a repeat by the same maintainer.
    #[default]
    AnyMaintainer,
    /// Approval needs an LGTM from a maintainer other than earlier LGTM authors.
    DistinctMaintainer,
}

/// Triage thresholds and policies.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Logins whose LGTM comments count (case-insensitive).
    pub maintainers: Vec<String>,
    /// Double LGTM policy.
    pub lgtm_policy: LgtmPolicy,
    /// Size label tiers.
    pub size_thresholds: SizeThresholds,
    /// Minimum title length for issues and pull requests.
    pub title_min_len: usize,
    /// Minimum body length for newly opened issues.
    pub issue_body_min_len_opened: usize,
    /// Minimum body length for edited issues.
    pub issue_body_min_len_edited: usize,
    /// Minimum body length for pull requests.
    pub pr_body_min_len: usize,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            maintainers: DEFAULT_MAINTAINERS.iter().map(|m| (*m).to_string()).collect(),
            lgtm_policy: LgtmPolicy::default(),
            size_thresholds: SizeThresholds::default(),
            title_min_len: 20,
            issue_body_min_len_opened: 100,
            issue_body_min_len_edited: 50,
            pr_body_min_len: 100,
        }
    }
}

impl TriageConfig {
    /// Returns true if `login` is a maintainer, ignoring case.
    #[must_use]
    pub fn is_maintainer(&self, login: &str) -> bool {
        self.maintainers
            .iter()
            .any(|m| m.eq_ignore_ascii_case(login))
    }
}

/// Load application configuration from `path`.
///
/// Environment variables use the prefix `POUCHROBOT_` and double underscore
/// for nested keys (e.g., `POUCHROBOT_FETCHER__COMMITS_GAP`).
///
/// # Errors
///
/// Returns `RobotError::Config` if the file is missing or invalid, or if the
/// loaded configuration fails validation.
pub fn load_config(path: &Path) -> Result<AppConfig, RobotError> {
    let config = Config::builder()
        .add_source(File::with_name(path.to_string_lossy().as_ref()))
        .add_source(
            Environment::with_prefix("POUCHROBOT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;

    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;
    use serial_test::serial;

    use super::*;

    fn from_json(s: &str) -> AppConfig {
        Config::builder()
            .add_source(config::File::from_str(s, config::FileFormat::Json))
            .build()
            .expect("should build")
            .try_deserialize()
            .expect("should deserialize")
    }

    #[test]
    fn test_defaults() {
        let config = from_json(r#"{"owner": "pouchcontainer", "repo": "pouch"}"#);
        assert_eq!(config.http_listen, ":6789");
        assert_eq!(config.listen_addr(), "0.0.0.0:6789");
        assert_eq!(config.fetcher.commits_gap, 20);
        assert_eq!(config.weekly_report.report_day, "Friday");
        assert_eq!(config.triage.title_min_len, 20);
        assert_eq!(config.triage.lgtm_policy, LgtmPolicy::AnyMaintainer);
        assert!(config.access_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nested_sections() {
        let config = from_json(
            r#"{
                "owner": "pouchcontainer",
                "repo": "pouch",
                "http_listen": "127.0.0.1:8080",
                "access_token": "ghp_example",
                "fetcher": {"commits_gap": 15},
                "doc_generator": {"root_dir": "/go/src/pouch", "generation_hour": 3},
                "weekly_report": {"report_day": "Thursday", "report_hour": 10},
                "triage": {"lgtm_policy": "distinct-maintainer", "maintainers": ["alice"]}
            }"#,
        );
        assert_eq!(config.listen_addr(), "127.0.0.1:8080");
        assert_eq!(
            config.access_token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("ghp_example".to_string())
        );
        assert_eq!(config.fetcher.commits_gap, 15);
        assert_eq!(config.fetcher.interval_secs, 180);
        assert_eq!(config.doc_generator.generation_hour, 3);
        assert_eq!(config.weekly_report.weekday(), Some(chrono::Weekday::Thu));
        assert_eq!(config.triage.lgtm_policy, LgtmPolicy::DistinctMaintainer);
        assert!(config.triage.is_maintainer("ALICE"));
        assert!(!config.triage.is_maintainer("allencloud"));
    }

    #[test]
    fn test_camel_case_aliases() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "owner": "pouchcontainer",
                "repo": "pouch",
                "httpListen": ":7000",
                "accessToken": "token",
                "fetcher": {"commitsGap": 30},
                "docGenerator": {"rootDir": "/src", "APIDocPath": "docs/api.md"},
                "translator": {"baidu": {"appID": "20180101", "key": "k"}},
                "weeklyReport": {"reportDay": "Monday", "reportHour": 9}
            }"#,
        )
        .expect("should deserialize");
        assert_eq!(config.http_listen, ":7000");
        assert_eq!(config.fetcher.commits_gap, 30);
        assert_eq!(config.doc_generator.api_doc_path, "docs/api.md");
        assert_eq!(config.translator.baidu.app_id, "20180101");
        assert!(config.translator.baidu.key.is_some());
        assert_eq!(config.weekly_report.report_hour, 9);
    }

    #[test]
    fn test_custom_label_rules_replace_builtin() {
        let config = from_json(
            r#"{
                "owner": "o",
                "repo": "r",
                "labels": {"title": [{"label": "areas/runtime", "patterns": ["runc"]}]}
            }"#,
        );
        assert_eq!(config.labels.title.len(), 1);
        assert!(!config.labels.body.is_empty());
    }

    #[test]
    fn test_validate_rejects_missing_repo() {
        let config = from_json(r#"{"owner": "pouchcontainer"}"#);
        assert!(matches!(config.validate(), Err(RobotError::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_weekday() {
        let config = from_json(
            r#"{"owner": "o", "repo": "r", "weekly_report": {"report_day": "Caturday"}}"#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_config_with_env_override() {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .expect("should create temp file");
        write!(file, r#"{{"owner": "pouchcontainer", "repo": "pouch"}}"#).expect("should write");

        // SAFETY: serialized with other env-touching tests
        unsafe { std::env::set_var("POUCHROBOT_FETCHER__COMMITS_GAP", "42") };
        let config = load_config(file.path());
        unsafe { std::env::remove_var("POUCHROBOT_FETCHER__COMMITS_GAP") };

        let config = config.expect("should load");
        assert_eq!(config.fetcher.commits_gap, 42);
    }

    #[test]
    #[serial]
    fn test_load_config_token_from_env() {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .expect("should create temp file");
        write!(file, r#"{{"owner": "pouchcontainer", "repo": "pouch"}}"#).expect("should write");

        // SAFETY: serialized with other env-touching tests
        unsafe { std::env::set_var("POUCHROBOT_ACCESS_TOKEN", "ghp_from_env") };
        let config = load_config(file.path());
        unsafe { std::env::remove_var("POUCHROBOT_ACCESS_TOKEN") };

        let config = config.expect("should load");
        assert_eq!(
            config.access_token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("ghp_from_env".to_string())
        );
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/pouchrobot.json"));
        assert!(matches!(result, Err(RobotError::Config { .. })));
    }
}
