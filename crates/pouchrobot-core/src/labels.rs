// SPDX-License-Identifier: Apache-2.0

//! Label vocabulary and keyword-based label classification.
//!
//! Classification is a pure function over a rule table loaded once at startup.
//! Title and body are scanned against separate tables and the union of all
//! matched labels is returned as a set.

use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::error;

/// Label attached to pull requests whose CI run failed.
pub const CI_FAILURE_LABEL: &str = "CI-failure";

/// Label attached to pull requests that cannot be merged cleanly.
pub const CONFLICT_LABEL: &str = "conflict/needs-rebase";

/// Label attached to pull requests that are too far behind master.
pub const GAP_LABEL: &str = "gap/needs-rebase";

/// Highest priority label.
pub const PRIORITY_P1_LABEL: &str = "priority/P1";

/// Prefix shared by every size label.
pub const SIZE_LABEL_PREFIX: &str = "size/";

/// Label asking the author for a better title or description.
pub const MORE_INFO_NEEDED_LABEL: &str = "status/more-info-needed";

/// Label added on the first maintainer LGTM.
pub const LGTM_LABEL: &str = "LGTM";

/// Label added on a further maintainer LGTM.
pub const APPROVED_LABEL: &str = "APPROVED";

const BUILTIN_TITLE_RULES: &[(&str, &[&str])] = &[
    (
        "areas/cli",
        &["cli:", "cli :", "command", "command line", "command-line"],
    ),
    (
        "areas/docs",
        &["doc:", "docs:", "doc :", "docs :", "document"],
    ),
    (
        "areas/log",
        &["gelf", "fluentd", "journald", "log", "splunk", "syslog"],
    ),
    (
        "areas/images",
        &["docker image", "image-spec", "pouch pull"],
    ),
    (
        "areas/monitoring",
        &["monitoring", "prometheus", "health check"],
    ),
    (
        "areas/network",
        &[
            "cni", "ipvlan", "ipsec", "macvlan", "network", "overlay", "vlan", "vxlan",
        ],
    ),
    (
        "areas/orchestration",
        &["kubernetes", "marathon", "mesos", "swarm", "swarmkit"],
    ),
    ("areas/runv", &["runv"]),
    ("areas/storage", &["csi", "storage", "volume"]),
    ("areas/test", &["ci", "test"]),
    ("areas/typo", &["typo"]),
    (
        "kind/bug",
        &[
            "bug",
            "bugfix",
            "cannot",
            "can not",
            "can't",
            "error",
            "failure",
            "failed to ",
            "fix:",
        ],
    ),
    ("kind/design", &["design"]),
    ("kind/feature", &["feature"]),
    (
        "kind/feature-request",
        &["feature request", "feature-request", "feature_request"],
    ),
    (
        "kind/panic",
        &["invalid memory address or nil pointer", "panic"],
    ),
    ("kind/performance", &["performance"]),
    ("kind/proposal", &["proposal"]),
    (
        "kind/question",
        &[
            "can i",
            "can you",
            "confusion",
            "does pouch",
            "how to",
            "question",
            "where to",
        ],
    ),
    ("kind/refactor", &["refactor"]),
    ("os/windows", &["windows", "windows server", ".net"]),
    ("os/ubuntu", &["ubuntu"]),
    ("os/macos", &["macos", "osx"]),
    ("os/centos", &["centos"]),
    ("os/fedora", &["fedora"]),
    ("os/suse", &["suse"]),
    ("os/freebsd", &["freebsd"]),
    (
        PRIORITY_P1_LABEL,
        &["panic", "invalid memory address or nil pointer"],
    ),
    (
        "DO-NOT-MERGE",
        &["do not merge", "do-not-merge", "don't merge"],
    ),
    (
        "WeeklyReport",
        &["weekly report", "weeklyreport", "weekreport", "week report"],
    ),
];

const BUILTIN_BODY_RULES: &[(&str, &[&str])] = &[(
    "kind/panic",
    &["panic", "invalid memory address or nil pointer"],
)];

/// A label and the substrings that cause it to be attached.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelRule {
    /// Label name as it exists in the repository.
    pub label: String,
    /// Case-insensitive substrings; any single match emits the label.
    pub patterns: Vec<String>,
}

impl LabelRule {
    fn matches(&self, lowered: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| lowered.contains(p.to_lowercase().as_str()))
    }
}

/// Keyword tables for titles and bodies.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LabelRules {
    /// Rules applied to the title.
    pub title: Vec<LabelRule>,
    /// Rules applied to the body.
    pub body: Vec<LabelRule>,
}

impl Default for LabelRules {
    fn default() -> Self {
        Self {
            title: to_rules(BUILTIN_TITLE_RULES),
            body: to_rules(BUILTIN_BODY_RULES),
        }
    }
}

fn to_rules(table: &[(&str, &[&str])]) -> Vec<LabelRule> {
    table
        .iter()
        .map(|(label, patterns)| LabelRule {
            label: (*label).to_string(),
            patterns: patterns.iter().map(|p| (*p).to_string()).collect(),
        })
        .collect()
}

fn scan<'a>(rules: &'a [LabelRule], text: &str) -> impl Iterator<Item = &'a str> {
    let lowered = text.to_lowercase();
    rules
        .iter()
        .filter(move |rule| rule.matches(&lowered))
        .map(|rule| rule.label.as_str())
}

impl LabelRules {
    /// Returns every label whose patterns match the title or the body.
    ///
    /// A missing field contributes no labels and is logged.
    #[must_use]
    pub fn classify(&self, title: Option<&str>, body: Option<&str>) -> BTreeSet<String> {
        let mut labels = BTreeSet::new();

        match title {
            Some(title) => labels.extend(scan(&self.title, title).map(str::to_string)),
            None => error!("title is empty, no title labels attached"),
        }

        match body {
            Some(body) => labels.extend(scan(&self.body, body).map(str::to_string)),
            None => error!("body is empty, no body labels attached"),
        }

        labels
    }
}

/// Returns the candidates that are not already attached, in sorted order.
#[must_use]
pub fn label_delta(candidates: &BTreeSet<String>, current: &[String]) -> Vec<String> {
    candidates
        .iter()
        .filter(|label| !current.iter().any(|c| c == *label))
        .cloned()
        .collect()
}

/// Upper bounds (inclusive) of the size tiers, in changed lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SizeThresholds {
    /// Largest `size/XS` change.
    pub xs: u64,
    /// Largest `size/S` change.
    pub s: u64,
    /// Largest `size/M` change.
    pub m: u64,
    /// Largest `size/L` change.
    pub l: u64,
    /// Largest `size/XL` change; anything above is `size/XXL`.
    pub xl: u64,
}

impl Default for SizeThresholds {
    fn default() -> Self {
        Self {
            xs: 10,
            s: 40,
            m: 80,
            l: 160,
            xl: 640,
        }
    }
}

impl SizeThresholds {
    /// Maps a changed-line count onto its size label.
    #[must_use]
    pub fn label_for(&self, changed: u64) -> String {
        let tier = if changed <= self.xs {
            "XS"
        } else if changed <= self.s {
            "S"
        } else if changed <= self.m {
            "M"
        } else if changed <= self.l {
            "L"
        } else if changed <= self.xl {
            "XL"
        } else {
            "XXL"
        };
        format!("{SIZE_LABEL_PREFIX}{tier}")
    }

    /// Size label for a pull request's additions and deletions.
    ///
    /// Missing counts fall back to `size/XS`.
    #[must_use]
    pub fn label_for_diff(&self, additions: Option<u64>, deletions: Option<u64>) -> String {
        match (additions, deletions) {
            (Some(a), Some(d)) => self.label_for(a + d),
            _ => {
                error!("additions or deletions missing, using smallest size label");
                self.label_for(0)
            }
        }
    }
}

/// Returns true if the label is one of the size labels.
#[must_use]
pub fn is_size_label(label: &str) -> bool {
    label.starts_with(SIZE_LABEL_PREFIX)
}
