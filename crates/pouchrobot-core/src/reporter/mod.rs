// SPDX-License-Identifier: Apache-2.0

//! Weekly activity report filed as a GitHub issue.
//!
//! The reporter owns the previous week's counters. They start at zero and
//! live only as long as the process, so the first report after a restart
//! shows growth against zero.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, Utc};
use tracing::{info, instrument, warn};

use crate::github::{GitHubApi, Issue};
use crate::templates::{CommentKind, Templates};

mod report;

pub use report::{PrKind, SimplePr, StatsLastWeek, WeekReport, display_name};

/// Builds and files the weekly report.
pub struct Reporter {
    api: Arc<dyn GitHubApi>,
    first_contribution_marker: String,
    last_week: StatsLastWeek,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("owner", &self.api.owner())
            .field("repo", &self.api.repo())
            .field("last_week", &self.last_week)
            .finish_non_exhaustive()
    }
}

impl Reporter {
    /// Creates a reporter with a zero baseline.
    #[must_use]
    pub fn new(api: Arc<dyn GitHubApi>) -> Self {
        let templates = Templates::new(api.owner(), api.repo());
        Self {
            first_contribution_marker: templates
                .marker(CommentKind::FirstContribution)
                .trim_end()
                .to_string(),
            api,
            last_week: StatsLastWeek::default(),
        }
    }

    /// Counters the next report is compared against.
    #[must_use]
    pub fn last_week(&self) -> StatsLastWeek {
        self.last_week
    }

    /// Builds this week's report, files it and rolls the baseline forward.
    ///
    /// Returns the number of the created issue.
    #[instrument(skip(self), fields(owner = %self.api.owner(), repo = %self.api.repo()))]
    pub async fn run_once(&mut self) -> Result<u64> {
        let report = self.build_report(Local::now()).await?;
        let body = report.render(&self.last_week);
        let number = self
            .api
            .create_issue(&report.title(), &body)
            .await
            .context("Failed to file weekly report")?;

        self.last_week = report.baseline();
        info!(number, "Filed weekly report");
        Ok(number)
    }

    /// Collects the week ending at `now`.
    ///
    /// Repository stats and the merged pull request search are required;
    /// issue counts, comments and reviews degrade to empty on failure.
    pub async fn build_report(&self, now: DateTime<Local>) -> Result<WeekReport> {
        let api = self.api.as_ref();
        let end = now.date_naive();
        let start = (now - Duration::days(7)).date_naive();
        let mut report = WeekReport::new(api.owner(), api.repo(), start, end);
        let since = start.format("%Y-%m-%d").to_string();
        let slug = format!("{}/{}", api.owner(), api.repo());

        report.stats = api
            .repo_stats()
            .await
            .context("Failed to fetch repository stats")?;
        report.contributors = api.count_contributors().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to count contributors");
            0
        });
        report.new_issues = self
            .count(&format!("is:issue repo:{slug} created:>={since}"))
            .await;
        report.closed_issues = self
            .count(&format!("is:issue repo:{slug} closed:>={since}"))
            .await;

        let merged = api
            .search_issues(&format!("is:merged type:pr repo:{slug} merged:>={since}"))
            .await
            .context("Failed to search merged pull requests")?;
        report.merged_count = merged.total_count;
        info!(%since, merged = merged.items.len(), "Collected merged pull requests");

        for pr in &merged.items {
            if self.is_first_contribution(pr.number).await {
                report.add_new_contributor(&pr.user);
            }
            report.add_merged(SimplePr {
                number: pr.number,
                title: pr.title.clone(),
                html_url: pr.html_url.clone(),
            });
        }

        report.reviews_by_user = self
            .count_reviews(&merged.items, now.with_timezone(&Utc) - Duration::days(7))
            .await;
        Ok(report)
    }

    async fn count(&self, query: &str) -> u64 {
        match self.api.count_issues(query).await {
            Ok(total) => total,
            Err(e) => {
                warn!(query, error = %e, "Issue search failed");
                0
            }
        }
    }

    async fn is_first_contribution(&self, number: u64) -> bool {
        match self.api.list_comments(number).await {
            Ok(comments) => comments
                .iter()
                .any(|c| c.body.trim_end().ends_with(&self.first_contribution_marker)),
            Err(e) => {
                warn!(number, error = %e, "Failed to list comments");
                false
            }
        }
    }

    /// Reviews submitted since `since` on merged and open pull requests.
    async fn count_reviews(
        &self,
        merged: &[Issue],
        since: DateTime<Utc>,
    ) -> std::collections::BTreeMap<String, u64> {
        let mut numbers: Vec<u64> = merged.iter().map(|i| i.number).collect();
        match self.api.list_open_pulls().await {
            Ok(open) => numbers.extend(open.iter().map(|p| p.number)),
            Err(e) => warn!(error = %e, "Failed to list open pull requests"),
        }
        numbers.sort_unstable();
        numbers.dedup();

        let mut by_user = std::collections::BTreeMap::new();
        for number in numbers {
            let reviews = match self.api.list_pull_reviews(number).await {
                Ok(reviews) => reviews,
                Err(e) => {
                    warn!(number, error = %e, "Failed to list reviews");
                    continue;
                }
            };
            for review in reviews {
                if review.submitted_at.is_some_and(|at| at >= since) {
                    *by_user.entry(review.user).or_insert(0) += 1;
                }
            }
        }
        by_user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::memory::MemoryGitHub;
    use crate::github::{PullRequest, RepoStats, Review, SearchResult};

    fn merged_pr(number: u64, title: &str, user: &str) -> Issue {
        Issue::builder()
            .number(number)
            .title(title)
            .user(user)
            .is_pull_request(true)
            .state("closed")
            .html_url(format!("https://github.com/pouchcontainer/pouch/pull/{number}"))
            .build()
    }

    fn seeded() -> Arc<MemoryGitHub> {
        let gh = Arc::new(MemoryGitHub::new("pouchcontainer", "pouch"));
        gh.set_stats(
            RepoStats {
                watchers: 10,
                stars: 100,
                forks: 20,
            },
            30,
        );
        gh.set_search(
            "is:merged",
            SearchResult {
                total_count: 2,
                items: vec![
                    merged_pr(1, "feature: cri streaming", "erin"),
                    merged_pr(2, "fix: leaked mounts", "frank"),
                ],
            },
        );
        gh.set_search(
            "created:>=",
            SearchResult {
                total_count: 4,
                items: vec![],
            },
        );
        let templates = Templates::new("pouchcontainer", "pouch");
        gh.push_comment(1, "pouchrobot", &templates.render(CommentKind::FirstContribution, "erin"));
        gh
    }

    #[tokio::test]
    async fn test_build_report_collects_week() {
        let gh = seeded();
        let now = Local::now();
        gh.set_reviews(
            1,
            vec![
                Review {
                    user: "allencloud".to_string(),
                    submitted_at: Some(Utc::now() - Duration::days(1)),
                },
                Review {
                    user: "allencloud".to_string(),
                    submitted_at: Some(Utc::now() - Duration::days(30)),
                },
                Review {
                    user: "pending".to_string(),
                    submitted_at: None,
                },
            ],
        );
        gh.insert_pull(PullRequest::builder().number(7).user("gina").build());
        gh.set_reviews(
            7,
            vec![Review {
                user: "yyb196".to_string(),
                submitted_at: Some(Utc::now()),
            }],
        );

        let reporter = Reporter::new(gh.clone());
        let report = reporter.build_report(now).await.unwrap();

        assert_eq!(report.contributors, 30);
        assert_eq!(report.new_issues, 4);
        assert_eq!(report.closed_issues, 0);
        assert_eq!(report.merged_count, 2);
        assert_eq!(report.new_contributors, vec!["erin".to_string()]);
        assert_eq!(report.merged[&PrKind::Feature].len(), 1);
        assert_eq!(report.merged[&PrKind::Bugfix].len(), 1);
        assert_eq!(report.reviews_by_user.get("allencloud"), Some(&1));
        assert_eq!(report.reviews_by_user.get("yyb196"), Some(&1));
        assert!(!report.reviews_by_user.contains_key("pending"));
        assert_eq!(report.end_date - report.start_date, Duration::days(7));
    }

    #[tokio::test]
    async fn test_run_once_files_issue_and_rolls_baseline() {
        let gh = seeded();
        let mut reporter = Reporter::new(gh.clone());
        assert_eq!(reporter.last_week(), StatsLastWeek::default());

        let number = reporter.run_once().await.unwrap();
        let issue = gh.issue(number).unwrap();
        assert!(issue.title.starts_with("WeeklyReport of PouchContainer from "));
        assert!(issue.body.unwrap().contains("|10 (↑10)|100 (↑100)|20 (↑20)|30 (↑30)|4|0|"));
        assert_eq!(
            reporter.last_week(),
            StatsLastWeek {
                watch: 10,
                star: 100,
                fork: 20,
                contributors: 30,
            }
        );

        let second = reporter.run_once().await.unwrap();
        let body = gh.issue(second).unwrap().body.unwrap();
        assert!(body.contains("|10 (↑0)|100 (↑0)|20 (↑0)|30 (↑0)|"));
    }
}
