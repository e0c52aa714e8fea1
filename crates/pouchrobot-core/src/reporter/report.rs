// SPDX-License-Identifier: Apache-2.0

//! Weekly report data and its Markdown rendering.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::NaiveDate;

use crate::github::RepoStats;

/// Title-prefix category of a merged pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrKind {
    /// `feature:` or `feat:`.
    Feature,
    /// `bugfix:` or `fix:`.
    Bugfix,
    /// `doc:` or `docs:`.
    Doc,
    /// `test:` or `tests:`.
    Test,
    /// Anything else.
    Others,
}

impl PrKind {
    /// Every kind in report order.
    pub const ALL: [PrKind; 5] = [
        PrKind::Feature,
        PrKind::Bugfix,
        PrKind::Doc,
        PrKind::Test,
        PrKind::Others,
    ];

    /// Classifies a pull request by the prefix of its title.
    #[must_use]
    pub fn from_title(title: &str) -> Self {
        let has = |prefixes: &[&str]| prefixes.iter().any(|p| title.starts_with(p));
        if has(&["feature:", "feat:"]) {
            PrKind::Feature
        } else if has(&["bugfix:", "fix:"]) {
            PrKind::Bugfix
        } else if has(&["doc:", "docs:"]) {
            PrKind::Doc
        } else if has(&["test:", "tests:"]) {
            PrKind::Test
        } else {
            PrKind::Others
        }
    }

    fn heading(self) -> &'static str {
        match self {
            PrKind::Feature => "### feature 🆕 🔫 ",
            PrKind::Bugfix => "### bugfix 🐛 🔪 ",
            PrKind::Doc => "### doc 📜 📝 ",
            PrKind::Test => "### test ✅ ☑️ ",
            PrKind::Others => "### others",
        }
    }
}

/// A merged pull request as listed in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplePr {
    /// Pull request number.
    pub number: u64,
    /// Title.
    pub title: String,
    /// Web URL.
    pub html_url: String,
}

/// Counters carried from one report to the next for the trend column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsLastWeek {
    /// Watchers.
    pub watch: u64,
    /// Stargazers.
    pub star: u64,
    /// Forks.
    pub fork: u64,
    /// Contributors.
    pub contributors: u64,
}

/// One week of repository activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekReport {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Repository name as shown in the report.
    pub display_name: String,
    /// First day covered.
    pub start_date: NaiveDate,
    /// Last day covered.
    pub end_date: NaiveDate,
    /// Watcher, star and fork counts.
    pub stats: RepoStats,
    /// Contributor count.
    pub contributors: u64,
    /// Issues opened during the week.
    pub new_issues: u64,
    /// Issues closed during the week.
    pub closed_issues: u64,
    /// Merged pull request total reported by search.
    pub merged_count: u64,
    /// Merged pull requests by title prefix.
    pub merged: BTreeMap<PrKind, Vec<SimplePr>>,
    /// First-time contributors, first-seen order.
    pub new_contributors: Vec<String>,
    /// Reviews submitted during the week, by login.
    pub reviews_by_user: BTreeMap<String, u64>,
}

/// Name the report uses for `repo`.
#[must_use]
pub fn display_name(repo: &str) -> String {
    if repo == "pouch" {
        "PouchContainer".to_string()
    } else {
        repo.to_string()
    }
}

/// Change since last week, `↑n` when steady or rising and `↓n` when falling.
fn trend(now: u64, before: u64) -> String {
    if now >= before {
        format!("↑{}", now - before)
    } else {
        format!("↓{}", before - now)
    }
}

impl WeekReport {
    /// Creates an empty report for `owner/repo` covering `start..=end`.
    #[must_use]
    pub fn new(owner: &str, repo: &str, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            display_name: display_name(repo),
            start_date,
            end_date,
            stats: RepoStats::default(),
            contributors: 0,
            new_issues: 0,
            closed_issues: 0,
            merged_count: 0,
            merged: BTreeMap::new(),
            new_contributors: Vec::new(),
            reviews_by_user: BTreeMap::new(),
        }
    }

    /// Files a merged pull request under its title prefix.
    pub fn add_merged(&mut self, pr: SimplePr) {
        self.merged
            .entry(PrKind::from_title(&pr.title))
            .or_default()
            .push(pr);
    }

    /// Records a new contributor once.
    pub fn add_new_contributor(&mut self, login: &str) {
        if !self.new_contributors.iter().any(|c| c == login) {
            self.new_contributors.push(login.to_string());
        }
    }

    /// Counters to compare the next report against.
    #[must_use]
    pub fn baseline(&self) -> StatsLastWeek {
        StatsLastWeek {
            watch: self.stats.watchers,
            star: self.stats.stars,
            fork: self.stats.forks,
            contributors: self.contributors,
        }
    }

    /// Issue title for this report.
    #[must_use]
    pub fn title(&self) -> String {
        format!(
            "WeeklyReport of {} from {} to {}",
            self.display_name,
            self.start_date.format("%Y-%m-%d"),
            self.end_date.format("%Y-%m-%d")
        )
    }

    fn contributing_url(&self) -> String {
        format!(
            "https://github.com/{}/{}/blob/master/CONTRIBUTING.md",
            self.owner, self.repo
        )
    }

    /// Reviewers sorted by review count, most active first.
    #[must_use]
    pub fn ranked_reviewers(&self) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .reviews_by_user
            .iter()
            .map(|(user, n)| (user.as_str(), *n))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    /// Renders the report body, showing growth against `last_week`.
    #[must_use]
    pub fn render(&self, last_week: &StatsLastWeek) -> String {
        let mut out = String::new();
        let name = &self.display_name;

        let _ = write!(
            out,
            "\n# Weekly Report of {name}\n\n\
             This is a weekly report of {name}. It summarizes what have changed in the project \
             during the passed week, including pr merged, new contributors, and more things in the future. \n\
             It is all done by @pouchrobot which is an AI robot.  See: https://github.com/pouchcontainer/pouchrobot.\n"
        );

        self.render_repo_update(&mut out, last_week);
        self.render_pr_update(&mut out);
        self.render_reviews(&mut out);
        self.render_new_contributors(&mut out);
        out
    }

    fn render_repo_update(&self, out: &mut String, last_week: &StatsLastWeek) {
        out.push_str("## Repo Update \n");
        out.push_str(
            "\n| Watch | Star | Fork | Contributors | New Issues | Closed Issues |\n\
             |:-----:|:----:|:----:|:------------:|:----------:|:-------------:|\n",
        );
        let _ = write!(
            out,
            "|{} ({})|{} ({})|{} ({})|{} ({})|{}|{}|\n\n",
            self.stats.watchers,
            trend(self.stats.watchers, last_week.watch),
            self.stats.stars,
            trend(self.stats.stars, last_week.star),
            self.stats.forks,
            trend(self.stats.forks, last_week.fork),
            self.contributors,
            trend(self.contributors, last_week.contributors),
            self.new_issues,
            self.closed_issues,
        );
    }

    fn render_pr_update(&self, out: &mut String) {
        let _ = write!(
            out,
            "\n## PR Update\n\n\
             Thanks to contributions from community, {} team merged **{}** pull requests in the \
             repository last week. All these pull requests could be divided into **feature**, \
             **bugfix**, **doc**, **test** and **others**:\n\n",
            self.display_name, self.merged_count
        );

        for kind in PrKind::ALL {
            let Some(prs) = self.merged.get(&kind).filter(|p| !p.is_empty()) else {
                continue;
            };
            out.push_str(kind.heading());
            out.push_str("\n\n");
            for pr in prs {
                let _ = writeln!(out, "* {} ([#{}]({}))", pr.title, pr.number, pr.html_url);
            }
            out.push('\n');
        }
    }

    fn render_reviews(&self, out: &mut String) {
        out.push_str("## Code Review Statistics 🐞 🐞 🐞 \n");
        out.push_str(
            "This project encourages everyone to participant in code review, in order to improve \
             software quality. Every week @pouchrobot would automatically help to count pull request \
             reviews of single github user as the following. So, try to help review code in this project.\n\n",
        );
        out.push_str("| Contributor ID | Pull Request Reviews |\n|:--------: | :--------:|\n");
        for (user, count) in self.ranked_reviewers() {
            let _ = writeln!(out, "|@{user}|{count}|");
        }
        out.push_str("\n\n");
    }

    fn render_new_contributors(&self, out: &mut String) {
        out.push_str("## New Contributors 🎖 🎖 🎖 \n\n");
        let contributing = self.contributing_url();
        if self.new_contributors.is_empty() {
            let _ = write!(
                out,
                "We have no new contributors in this project this week.\n\
                 {} team encourages everything about contribution from community.\n\
                 For more details, please refer to {contributing} . 🍻\n",
                self.display_name
            );
        } else {
            let _ = write!(
                out,
                "It is {} team's great honor to have new contributors from community. We really \
                 appreciate your contributions. Feel free to tell us if you have any opinion and please \
                 share this open source project with more people if you could. If you hope to be a \
                 contributor as well, please start from {contributing} . 🎁 👏 🍺\n\
                 Here is the list of new contributors:\n\n",
                self.display_name
            );
            for login in &self.new_contributors {
                let _ = writeln!(out, "@{login}");
            }
        }
        out.push_str("\n\n Thank all of you!");
    }
}
