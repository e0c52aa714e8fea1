// SPDX-License-Identifier: Apache-2.0

//! Periodic tasks and CI notifications against the in-memory repository.

use std::sync::Arc;

use chrono::Utc;
use pouchrobot_core::github::{RepoStats, SearchResult};
use pouchrobot_core::{
    CiNotifier, Fetcher, FetcherConfig, IssueScheduler, Issue, MemoryGitHub, PullRequest,
    Reporter, SchedulerConfig, ScriptedRunner,
};

const CONFLICT_LABEL: &str = "conflict/needs-rebase";

fn repo() -> Arc<MemoryGitHub> {
    Arc::new(MemoryGitHub::new("pouchcontainer", "pouch"))
}

fn conflict_only_fetcher(gh: &Arc<MemoryGitHub>) -> Fetcher {
    Fetcher::new(
        gh.clone(),
        Arc::new(ScriptedRunner::new()),
        FetcherConfig {
            check_gap: false,
            ..FetcherConfig::default()
        },
    )
}

#[tokio::test]
async fn test_conflict_round_trip() {
    let gh = repo();
    gh.insert_pull(
        PullRequest::builder()
            .number(21)
            .user("bob")
            .mergeable(false)
            .labels(vec!["LGTM".to_string()])
            .build(),
    );
    let fetcher = conflict_only_fetcher(&gh);

    fetcher.run_once().await.unwrap();
    assert_eq!(gh.labels(21), vec![CONFLICT_LABEL.to_string()]);
    assert_eq!(gh.comments(21).len(), 1);

    gh.set_mergeable(21, Some(true));
    fetcher.run_once().await.unwrap();
    assert!(gh.labels(21).is_empty());
    assert!(gh.comments(21).is_empty());
}

#[tokio::test]
async fn test_gap_check_labels_pull_behind_master() {
    let gh = repo();
    gh.insert_pull(PullRequest::builder().number(30).user("dave").build());

    let master: String = (0..25).map(|i| format!("m{i:02} master commit\n")).collect();
    let pull = "p01 add grpc volume plugin\nm24 master commit\n";
    let runner = ScriptedRunner::new()
        .respond("git log", &master)
        .respond("git log", pull);
    let fetcher = Fetcher::new(gh.clone(), Arc::new(runner), FetcherConfig::default());

    fetcher.run_once().await.unwrap();

    assert!(gh.labels(30).contains(&"gap/needs-rebase".to_string()));
    let comments = gh.comments(30);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].contains("24 commits behind master"));
}

fn merged(number: u64, title: &str) -> Issue {
    Issue::builder()
        .number(number)
        .title(title)
        .user("erin")
        .is_pull_request(true)
        .state("closed")
        .html_url(format!("https://github.com/pouchcontainer/pouch/pull/{number}"))
        .build()
}

#[tokio::test]
async fn test_weekly_report_is_filed_and_baseline_rolls() {
    let gh = repo();
    gh.set_stats(
        RepoStats {
            watchers: 300,
            stars: 3000,
            forks: 400,
        },
        90,
    );
    gh.set_search(
        "created:>=",
        SearchResult {
            total_count: 7,
            items: Vec::new(),
        },
    );
    gh.set_search(
        "closed:>=",
        SearchResult {
            total_count: 5,
            items: Vec::new(),
        },
    );
    gh.set_search(
        "is:merged",
        SearchResult {
            total_count: 2,
            items: vec![
                merged(101, "feature: add grpc volume plugin"),
                merged(102, "docs: fix typo in README"),
            ],
        },
    );

    let mut reporter = Reporter::new(gh.clone());
    let number = reporter.run_once().await.unwrap();

    let issue = gh.issue(number).unwrap();
    assert!(issue.title.starts_with("WeeklyReport of PouchContainer from "));
    let body = issue.body.unwrap();
    assert!(body.contains("|300 (↑300)|3000 (↑3000)|400 (↑400)|90 (↑90)|7|5|"));
    assert!(body.contains("merged **2** pull requests"));
    assert!(body.contains("* feature: add grpc volume plugin ([#101]("));
    assert!(body.contains("* docs: fix typo in README ([#102]("));
    assert!(body.contains("We have no new contributors in this project this week."));

    let baseline = reporter.last_week();
    assert_eq!(baseline.star, 3000);
    assert_eq!(baseline.contributors, 90);
}

#[tokio::test]
async fn test_ci_failure_then_success() {
    let gh = repo();
    gh.insert_pull(PullRequest::builder().number(44).user("frank").build());
    let notifier = CiNotifier::new(gh.clone());

    let travis = |state: &str| {
        serde_json::json!({
            "pull_request_number": 44,
            "duration": 95,
            "type": "pull_request",
            "state": state,
            "build_url": "https://travis-ci.org/pouchcontainer/pouch/builds/9"
        })
        .to_string()
    };

    notifier.process_travis(&travis("failed")).await.unwrap();
    let comments = gh.comments(44);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].contains("https://travis-ci.org/pouchcontainer/pouch/builds/9"));

    notifier.process_travis(&travis("passed")).await.unwrap();
    assert!(gh.comments(44).is_empty());
}

#[tokio::test]
async fn test_scheduler_closes_inactive_issue() {
    let gh = repo();
    gh.insert_issue(
        Issue::builder()
            .number(50)
            .title("old question")
            .updated_at(Utc::now() - chrono::Duration::days(90))
            .build(),
    );
    gh.insert_issue(Issue::builder().number(51).title("fresh bug").build());

    let scheduler = IssueScheduler::new(
        gh.clone(),
        SchedulerConfig {
            max_day_of_no_action_issue: 60,
            ..SchedulerConfig::default()
        },
    );
    let closed = scheduler.close_out_of_date_issues(Utc::now()).await.unwrap();

    assert_eq!(closed, 1);
    assert_eq!(gh.state(50).as_deref(), Some("closed"));
    assert_eq!(gh.state(51).as_deref(), Some("open"));
}
