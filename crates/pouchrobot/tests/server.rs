// SPDX-License-Identifier: Apache-2.0

//! Router tests driven with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use pouchrobot::{AppState, router};
use pouchrobot_core::{
    CiNotifier, LabelRules, MemoryGitHub, Processor, PullRequest, TriageConfig,
};
use tower::ServiceExt;

fn app(gh: &Arc<MemoryGitHub>) -> Router {
    let processor = Processor::new(
        gh.clone(),
        TriageConfig::default(),
        LabelRules::default(),
        None,
    );
    router(AppState::new(processor, CiNotifier::new(gh.clone())))
}

fn seeded() -> Arc<MemoryGitHub> {
    let gh = Arc::new(MemoryGitHub::new("pouchcontainer", "pouch"));
    gh.insert_pull(PullRequest::builder().number(44).user("frank").build());
    gh
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn event(kind: &str, body: &str) -> Request<Body> {
    Request::post("/events")
        .header("X-Github-Event", kind)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn travis(state: &str) -> String {
    serde_json::json!({
        "pull_request_number": 44,
        "duration": 95,
        "type": "pull_request",
        "state": state,
        "build_url": "https://travis-ci.org/pouchcontainer/pouch/builds/9"
    })
    .to_string()
}

#[tokio::test]
async fn test_ping_route() {
    let gh = seeded();
    let request = Request::get("/_ping").body(Body::empty()).unwrap();
    let (status, body) = send(app(&gh), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_github_ping_event() {
    let gh = seeded();
    let (status, body) = send(app(&gh), event("ping", r#"{"zen": "Keep it simple."}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_unknown_event_is_server_error() {
    let gh = seeded();
    let (status, body) = send(app(&gh), event("fork", "{}")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("unknown event type fork"), "body: {body}");
}

#[tokio::test]
async fn test_malformed_payload_is_server_error() {
    let gh = seeded();
    let (status, _) = send(app(&gh), event("issues", "{not json")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_missing_event_header() {
    let gh = seeded();
    let request = Request::post("/events").body(Body::from("{}")).unwrap();
    let (status, body) = send(app(&gh), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("X-Github-Event"));
}

#[tokio::test]
async fn test_travis_form_payload_with_escaped_quotes() {
    let gh = seeded();
    let escaped = travis("failed").replace('"', "\\\"");
    let request = Request::post("/ci_notifications")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("payload={escaped}")))
        .unwrap();

    let (status, body) = send(app(&gh), request).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    let comments = gh.comments(44);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].contains("build duration: 95s"));
}

#[tokio::test]
async fn test_travis_raw_json_clears_failure() {
    let gh = seeded();
    let failed = Request::post("/travis_ci_notifications")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(travis("failed")))
        .unwrap();
    assert_eq!(send(app(&gh), failed).await.0, StatusCode::OK);
    assert_eq!(gh.comments(44).len(), 1);

    let passed = Request::post("/travis_ci_notifications")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(travis("passed")))
        .unwrap();
    assert_eq!(send(app(&gh), passed).await.0, StatusCode::OK);
    assert!(gh.comments(44).is_empty());
}

#[tokio::test]
async fn test_circleci_notification() {
    let gh = seeded();
    let payload = serde_json::json!({
        "payload": {
            "status": "failed",
            "branch": "pull/44",
            "build_url": "https://circleci.com/gh/pouchcontainer/pouch/7",
            "build_time_millis": 120_500
        }
    })
    .to_string();
    let request = Request::post("/circleci_notifications")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload))
        .unwrap();

    let (status, _) = send(app(&gh), request).await;
    assert_eq!(status, StatusCode::OK);
    let comments = gh.comments(44);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].contains("build duration: 120s"));
}

#[tokio::test]
async fn test_circleci_non_pull_branch_is_server_error() {
    let gh = seeded();
    let payload = r#"{"payload": {"status": "success", "branch": "master"}}"#;
    let request = Request::post("/circleci_notifications")
        .body(Body::from(payload))
        .unwrap();
    let (status, _) = send(app(&gh), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
