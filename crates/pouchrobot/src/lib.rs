// SPDX-License-Identifier: Apache-2.0

//! HTTP surface and process wiring for pouchrobot.
//!
//! The server receives GitHub webhooks on `/events` and CI build
//! notifications on `/ci_notifications`, `/travis_ci_notifications` and
//! `/circleci_notifications`. Pollers run next to it on a [`TaskRunner`] and
//! are stopped after the server drains on Ctrl+C.

pub mod cli;
pub mod logging;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Form, FromRequest, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use pouchrobot_core::{
    AppConfig, BaiduTranslator, CiNotifier, CommandRunner, DocGenerator, Fetcher,
    GitDocRegenerator, GitHubApi, GitHubClient, IssueScheduler, Processor, Reporter, Schedule,
    SystemRunner, TaskRunner, Translator, create_client,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Header GitHub uses to name the webhook event.
pub const EVENT_HEADER: &str = "x-github-event";

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
    processor: Arc<Processor>,
    ci: Arc<CiNotifier>,
}

impl AppState {
    /// Wraps the webhook processor and the CI notifier.
    #[must_use]
    pub fn new(processor: Processor, ci: CiNotifier) -> Self {
        Self {
            processor: Arc::new(processor),
            ci: Arc::new(ci),
        }
    }
}

/// Builds the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/_ping", get(ping))
        .route("/events", post(events))
        .route("/ci_notifications", post(travis_notification))
        .route("/travis_ci_notifications", post(travis_notification))
        .route("/circleci_notifications", post(circleci_notification))
        .with_state(state)
}

async fn ping() -> &'static str {
    "OK"
}

/// 200 with an empty body, or 500 carrying the error chain.
fn outcome(result: Result<()>) -> Response {
    match result {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            let message = format!("{e:#}");
            error!(error = %message, "Request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
        }
    }
}

async fn events(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(event_type) = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok()) else {
        warn!("Webhook delivery without event header");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "missing X-Github-Event header",
        )
            .into_response();
    };
    outcome(state.processor.dispatch(event_type, &body).await)
}

#[derive(Debug, Deserialize)]
struct CiForm {
    payload: String,
}

/// Extracts the notification JSON from a form `payload` field or a raw body.
async fn ci_payload(request: Request) -> Result<String, Response> {
    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        let Form(form) = Form::<CiForm>::from_request(request, &())
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.body_text()).into_response())?;
        Ok(form.payload)
    } else {
        let body = Bytes::from_request(request, &())
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.body_text()).into_response())?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

async fn travis_notification(State(state): State<AppState>, request: Request) -> Response {
    match ci_payload(request).await {
        Ok(payload) => outcome(state.ci.process_travis(&payload).await),
        Err(rejection) => rejection,
    }
}

async fn circleci_notification(State(state): State<AppState>, request: Request) -> Response {
    match ci_payload(request).await {
        Ok(payload) => outcome(state.ci.process_circleci(&payload).await),
        Err(rejection) => rejection,
    }
}

/// Spawns every enabled poller.
///
/// The fetcher always runs. The weekly reporter, doc generator and issue
/// scheduler are skipped when their configuration disables them.
pub fn spawn_tasks(config: &AppConfig, api: &Arc<dyn GitHubApi>) -> TaskRunner {
    let mut runner = TaskRunner::new();
    let system: Arc<dyn CommandRunner> = Arc::new(SystemRunner);

    let interval = Duration::from_secs(config.fetcher.interval_secs.max(1));
    runner.spawn(
        Fetcher::new(api.clone(), system.clone(), config.fetcher.clone()),
        Schedule::Every(interval),
    );

    match config.weekly_report.weekday() {
        Some(weekday) if config.weekly_report.enabled => runner.spawn(
            Reporter::new(api.clone()),
            Schedule::WeeklyAt {
                weekday,
                hour: config.weekly_report.report_hour,
            },
        ),
        _ => debug!("Weekly report disabled"),
    }

    if config.doc_generator.root_dir.is_empty() {
        debug!("Doc generator disabled");
    } else {
        let regenerator = Arc::new(GitDocRegenerator::new(
            system,
            config.doc_generator.clone(),
            &config.repo,
        ));
        runner.spawn(
            DocGenerator::new(
                api.clone(),
                regenerator,
                &config.doc_generator,
                &config.bot_login,
            ),
            Schedule::DailyAt {
                hour: config.doc_generator.generation_hour,
            },
        );
    }

    let scheduler = IssueScheduler::new(api.clone(), config.scheduler.clone());
    if scheduler.is_enabled() {
        runner.spawn(
            scheduler,
            Schedule::DailyAt {
                hour: config.scheduler.hour,
            },
        );
    } else {
        debug!("Close-out-of-date scheduler disabled");
    }

    runner
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down gracefully");
}

/// Serves `app` on `addr` until Ctrl+C.
pub async fn serve(addr: &str, app: Router) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    Ok(())
}

/// Runs the bot until Ctrl+C.
///
/// Connects to GitHub, starts the pollers, serves webhooks, then stops the
/// pollers once the server has drained.
pub async fn run(config: AppConfig) -> Result<()> {
    info!(owner = %config.owner, repo = %config.repo, "Starting pouchrobot");

    let octocrab = create_client(config.access_token.as_ref())?;
    let api: Arc<dyn GitHubApi> =
        Arc::new(GitHubClient::new(octocrab, &config.owner, &config.repo));

    let translator = BaiduTranslator::from_config(&config.translator.baidu)?
        .map(|t| Arc::new(t) as Arc<dyn Translator>);
    if translator.is_none() {
        debug!("Translation disabled");
    }

    let processor = Processor::new(
        api.clone(),
        config.triage.clone(),
        config.labels.clone(),
        translator,
    );
    let state = AppState::new(processor, CiNotifier::new(api.clone()));

    let runner = spawn_tasks(&config, &api);
    let served = serve(&config.listen_addr(), router(state)).await;
    runner.shutdown().await;
    served
}
