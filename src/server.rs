//! Web server module for connwatch.
//!
//! Serves the test page, the stats page and the JSON API they call.

use std::path::PathBuf;
use std::sync::Arc;

use askama::Template;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::config::AutoConfig;
use crate::runner::TestRunner;
use crate::scheduler::{AutoTester, SchedulerError};
use crate::storage::{LogRecord, StorageError, TestMode};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub runner: TestRunner,
    pub auto: Arc<AutoTester>,
    pub auto_config: AutoConfig,
    /// Directory served under `/static`.
    pub static_dir: PathBuf,
}

/// Errors returned by API handlers.
///
/// Storage failures are reported to the client as a generic failure; the
/// cause only goes to the server log.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(ErrorBody { error: msg })).into_response()
            }
            Self::Internal(cause) => {
                tracing::error!(error = %cause, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: "internal error".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::InvalidInterval => Self::BadRequest(e.to_string()),
            SchedulerError::Storage(inner) => inner.into(),
        }
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

/// Body of `POST /api/auto/start`.
#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    pub interval_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
struct StartResponse {
    running: bool,
    interval_seconds: u64,
    already_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_result: Option<LogRecord>,
}

#[derive(Debug, Serialize)]
struct StopResponse {
    running: bool,
    stopped: bool,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    running: bool,
    interval_seconds: u64,
}

/// Query parameters for the stats API.
#[derive(Debug, Deserialize)]
pub struct StatsQueryParams {
    pub range: Option<String>,
}

/// Parse filtered time range from string.
/// Supports: 1h, 6h, 12h, 24h, 7d, 30d.
fn parse_range(range: Option<String>) -> Option<NaiveDateTime> {
    let range = range?;
    let now = Local::now().naive_local();
    match range.as_str() {
        "1h" => Some(now - ChronoDuration::hours(1)),
        "6h" => Some(now - ChronoDuration::hours(6)),
        "12h" => Some(now - ChronoDuration::hours(12)),
        "24h" => Some(now - ChronoDuration::hours(24)),
        "7d" => Some(now - ChronoDuration::days(7)),
        "30d" => Some(now - ChronoDuration::days(30)),
        _ => None,
    }
}

/// Test page template.
#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    target_url: String,
    default_interval: u64,
    min_interval: u64,
    max_interval: u64,
}

/// Stats page template.
#[derive(Template)]
#[template(path = "stats.html")]
struct StatsTemplate {
    target_url: String,
}

/// Wrapper to render Askama templates as Axum responses.
struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(rendered) => Html(rendered).into_response(),
            Err(err) => {
                tracing::error!(error = %err, "Template render failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.static_dir);
    let app_state = Arc::new(state);

    Router::new()
        .route("/", get(index_handler))
        .route("/stats", get(stats_page_handler))
        .route("/healthz", get(healthz_handler))
        .route("/api/test", post(manual_test_handler))
        .route("/api/test/auto", post(auto_test_handler))
        .route("/api/auto/start", post(auto_start_handler))
        .route("/api/auto/stop", post(auto_stop_handler))
        .route("/api/auto/status", get(auto_status_handler))
        .route("/api/stats", get(stats_handler))
        .nest_service("/static", static_files)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

async fn index_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    HtmlTemplate(IndexTemplate {
        target_url: state.runner.target().to_string(),
        default_interval: state.auto_config.default_interval.as_secs(),
        min_interval: state.auto_config.min_interval.as_secs().max(1),
        max_interval: state.auto_config.max_interval.as_secs(),
    })
}

async fn stats_page_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    HtmlTemplate(StatsTemplate {
        target_url: state.runner.target().to_string(),
    })
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Run one manual test.
async fn manual_test_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LogRecord>, ApiError> {
    Ok(Json(state.runner.run(TestMode::Manual).await?))
}

/// Run one test on behalf of a client-side timer.
async fn auto_test_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LogRecord>, ApiError> {
    Ok(Json(state.runner.run(TestMode::Auto).await?))
}

async fn auto_start_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<StartResponse>, ApiError> {
    let request: StartRequest = if body.iter().all(u8::is_ascii_whitespace) {
        StartRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e)))?
    };

    let interval = match request.interval_seconds {
        Some(secs) => std::time::Duration::from_secs(secs),
        None => state.auto_config.default_interval,
    };
    let (min, max) = (state.auto_config.min_interval, state.auto_config.max_interval);
    if interval.is_zero() || interval < min || interval > max {
        return Err(ApiError::BadRequest(format!(
            "interval_seconds must be between {} and {}",
            min.as_secs().max(1),
            max.as_secs()
        )));
    }

    let report = state.auto.start(interval).await?;
    Ok(Json(StartResponse {
        running: true,
        interval_seconds: report.interval.as_secs(),
        already_running: report.already_running,
        message: report
            .already_running
            .then(|| "auto test already running".to_string()),
        last_result: report.first_result,
    }))
}

async fn auto_stop_handler(State(state): State<Arc<AppState>>) -> Json<StopResponse> {
    let stopped = state.auto.stop().await;
    Json(StopResponse {
        running: false,
        stopped,
    })
}

async fn auto_status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let status = state.auto.status().await;
    Json(StatusResponse {
        running: status.running,
        interval_seconds: status.interval.as_secs(),
    })
}

/// Aggregate stats over the log, optionally limited to a recent range.
async fn stats_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatsQueryParams>,
) -> Response {
    let since = parse_range(params.range);
    match state.runner.store().aggregate(since).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
