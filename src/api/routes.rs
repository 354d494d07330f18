use axum::{
    error_handling::HandleErrorLayer,
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    BoxError, Json, Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::observability::{MetricsRegistry, TimingGuard};
use crate::rules::EvaluationSnapshot;

use super::request::DecisionRequest;
use super::response::{DecisionResponse, ErrorResponse, HealthResponse, ReadyResponse};

/// Shared application state.
pub struct AppState {
    /// Current snapshot (updated via watch channel)
    pub snapshot_rx: watch::Receiver<Arc<EvaluationSnapshot>>,

    /// Process-wide counters
    pub metrics: Arc<MetricsRegistry>,

    /// Application start time
    pub start_time: Instant,

    /// Application version
    pub version: String,

    /// Per-request timeout
    pub request_timeout: Duration,
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let request_timeout = state.request_timeout;

    Router::new()
        .route("/v1/data/allow", post(handle_decision))
        .route("/v1/decision", post(handle_decision))
        .route("/health", get(handle_health))
        .route("/ready", get(handle_ready))
        .route("/metrics", get(handle_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(request_timeout),
        )
        .with_state(state)
}

/// Handle decision requests.
///
/// Every failure path answers with a non-2xx status and no `result`, so a
/// dispatcher reading `result.allow` can only proceed on an explicit allow.
async fn handle_decision(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> Response {
    let _timer = TimingGuard::new(&state.metrics);

    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => {
            state.metrics.record_rejected();
            warn!(error = %rejection.body_text(), "Rejected malformed decision request");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request(rejection.body_text())),
            )
                .into_response();
        }
    };

    let ctx = match req.to_request_context() {
        Ok(ctx) => ctx,
        Err(e) => {
            state.metrics.record_rejected();
            warn!(error = %e, "Rejected incomplete decision request");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request(e.to_string())),
            )
                .into_response();
        }
    };

    // One snapshot per request
    let snapshot = state.snapshot_rx.borrow().clone();
    let verdict = snapshot.evaluate(&ctx);
    state.metrics.record_verdict(&verdict);

    let decision_id = Uuid::new_v4();
    info!(
        decision_id = %decision_id,
        method = ctx.method(),
        path = ctx.path(),
        allow = verdict.allow,
        matched_rule = verdict.matched_rule.as_deref().unwrap_or("-"),
        policy_version = %verdict.policy_version,
        "Decision completed"
    );

    (StatusCode::OK, Json(DecisionResponse::new(decision_id, verdict))).into_response()
}

async fn handle_middleware_error(err: BoxError) -> (StatusCode, Json<ErrorResponse>) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            Json(ErrorResponse::new("request timed out", "TIMEOUT")),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(err.to_string(), "INTERNAL_ERROR")),
        )
    }
}

/// Health check endpoint.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.snapshot_rx.borrow().clone();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        policy_version: snapshot.policy_version().to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Readiness check endpoint.
async fn handle_ready(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.snapshot_rx.borrow().clone();

    // A rule set without rules would deny everything
    if snapshot.ruleset.is_empty() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("No rules loaded", "NOT_READY")),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        Json(ReadyResponse {
            ready: true,
            policy_version: snapshot.policy_version().to_string(),
            refdata_version: snapshot.refdata_version().to_string(),
            rules: snapshot.ruleset.len(),
            refdata_keys: snapshot.refdata.len(),
            loaded_at: snapshot.loaded_at,
        }),
    )
        .into_response()
}

/// Metrics endpoint (Prometheus format).
async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rules = state.snapshot_rx.borrow().ruleset.len();

    let metrics = format!(
        r#"# HELP actiongate_uptime_seconds Application uptime in seconds
# TYPE actiongate_uptime_seconds counter
actiongate_uptime_seconds {}

# HELP actiongate_rules Number of rules loaded
# TYPE actiongate_rules gauge
actiongate_rules {}

{}"#,
        state.start_time.elapsed().as_secs(),
        rules,
        state.metrics.to_prometheus(),
    );

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        metrics,
    )
}
