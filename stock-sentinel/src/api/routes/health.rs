//! Health check routes.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};

use crate::api::models::{ComponentHealth, HealthResponse};
use crate::api::server::AppState;

/// Create the health router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.monitor.status();

    let scheduler = ComponentHealth {
        name: "scheduler".to_string(),
        status: if status.monitoring_active {
            "healthy".to_string()
        } else {
            "stopped".to_string()
        },
        message: None,
    };
    let source = ComponentHealth {
        name: "source".to_string(),
        status: status.governor.state.to_string(),
        message: (status.governor.consecutive_failures > 0).then(|| {
            format!(
                "{} consecutive failed check(s)",
                status.governor.consecutive_failures
            )
        }),
    };

    let overall = if !status.monitoring_active {
        "unhealthy"
    } else if status.governor.state == "healthy" {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: overall.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        components: vec![scheduler, source],
    })
}

/// Readiness check - is the monitor running?
/// Returns HTTP 200 while the scheduler is active, HTTP 503 otherwise.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.monitor.is_monitoring_active() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

/// Liveness check - is the service alive?
async fn liveness_check(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "uptime_secs": uptime
        })),
    )
}
