//! Manual check trigger.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use chrono::Utc;
use tracing::info;

use crate::api::models::ManualCheckResponse;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/manual-check", get(manual_check).post(manual_check))
}

/// Runs the check inline. Waits behind any check already in flight.
async fn manual_check(State(state): State<AppState>) -> (StatusCode, Json<ManualCheckResponse>) {
    info!("Manual check requested");
    let outcome = state.monitor.run_manual_check().await;
    let (status, body) = ManualCheckResponse::from_outcome(outcome, Utc::now());
    (status, Json(body))
}
