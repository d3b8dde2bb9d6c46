//! Current status.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::server::AppState;
use crate::monitor::StatusSnapshot;

pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(get_status))
}

/// Never waits for a running check.
async fn get_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.monitor.status())
}
