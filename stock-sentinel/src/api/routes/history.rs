//! Snapshot history.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{DEFAULT_HISTORY_LIMIT, HistoryQuery};
use crate::api::server::AppState;
use crate::domain::Snapshot;

pub fn router() -> Router<AppState> {
    Router::new().route("/history", get(get_history))
}

/// Newest first. Raw page content is never included.
async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<Snapshot>>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit < 1 {
        return Err(ApiError::bad_request("limit must be at least 1"));
    }
    let snapshots = state.monitor.history(limit).await?;
    Ok(Json(snapshots))
}
