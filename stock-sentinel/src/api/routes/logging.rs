//! Runtime log filter.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::logging::LoggingConfig;

#[derive(Debug, Deserialize)]
pub struct UpdateLogFilterRequest {
    pub filter: String,
}

#[derive(Debug, Serialize)]
pub struct LoggingConfigResponse {
    pub filter: String,
    pub log_dir: String,
}

impl From<&LoggingConfig> for LoggingConfigResponse {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            filter: config.get_filter(),
            log_dir: config.log_dir().display().to_string(),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/logging", get(get_logging_config).put(update_logging_config))
}

fn logging_config(state: &AppState) -> ApiResult<&LoggingConfig> {
    state
        .logging_config
        .as_deref()
        .ok_or_else(|| ApiError::service_unavailable("Logging configuration not available"))
}

async fn get_logging_config(State(state): State<AppState>) -> ApiResult<Json<LoggingConfigResponse>> {
    Ok(Json(LoggingConfigResponse::from(logging_config(&state)?)))
}

/// Swap the filter directive, e.g. `{"filter": "stock_sentinel=debug"}`.
async fn update_logging_config(
    State(state): State<AppState>,
    Json(request): Json<UpdateLogFilterRequest>,
) -> ApiResult<Json<LoggingConfigResponse>> {
    let config = logging_config(&state)?;
    config.set_filter(&request.filter)?;
    Ok(Json(LoggingConfigResponse::from(config)))
}
