//! API route modules.

pub mod check;
pub mod events;
pub mod health;
pub mod history;
pub mod logging;
pub mod status;

use axum::Router;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_router())
        .nest("/health", health::router())
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        .merge(status::router())
        .merge(history::router())
        .merge(check::router())
        .merge(events::router())
        .merge(logging::router())
}
