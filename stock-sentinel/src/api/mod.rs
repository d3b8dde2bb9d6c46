//! HTTP and WebSocket query surface.
//!
//! Exposes current status, snapshot history, manual checks and a live
//! event stream for dashboards.

pub mod error;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
