//! stock-sentinel library crate.
//!
//! Watches a product page and alerts when it becomes orderable or shows the
//! item in stock. Exposed as a library for the binary and integration tests.

pub mod api;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod scheduler;
pub mod utils;

pub use error::{Error, Result};
