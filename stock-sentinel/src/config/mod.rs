//! Configuration for the monitor process.
//!
//! Values are read from the environment (after loading an optional `.env`
//! file with `dotenvy`) on top of built-in defaults.

mod env;
pub mod lexicon;
pub mod monitor;

pub use lexicon::LexiconConfig;
pub use monitor::{MonitorConfig, SourceKind};

use crate::Result;
use crate::api::ApiServerConfig;

/// Default SQLite database URL.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:stock_sentinel.db?mode=rwc";

/// Default log directory.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Top-level process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub log_dir: String,
    pub api: ApiServerConfig,
    pub monitor: MonitorConfig,
}

impl AppConfig {
    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Invalid numeric values are rejected rather than silently replaced, so a
    /// typo in a deployment does not turn into a 0-second polling loop.
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::string("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let log_dir = env::string("LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.to_string());

        let monitor = MonitorConfig::from_env()?;
        monitor.validate()?;

        Ok(Self {
            database_url,
            log_dir,
            api: ApiServerConfig::from_env_or_default(),
            monitor,
        })
    }
}
