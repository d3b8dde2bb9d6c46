//! Monitor scheduling, retry and source settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::LexiconConfig;
use super::env;
use crate::{Error, Result};

/// Default page that is watched when no endpoint is configured.
pub const DEFAULT_ENDPOINT: &str = "https://www.tesla.com/tr_TR/modely/design#overview";

/// Longest single fetch attempt accepted from configuration.
pub const MAX_FETCH_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Desktop browser user agent; several storefronts refuse obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// How page content is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Plain HTTP(S) GET.
    #[default]
    Http,
    /// Local files, one path per endpoint.
    File,
}

impl std::str::FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" | "https" => Ok(Self::Http),
            "file" => Ok(Self::File),
            other => Err(Error::config(format!("unknown source kind '{other}'"))),
        }
    }
}

/// Configuration for the monitor and its timers.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Main polling interval.
    pub poll_interval: Duration,
    /// Fast-retry interval, active only while checks are failing.
    pub fast_retry_interval: Duration,
    /// Consecutive failures that trigger a cooldown.
    pub max_consecutive_failures: u32,
    /// How long to stop fetching once the failure limit is reached.
    pub cooldown: Duration,
    /// Per-endpoint timeouts, tried in order.
    pub timeout_ladder: Vec<Duration>,
    /// Candidate endpoints, tried in order.
    pub endpoints: Vec<String>,
    pub source_kind: SourceKind,
    pub user_agent: String,
    /// Keep the full page text in each snapshot.
    pub retain_raw_content: bool,
    pub lexicon: LexiconConfig,
    /// Delete snapshots older than this many days (disabled when `None`).
    pub retention_days: Option<u32>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5 * 60),
            fast_retry_interval: Duration::from_secs(60),
            max_consecutive_failures: 3,
            cooldown: Duration::from_secs(15 * 60),
            timeout_ladder: vec![
                Duration::from_secs(10),
                Duration::from_secs(20),
                Duration::from_secs(30),
            ],
            endpoints: vec![DEFAULT_ENDPOINT.to_string()],
            source_kind: SourceKind::Http,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retain_raw_content: true,
            lexicon: LexiconConfig::default(),
            retention_days: None,
        }
    }
}

impl MonitorConfig {
    /// Load monitor config from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `SENTINEL_ENDPOINTS` (comma separated)
    /// - `SENTINEL_SOURCE` (`http` or `file`)
    /// - `SENTINEL_POLL_INTERVAL_SECS`, `SENTINEL_FAST_RETRY_INTERVAL_SECS`
    /// - `SENTINEL_MAX_CONSECUTIVE_FAILURES`, `SENTINEL_COOLDOWN_SECS`
    /// - `SENTINEL_TIMEOUT_LADDER_SECS` (comma separated, e.g. "10,20,30")
    /// - `SENTINEL_RETAIN_RAW_CONTENT`, `SENTINEL_USER_AGENT`
    /// - `SENTINEL_LEXICON_FILE` (JSON), `SENTINEL_RETENTION_DAYS`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = env::string("SENTINEL_ENDPOINTS") {
            config.endpoints = env::list(&raw);
        }
        if let Some(kind) = env::parse::<SourceKind>("SENTINEL_SOURCE")? {
            config.source_kind = kind;
        }
        if let Some(interval) = env::secs("SENTINEL_POLL_INTERVAL_SECS")? {
            config.poll_interval = interval;
        }
        if let Some(interval) = env::secs("SENTINEL_FAST_RETRY_INTERVAL_SECS")? {
            config.fast_retry_interval = interval;
        }
        if let Some(max) = env::parse::<u32>("SENTINEL_MAX_CONSECUTIVE_FAILURES")? {
            config.max_consecutive_failures = max;
        }
        if let Some(cooldown) = env::secs("SENTINEL_COOLDOWN_SECS")? {
            config.cooldown = cooldown;
        }
        if let Some(raw) = env::string("SENTINEL_TIMEOUT_LADDER_SECS") {
            config.timeout_ladder = env::secs_list("SENTINEL_TIMEOUT_LADDER_SECS", &raw)?;
        }
        if let Some(retain) = env::flag("SENTINEL_RETAIN_RAW_CONTENT")? {
            config.retain_raw_content = retain;
        }
        if let Some(user_agent) = env::string("SENTINEL_USER_AGENT") {
            config.user_agent = user_agent;
        }
        if let Some(path) = env::string("SENTINEL_LEXICON_FILE") {
            config.lexicon = LexiconConfig::from_json_file(path)?;
        }
        config.retention_days = env::parse::<u32>("SENTINEL_RETENTION_DAYS")?;

        Ok(config)
    }

    /// Reject settings that would make the monitor spin or never fetch.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::config("poll interval must be greater than zero"));
        }
        if self.fast_retry_interval.is_zero() {
            return Err(Error::config("fast-retry interval must be greater than zero"));
        }
        if self.max_consecutive_failures == 0 {
            return Err(Error::config("max consecutive failures must be at least 1"));
        }
        if self.timeout_ladder.is_empty() || self.timeout_ladder.iter().any(|t| t.is_zero()) {
            return Err(Error::config("timeout ladder must contain non-zero timeouts"));
        }
        if self.timeout_ladder.iter().any(|t| *t > MAX_FETCH_TIMEOUT) {
            return Err(Error::config(format!(
                "timeouts may not exceed {}s",
                MAX_FETCH_TIMEOUT.as_secs()
            )));
        }
        if self.endpoints.is_empty() {
            return Err(Error::config("at least one endpoint is required"));
        }
        if self.lexicon.is_empty() {
            return Err(Error::config("order and availability lexicons are both empty"));
        }
        Ok(())
    }

    /// Upper bound on how long one fetch may block.
    pub fn fetch_budget(&self) -> Duration {
        let per_endpoint = self
            .timeout_ladder
            .iter()
            .fold(Duration::ZERO, |total, timeout| total.saturating_add(*timeout));
        let endpoints = u32::try_from(self.endpoints.len()).unwrap_or(u32::MAX);
        per_endpoint.saturating_mul(endpoints)
    }
}
