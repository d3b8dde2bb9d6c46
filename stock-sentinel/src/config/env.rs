//! Small helpers for reading typed values from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// Non-empty, trimmed value of `key`.
pub(crate) fn string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match string(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::config(format!("{key}: invalid value '{raw}': {e}"))),
        None => Ok(None),
    }
}

pub(crate) fn secs(key: &str) -> Result<Option<Duration>> {
    Ok(parse::<u64>(key)?.map(Duration::from_secs))
}

pub(crate) fn flag(key: &str) -> Result<Option<bool>> {
    match string(key) {
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| Error::config(format!("{key}: expected a boolean, got '{raw}'"))),
        None => Ok(None),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Comma-separated list; empty entries are dropped.
pub(crate) fn list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Comma-separated list of whole seconds.
pub(crate) fn secs_list(key: &str, raw: &str) -> Result<Vec<Duration>> {
    list(raw)
        .into_iter()
        .map(|item| {
            item.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| Error::config(format!("{key}: invalid seconds '{item}': {e}")))
        })
        .collect()
}
