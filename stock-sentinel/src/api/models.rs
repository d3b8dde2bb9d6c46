//! Request and response bodies.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitor::{ChangeEvent, CheckOutcome, LastKnown, StatusSnapshot};

/// Default number of snapshots returned by the history endpoint.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// Result of a manual check.
#[derive(Debug, Clone, Serialize)]
pub struct ManualCheckResponse {
    pub success: bool,
    /// `completed`, `cooldown_active` or `failed`.
    pub outcome: &'static str,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_order_button: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_availability: Option<bool>,
    pub events: Vec<ChangeEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_known: Option<LastKnown>,
}

impl ManualCheckResponse {
    /// Build the response body and its HTTP status.
    pub fn from_outcome(outcome: CheckOutcome, now: DateTime<Utc>) -> (StatusCode, Self) {
        let kind = outcome.kind();
        match outcome {
            CheckOutcome::Completed(report) => {
                let message = report.summary();
                (
                    StatusCode::OK,
                    Self {
                        success: true,
                        outcome: kind,
                        message,
                        timestamp: report.checked_at,
                        has_order_button: Some(report.classification.has_order_signal),
                        has_availability: Some(report.classification.has_availability_signal),
                        events: report.events,
                        cooldown_until: None,
                        last_known: None,
                    },
                )
            }
            CheckOutcome::CooldownActive { until } => (
                StatusCode::TOO_MANY_REQUESTS,
                Self {
                    success: false,
                    outcome: kind,
                    message: format!(
                        "Too many consecutive failures, checks paused until {}",
                        until.to_rfc3339()
                    ),
                    timestamp: now,
                    has_order_button: None,
                    has_availability: None,
                    events: Vec::new(),
                    cooldown_until: Some(until),
                    last_known: None,
                },
            ),
            CheckOutcome::Failed(failed) => (
                StatusCode::BAD_GATEWAY,
                Self {
                    success: false,
                    outcome: kind,
                    message: format!("Check failed: {}", failed.error),
                    timestamp: failed.failed_at,
                    has_order_button: failed.last_known.as_ref().map(|k| k.has_order_button),
                    has_availability: failed.last_known.as_ref().map(|k| k.has_availability),
                    events: failed.events,
                    cooldown_until: None,
                    last_known: failed.last_known,
                },
            ),
        }
    }
}

/// Connect-time message on the event stream.
#[derive(Debug, Clone, Serialize)]
pub struct StatusMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: String,
    pub status: StatusSnapshot,
}

impl StatusMessage {
    pub fn greeting(status: StatusSnapshot) -> Self {
        Self {
            kind: "status",
            message: "Connected to stock-sentinel".to_string(),
            status,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub components: Vec<ComponentHealth>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{FailedCheck, FetchFailure, GovernorState, CheckTrigger};

    #[test]
    fn test_cooldown_maps_to_429() {
        let until = Utc::now();
        let (status, body) =
            ManualCheckResponse::from_outcome(CheckOutcome::CooldownActive { until }, Utc::now());
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(!body.success);
        assert_eq!(body.outcome, "cooldown_active");
        assert_eq!(body.cooldown_until, Some(until));
    }

    #[test]
    fn test_failure_carries_last_known() {
        let failed = FailedCheck {
            trigger: CheckTrigger::Manual,
            failed_at: Utc::now(),
            error: FetchFailure::new(3, "timed out"),
            governor: GovernorState::Degraded {
                consecutive_failures: 1,
            },
            last_known: Some(LastKnown {
                has_order_button: true,
                has_availability: false,
                observed_at: None,
            }),
            events: Vec::new(),
        };
        let (status, body) =
            ManualCheckResponse::from_outcome(CheckOutcome::Failed(failed), Utc::now());
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.has_order_button, Some(true));
        assert!(body.message.contains("timed out"));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["last_known"]["has_order_button"], true);
        assert!(json.get("cooldown_until").is_none());
    }
}
