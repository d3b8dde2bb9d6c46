//! Consecutive-failure gate in front of the fetch pipeline.
//!
//! `Healthy -> Degraded(n) -> Cooldown(until)`. While in cooldown no fetch is
//! attempted. Once `until` passes the next attempt runs normally and its
//! outcome decides the next state: a success resets to `Healthy`, another
//! failure re-enters cooldown.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Derived governor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GovernorState {
    Healthy,
    Degraded { consecutive_failures: u32 },
    Cooldown { until: DateTime<Utc> },
}

impl GovernorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GovernorState::Healthy => "healthy",
            GovernorState::Degraded { .. } => "degraded",
            GovernorState::Cooldown { .. } => "cooldown",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, GovernorState::Healthy)
    }
}

impl std::fmt::Display for GovernorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GovernorState::Healthy => write!(f, "healthy"),
            GovernorState::Degraded {
                consecutive_failures,
            } => write!(f, "degraded({consecutive_failures})"),
            GovernorState::Cooldown { until } => write!(f, "cooldown(until {until})"),
        }
    }
}

/// A check was refused because the governor is cooling down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownActive {
    pub until: DateTime<Utc>,
}

/// Failure counter and cooldown window.
///
/// Not internally synchronized: the monitor keeps it behind the check lock.
#[derive(Debug, Clone)]
pub struct FailureGovernor {
    max_consecutive_failures: u32,
    cooldown: chrono::Duration,
    consecutive_failures: u32,
    last_failure: Option<DateTime<Utc>>,
    cooldown_until: Option<DateTime<Utc>>,
}

impl FailureGovernor {
    pub fn new(max_consecutive_failures: u32, cooldown: Duration) -> Self {
        Self {
            max_consecutive_failures: max_consecutive_failures.max(1),
            cooldown: chrono::Duration::from_std(cooldown).unwrap_or(chrono::Duration::MAX),
            consecutive_failures: 0,
            last_failure: None,
            cooldown_until: None,
        }
    }

    /// State as observed at `now`.
    pub fn state(&self, now: DateTime<Utc>) -> GovernorState {
        if let Some(until) = self.cooldown_until
            && now < until
        {
            return GovernorState::Cooldown { until };
        }
        if self.consecutive_failures == 0 {
            GovernorState::Healthy
        } else {
            GovernorState::Degraded {
                consecutive_failures: self.consecutive_failures,
            }
        }
    }

    /// Whether a check may start at `now`.
    pub fn permit(&self, now: DateTime<Utc>) -> Result<(), CooldownActive> {
        match self.state(now) {
            GovernorState::Cooldown { until } => Err(CooldownActive { until }),
            _ => Ok(()),
        }
    }

    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 {
            info!(
                consecutive_failures = self.consecutive_failures,
                "Check succeeded, failure counter reset"
            );
        }
        self.consecutive_failures = 0;
        self.last_failure = None;
        self.cooldown_until = None;
    }

    /// Record a failed check. Returns the resulting state.
    pub fn record_failure(&mut self, now: DateTime<Utc>) -> GovernorState {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(now);

        if self.consecutive_failures >= self.max_consecutive_failures {
            let until = now.checked_add_signed(self.cooldown).unwrap_or(DateTime::<Utc>::MAX_UTC);
            self.cooldown_until = Some(until);
            warn!(
                consecutive_failures = self.consecutive_failures,
                cooldown_until = %until,
                "Too many consecutive failures, entering cooldown"
            );
        }

        self.state(now)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_failure(&self) -> Option<DateTime<Utc>> {
        self.last_failure
    }

    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        self.cooldown_until
    }
}
