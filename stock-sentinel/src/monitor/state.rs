//! Monitor state and the status view published to readers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::governor::{FailureGovernor, GovernorState};
use super::tracker::Observation;
use crate::domain::{Classification, Snapshot};

/// The process's current belief about the page.
///
/// Owned by the monitor and only mutated while the check lock is held.
/// Rebuildable from the newest snapshot; failure counters reset on restart.
#[derive(Debug, Clone)]
pub struct MonitorState {
    pub last_classification: Classification,
    pub last_check_time: Option<DateTime<Utc>>,
    /// Last successful observation, used when storage cannot provide a baseline.
    pub last_observation: Option<Observation>,
    pub governor: FailureGovernor,
}

impl MonitorState {
    pub fn new(governor: FailureGovernor) -> Self {
        Self {
            last_classification: Classification::NEUTRAL,
            last_check_time: None,
            last_observation: None,
            governor,
        }
    }

    pub fn rehydrate(&mut self, snapshot: &Snapshot) {
        self.last_classification = snapshot.classification;
        self.last_check_time = Some(snapshot.timestamp);
        self.last_observation = Some(Observation::from(snapshot));
    }

    pub fn record_success(&mut self, observation: Observation, at: DateTime<Utc>) {
        self.last_classification = observation.classification;
        self.last_check_time = Some(at);
        self.last_observation = Some(observation);
        self.governor.record_success();
    }

    pub fn record_failure(&mut self, at: DateTime<Utc>) -> GovernorState {
        self.last_check_time = Some(at);
        self.governor.record_failure(at)
    }

    pub fn consecutive_failure_count(&self) -> u32 {
        self.governor.consecutive_failures()
    }

    pub fn last_failure_time(&self) -> Option<DateTime<Utc>> {
        self.governor.last_failure()
    }

    /// Never earlier than the previous check, even if the wall clock stepped back.
    pub fn monotonic_now(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.last_check_time {
            Some(last) if last > now => last,
            _ => now,
        }
    }
}

/// Governor fields as exposed by the status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GovernorStatus {
    pub state: &'static str,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl GovernorStatus {
    pub fn from_governor(governor: &FailureGovernor, now: DateTime<Utc>) -> Self {
        let state = governor.state(now);
        Self {
            state: state.as_str(),
            consecutive_failures: governor.consecutive_failures(),
            cooldown_until: match state {
                GovernorState::Cooldown { until } => Some(until),
                _ => None,
            },
        }
    }
}

/// Answer to "current status".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub last_check: Option<DateTime<Utc>>,
    pub has_order_button: bool,
    pub has_availability: bool,
    pub check_in_progress: bool,
    pub monitoring_active: bool,
    pub governor: GovernorStatus,
}
