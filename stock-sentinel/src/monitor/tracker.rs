//! Diff a new observation against the previous snapshot.

use chrono::{DateTime, Utc};

use super::events::ChangeEvent;
use crate::domain::Classification;

/// What the tracker needs to know about the previous observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub classification: Classification,
    pub content_fingerprint: String,
}

impl From<&crate::domain::Snapshot> for Observation {
    fn from(snapshot: &crate::domain::Snapshot) -> Self {
        Self {
            classification: snapshot.classification,
            content_fingerprint: snapshot.content_fingerprint.clone(),
        }
    }
}

/// Result of comparing one observation with its baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// No previous observation; nothing is emitted.
    Baseline,
    Events(Vec<ChangeEvent>),
}

impl Transition {
    pub fn events(&self) -> &[ChangeEvent] {
        match self {
            Transition::Baseline => &[],
            Transition::Events(events) => events,
        }
    }

    pub fn into_events(self) -> Vec<ChangeEvent> {
        match self {
            Transition::Baseline => Vec::new(),
            Transition::Events(events) => events,
        }
    }

    pub fn is_baseline(&self) -> bool {
        matches!(self, Transition::Baseline)
    }
}

/// Stateless diff between consecutive observations.
///
/// Only gains raise signal events. A lost signal is recorded in the snapshot
/// and shows up in the next comparison, but emits nothing on its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct StateTracker;

impl StateTracker {
    /// Events are ordered by display precedence: order gained, availability
    /// gained, content changed. `no_change` is emitted alone.
    pub fn evaluate(
        &self,
        previous: Option<&Observation>,
        current: &Observation,
        timestamp: DateTime<Utc>,
    ) -> Transition {
        let Some(previous) = previous else {
            return Transition::Baseline;
        };

        let classification = current.classification;
        let mut events = Vec::new();

        if classification.gained_order(&previous.classification) {
            events.push(ChangeEvent::order_signal_gained(classification, timestamp));
        }
        if classification.gained_availability(&previous.classification) {
            events.push(ChangeEvent::availability_signal_gained(
                classification,
                timestamp,
            ));
        }
        if current.content_fingerprint != previous.content_fingerprint {
            events.push(ChangeEvent::content_changed(classification, timestamp));
        }
        if events.is_empty() {
            events.push(ChangeEvent::no_change(classification, timestamp));
        }

        Transition::Events(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::events::ChangeKind;

    fn obs(order: bool, available: bool, fp: &str) -> Observation {
        Observation {
            classification: Classification::new(order, available),
            content_fingerprint: fp.to_string(),
        }
    }

    fn kinds(t: &Transition) -> Vec<ChangeKind> {
        t.events().iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_first_observation_is_baseline() {
        let t = StateTracker.evaluate(None, &obs(true, true, "a"), Utc::now());
        assert!(t.is_baseline());
        assert!(t.events().is_empty());
    }

    #[test]
    fn test_identical_observation_emits_single_no_change() {
        let prev = obs(false, true, "a");
        let t = StateTracker.evaluate(Some(&prev), &obs(false, true, "a"), Utc::now());
        assert_eq!(kinds(&t), vec![ChangeKind::NoChange]);
        assert_eq!(t.events()[0].has_availability, Some(true));
    }

    #[test]
    fn test_content_drift_without_signal_change() {
        let prev = obs(false, false, "a");
        let t = StateTracker.evaluate(Some(&prev), &obs(false, false, "b"), Utc::now());
        assert_eq!(kinds(&t), vec![ChangeKind::ContentChanged]);
    }

    #[test]
    fn test_all_gains_in_precedence_order() {
        let prev = obs(false, false, "a");
        let t = StateTracker.evaluate(Some(&prev), &obs(true, true, "b"), Utc::now());
        assert_eq!(
            kinds(&t),
            vec![
                ChangeKind::OrderSignalGained,
                ChangeKind::AvailabilitySignalGained,
                ChangeKind::ContentChanged,
            ]
        );
    }

    #[test]
    fn test_signal_loss_is_silent() {
        let prev = obs(true, true, "a");
        let t = StateTracker.evaluate(Some(&prev), &obs(false, false, "a"), Utc::now());
        assert_eq!(kinds(&t), vec![ChangeKind::NoChange]);
    }

    #[test]
    fn test_gain_with_same_fingerprint() {
        // Possible when the baseline came from an in-memory fallback.
        let prev = obs(false, false, "a");
        let t = StateTracker.evaluate(Some(&prev), &obs(true, false, "a"), Utc::now());
        assert_eq!(kinds(&t), vec![ChangeKind::OrderSignalGained]);
    }
}
