//! Change events and their fanout.
//!
//! Events are transient: they are broadcast to whoever is subscribed at the
//! time and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::Classification;

/// Kinds of outward notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    ContentChanged,
    OrderSignalGained,
    AvailabilitySignalGained,
    NoChange,
    ConnectionError,
    StaleFallback,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::ContentChanged => "content_changed",
            ChangeKind::OrderSignalGained => "order_signal_gained",
            ChangeKind::AvailabilitySignalGained => "availability_signal_gained",
            ChangeKind::NoChange => "no_change",
            ChangeKind::ConnectionError => "connection_error",
            ChangeKind::StaleFallback => "stale_fallback",
        }
    }

    /// Display precedence; lower is more important.
    pub fn precedence(&self) -> u8 {
        match self {
            ChangeKind::OrderSignalGained => 0,
            ChangeKind::AvailabilitySignalGained => 1,
            ChangeKind::ContentChanged => 2,
            ChangeKind::ConnectionError => 3,
            ChangeKind::StaleFallback => 4,
            ChangeKind::NoChange => 5,
        }
    }

    /// Whether the event is worth alerting a human about.
    pub fn is_alert(&self) -> bool {
        matches!(
            self,
            ChangeKind::OrderSignalGained | ChangeKind::AvailabilitySignalGained
        )
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outward notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_order_button: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_availability: Option<bool>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp,
            has_order_button: None,
            has_availability: None,
        }
    }

    /// Attach both classification fields.
    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.has_order_button = Some(classification.has_order_signal);
        self.has_availability = Some(classification.has_availability_signal);
        self
    }

    pub fn content_changed(classification: Classification, timestamp: DateTime<Utc>) -> Self {
        Self::new(
            ChangeKind::ContentChanged,
            "Page content changed",
            timestamp,
        )
        .with_classification(classification)
    }

    pub fn order_signal_gained(classification: Classification, timestamp: DateTime<Utc>) -> Self {
        Self::new(
            ChangeKind::OrderSignalGained,
            "Order button detected! The item can be ordered now",
            timestamp,
        )
        .with_classification(classification)
    }

    pub fn availability_signal_gained(
        classification: Classification,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(
            ChangeKind::AvailabilitySignalGained,
            "Availability detected! The item appears to be in stock",
            timestamp,
        )
        .with_classification(classification)
    }

    pub fn no_change(classification: Classification, timestamp: DateTime<Utc>) -> Self {
        Self::new(ChangeKind::NoChange, "No change detected", timestamp)
            .with_classification(classification)
    }

    pub fn connection_error(cause: &str, timestamp: DateTime<Utc>) -> Self {
        Self::new(
            ChangeKind::ConnectionError,
            format!("Could not reach the page: {cause}"),
            timestamp,
        )
    }

    /// Last known state after a failed check.
    pub fn stale_fallback(
        classification: Classification,
        observed_at: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let message = match observed_at {
            Some(at) => format!("Showing last known state from {}", at.to_rfc3339()),
            None => "Showing last known state".to_string(),
        };
        Self::new(ChangeKind::StaleFallback, message, timestamp).with_classification(classification)
    }
}

/// Join event messages, most important first.
pub fn summarize(events: &[ChangeEvent]) -> String {
    let mut ordered: Vec<&ChangeEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.kind.precedence());
    ordered
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Fanout of change events to every current subscriber.
///
/// Publishing never blocks. Slow subscribers lose the oldest events and
/// learn how many through `RecvError::Lagged`.
#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Notifier {
    /// Create a new notifier with default capacity (256).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Deliver events in order. Returns the number of receivers reached.
    pub fn publish_all(&self, events: &[ChangeEvent]) -> usize {
        let mut reached = 0;
        for event in events {
            match self.sender.send(event.clone()) {
                Ok(n) => reached = n,
                Err(_) => trace!(kind = %event.kind, "No subscribers for change event"),
            }
        }
        reached
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_event_wire_shape() {
        let event = ChangeEvent::order_signal_gained(Classification::new(true, false), now());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "order_signal_gained");
        assert_eq!(json["has_order_button"], true);
        assert_eq!(json["has_availability"], false);

        let json = serde_json::to_value(ChangeEvent::connection_error("timed out", now())).unwrap();
        assert_eq!(json["kind"], "connection_error");
        assert!(json.get("has_order_button").is_none());
    }

    #[test]
    fn test_summary_puts_order_first() {
        let c = Classification::new(true, true);
        let events = vec![
            ChangeEvent::content_changed(c, now()),
            ChangeEvent::availability_signal_gained(c, now()),
            ChangeEvent::order_signal_gained(c, now()),
        ];
        let summary = summarize(&events);
        assert!(summary.starts_with("Order button detected"));
        assert_eq!(summary.matches(" | ").count(), 2);
        assert!(summary.ends_with("Page content changed"));
    }

    #[tokio::test]
    async fn test_notifier_delivers_in_order() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let c = Classification::NEUTRAL;
        let events = vec![
            ChangeEvent::content_changed(c, now()),
            ChangeEvent::no_change(c, now()),
        ];

        assert_eq!(notifier.publish_all(&events), 1);
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::ContentChanged);
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::NoChange);
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let notifier = Notifier::default();
        let events = vec![ChangeEvent::no_change(Classification::NEUTRAL, now())];
        assert_eq!(notifier.publish_all(&events), 0);
        assert_eq!(notifier.subscriber_count(), 0);
    }
}
