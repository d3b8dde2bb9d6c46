//! Page monitor service.
//!
//! The PageMonitor runs the fetch -> classify -> diff -> persist -> notify
//! pipeline. Every trigger (scheduled, manual, fast-retry) goes through one
//! check lock, so at most one pipeline run is in flight and runs are
//! persisted in completion order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::config::MonitorConfig;
use crate::database::repositories::SnapshotRepository;
use crate::domain::{Classification, NewSnapshot, Snapshot};

use super::classifier::Classifier;
use super::clock::{Clock, SystemClock};
use super::events::{ChangeEvent, ChangeKind, Notifier, summarize};
use super::governor::{CooldownActive, FailureGovernor, GovernorState};
use super::source::{ContentSource, FetchFailure, FetchedContent};
use super::state::{GovernorStatus, MonitorState, StatusSnapshot};
use super::tracker::{Observation, StateTracker};

/// Pipeline settings taken from [`MonitorConfig`].
#[derive(Debug, Clone)]
pub struct CheckSettings {
    pub endpoints: Vec<String>,
    pub timeout_ladder: Vec<Duration>,
    pub retain_raw_content: bool,
    pub max_consecutive_failures: u32,
    pub cooldown: Duration,
}

impl From<&MonitorConfig> for CheckSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            endpoints: config.endpoints.clone(),
            timeout_ladder: config.timeout_ladder.clone(),
            retain_raw_content: config.retain_raw_content,
            max_consecutive_failures: config.max_consecutive_failures,
            cooldown: config.cooldown,
        }
    }
}

/// What started a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckTrigger {
    Scheduled,
    Manual,
    FastRetry,
}

impl std::fmt::Display for CheckTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckTrigger::Scheduled => write!(f, "scheduled"),
            CheckTrigger::Manual => write!(f, "manual"),
            CheckTrigger::FastRetry => write!(f, "fast_retry"),
        }
    }
}

/// Last known classification, served when a check fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastKnown {
    pub has_order_button: bool,
    pub has_availability: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl LastKnown {
    pub fn classification(&self) -> Classification {
        Classification::new(self.has_order_button, self.has_availability)
    }
}

/// A check that fetched and classified the page.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub trigger: CheckTrigger,
    pub checked_at: DateTime<Utc>,
    pub classification: Classification,
    pub endpoint: String,
    pub attempts: usize,
    /// The stored snapshot, absent when persistence failed.
    pub snapshot: Option<Snapshot>,
    pub persistence_error: Option<String>,
    /// True when this was the first observation.
    pub baseline: bool,
    pub events: Vec<ChangeEvent>,
}

impl CheckReport {
    pub fn persisted(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn summary(&self) -> String {
        if self.baseline {
            format!("Baseline recorded ({})", self.classification)
        } else {
            summarize(&self.events)
        }
    }
}

/// A check whose fetch failed.
#[derive(Debug, Clone)]
pub struct FailedCheck {
    pub trigger: CheckTrigger,
    pub failed_at: DateTime<Utc>,
    pub error: FetchFailure,
    pub governor: GovernorState,
    pub last_known: Option<LastKnown>,
    pub events: Vec<ChangeEvent>,
}

/// Definite result of every check request.
#[derive(Debug, Clone)]
pub enum CheckOutcome {
    Completed(CheckReport),
    /// Refused by the failure governor; nothing was fetched.
    CooldownActive { until: DateTime<Utc> },
    Failed(FailedCheck),
}

impl CheckOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            CheckOutcome::Completed(_) => "completed",
            CheckOutcome::CooldownActive { .. } => "cooldown_active",
            CheckOutcome::Failed(_) => "failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CheckOutcome::Completed(_))
    }

    pub fn events(&self) -> &[ChangeEvent] {
        match self {
            CheckOutcome::Completed(report) => &report.events,
            CheckOutcome::CooldownActive { .. } => &[],
            CheckOutcome::Failed(failed) => &failed.events,
        }
    }
}

/// Status fields readers see without touching the check lock.
#[derive(Debug, Clone)]
struct PublishedStatus {
    last_check: Option<DateTime<Utc>>,
    classification: Classification,
    governor: FailureGovernor,
}

impl From<&MonitorState> for PublishedStatus {
    fn from(state: &MonitorState) -> Self {
        Self {
            last_check: state.last_check_time,
            classification: state.last_classification,
            governor: state.governor.clone(),
        }
    }
}

/// Clears the in-progress flag however the pipeline exits.
struct InProgressGuard<'a>(&'a AtomicBool);

impl<'a> InProgressGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The page monitor.
pub struct PageMonitor {
    source: Arc<dyn ContentSource>,
    classifier: Classifier,
    store: Arc<dyn SnapshotRepository>,
    notifier: Notifier,
    tracker: StateTracker,
    clock: Arc<dyn Clock>,
    settings: CheckSettings,
    /// The check lock. Holding the guard is the only way to mutate state.
    state: Mutex<MonitorState>,
    published: RwLock<PublishedStatus>,
    check_in_progress: AtomicBool,
    monitoring_active: AtomicBool,
}

impl PageMonitor {
    pub fn new(
        source: Arc<dyn ContentSource>,
        classifier: Classifier,
        store: Arc<dyn SnapshotRepository>,
        notifier: Notifier,
        settings: CheckSettings,
    ) -> Self {
        let state = MonitorState::new(FailureGovernor::new(
            settings.max_consecutive_failures,
            settings.cooldown,
        ));
        let published = RwLock::new(PublishedStatus::from(&state));

        Self {
            source,
            classifier,
            store,
            notifier,
            tracker: StateTracker,
            clock: Arc::new(SystemClock),
            settings,
            state: Mutex::new(state),
            published,
            check_in_progress: AtomicBool::new(false),
            monitoring_active: AtomicBool::new(false),
        }
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Restore the last classification from the newest stored snapshot.
    pub async fn rehydrate(&self) -> Result<Option<Snapshot>> {
        let latest = self.store.latest(1).await?.into_iter().next();
        if let Some(snapshot) = &latest {
            let mut state = self.state.lock().await;
            state.rehydrate(snapshot);
            self.publish_status(&state);
            info!(
                snapshot_id = snapshot.id,
                classification = %snapshot.classification,
                captured_at = %snapshot.timestamp,
                "Monitor state restored from history"
            );
        } else {
            info!("No snapshot history, first check will record a baseline");
        }
        Ok(latest)
    }

    pub async fn run_scheduled_check(&self) -> CheckOutcome {
        let mut state = self.state.lock().await;
        self.run_locked(&mut state, CheckTrigger::Scheduled).await
    }

    /// Blocks behind any check already in flight, then runs normally.
    pub async fn run_manual_check(&self) -> CheckOutcome {
        let mut state = self.state.lock().await;
        self.run_locked(&mut state, CheckTrigger::Manual).await
    }

    /// Runs only while the governor is not healthy. Returns `None` when skipped.
    pub async fn run_fast_retry_check(&self) -> Option<CheckOutcome> {
        let mut state = self.state.lock().await;
        if state.governor.state(self.clock.now()).is_healthy() {
            debug!("Fast retry skipped, monitor is healthy");
            return None;
        }
        Some(self.run_locked(&mut state, CheckTrigger::FastRetry).await)
    }

    /// Count a check that died outside the pipeline as a failed fetch.
    pub async fn record_aborted_check(&self, trigger: CheckTrigger, cause: &str) -> CheckOutcome {
        let mut state = self.state.lock().await;
        let failed = self
            .handle_failure(&mut state, FetchFailure::new(0, cause), trigger)
            .await;
        self.publish_status(&state);
        CheckOutcome::Failed(failed)
    }

    async fn run_locked(&self, state: &mut MonitorState, trigger: CheckTrigger) -> CheckOutcome {
        if let Err(CooldownActive { until }) = state.governor.permit(self.clock.now()) {
            info!(
                trigger = %trigger,
                cooldown_until = %until,
                "Check skipped, cooldown active"
            );
            return CheckOutcome::CooldownActive { until };
        }

        let _in_progress = InProgressGuard::enter(&self.check_in_progress);
        debug!(trigger = %trigger, source = self.source.name(), "Starting check");

        let outcome = match self.fetch_isolated().await {
            Ok(content) => {
                CheckOutcome::Completed(self.handle_fetched(state, content, trigger).await)
            }
            Err(failure) => CheckOutcome::Failed(self.handle_failure(state, failure, trigger).await),
        };

        self.publish_status(state);
        outcome
    }

    /// Run the fetch in its own task so a panicking source becomes a failed check.
    async fn fetch_isolated(&self) -> std::result::Result<FetchedContent, FetchFailure> {
        let source = self.source.clone();
        let endpoints = self.settings.endpoints.clone();
        let ladder = self.settings.timeout_ladder.clone();

        match tokio::spawn(async move { source.fetch(&endpoints, &ladder).await }).await {
            Ok(result) => result,
            Err(join_err) => {
                if join_err.is_panic() {
                    error!(error = ?join_err, source = self.source.name(), "Fetch task panicked");
                    Err(FetchFailure::new(0, "fetch task panicked"))
                } else {
                    warn!(error = ?join_err, "Fetch task cancelled");
                    Err(FetchFailure::new(0, "fetch task cancelled"))
                }
            }
        }
    }

    async fn handle_fetched(
        &self,
        state: &mut MonitorState,
        content: FetchedContent,
        trigger: CheckTrigger,
    ) -> CheckReport {
        let checked_at = state.monotonic_now(self.clock.now());

        let report = self.classifier.classify_detailed(&content.text);
        let classification = report.classification;
        debug!(
            endpoint = %content.endpoint,
            content_length = content.text.len(),
            matched_order = ?report.matched_order,
            matched_availability = ?report.matched_availability,
            matched_negative = ?report.matched_negative,
            "Page classified as {}",
            classification
        );

        let new_snapshot = NewSnapshot::from_content(
            &content.text,
            classification,
            checked_at,
            self.settings.retain_raw_content,
        )
        .with_source_endpoint(content.endpoint.clone());

        let current = Observation {
            classification,
            content_fingerprint: new_snapshot.content_fingerprint.clone(),
        };

        let previous = match self.store.most_recent_before(checked_at).await {
            Ok(snapshot) => snapshot
                .as_ref()
                .map(Observation::from)
                .or_else(|| state.last_observation.clone()),
            Err(e) => {
                warn!(error = %e, "Could not read baseline snapshot, using in-memory state");
                state.last_observation.clone()
            }
        };

        let transition = self
            .tracker
            .evaluate(previous.as_ref(), &current, checked_at);
        let baseline = transition.is_baseline();
        let events = transition.into_events();

        let (snapshot, persistence_error) = match self.store.append(new_snapshot).await {
            Ok(snapshot) => {
                debug!(snapshot_id = snapshot.id, "Snapshot stored");
                (Some(snapshot), None)
            }
            Err(e) => {
                error!(error = %e, "Failed to store snapshot, continuing with in-memory result");
                (None, Some(e.to_string()))
            }
        };

        let recorded_at = snapshot.as_ref().map_or(checked_at, |s| s.timestamp);
        state.record_success(current, recorded_at);

        self.notifier.publish_all(&events);

        let report = CheckReport {
            trigger,
            checked_at: recorded_at,
            classification,
            endpoint: content.endpoint,
            attempts: content.attempts,
            snapshot,
            persistence_error,
            baseline,
            events,
        };

        if report.events.iter().any(|e| e.kind.is_alert()) {
            warn!(trigger = %trigger, summary = %report.summary(), "Signal gained");
        } else if report.events.iter().all(|e| e.kind == ChangeKind::NoChange) {
            debug!(trigger = %trigger, summary = %report.summary(), "Check completed");
        } else {
            info!(trigger = %trigger, summary = %report.summary(), "Check completed");
        }

        report
    }

    async fn handle_failure(
        &self,
        state: &mut MonitorState,
        failure: FetchFailure,
        trigger: CheckTrigger,
    ) -> FailedCheck {
        let failed_at = state.monotonic_now(self.clock.now());
        let governor = state.record_failure(failed_at);

        warn!(
            trigger = %trigger,
            attempts = failure.attempts,
            cause = %failure.last_cause,
            consecutive_failures = state.consecutive_failure_count(),
            governor = %governor,
            "Check failed"
        );

        let last_known = self.last_known(state).await;

        let mut events = vec![ChangeEvent::connection_error(&failure.last_cause, failed_at)];
        if let Some(known) = &last_known {
            events.push(ChangeEvent::stale_fallback(
                known.classification(),
                known.observed_at,
                failed_at,
            ));
        }
        self.notifier.publish_all(&events);

        FailedCheck {
            trigger,
            failed_at,
            error: failure,
            governor,
            last_known,
            events,
        }
    }

    /// Newest stored classification, or the in-memory one if storage is unavailable.
    async fn last_known(&self, state: &MonitorState) -> Option<LastKnown> {
        match self.store.latest(1).await {
            Ok(rows) => {
                if let Some(snapshot) = rows.into_iter().next() {
                    return Some(LastKnown {
                        has_order_button: snapshot.classification.has_order_signal,
                        has_availability: snapshot.classification.has_availability_signal,
                        observed_at: Some(snapshot.timestamp),
                    });
                }
            }
            Err(e) => warn!(error = %e, "Could not read last known snapshot"),
        }

        state.last_observation.as_ref().map(|obs| LastKnown {
            has_order_button: obs.classification.has_order_signal,
            has_availability: obs.classification.has_availability_signal,
            observed_at: None,
        })
    }

    fn publish_status(&self, state: &MonitorState) {
        *self.published.write() = PublishedStatus::from(state);
    }

    /// Current status, read without waiting for a running check.
    pub fn status(&self) -> StatusSnapshot {
        let published = self.published.read();
        StatusSnapshot {
            last_check: published.last_check,
            has_order_button: published.classification.has_order_signal,
            has_availability: published.classification.has_availability_signal,
            check_in_progress: self.check_in_progress.load(Ordering::Acquire),
            monitoring_active: self.monitoring_active.load(Ordering::Acquire),
            governor: GovernorStatus::from_governor(&published.governor, self.clock.now()),
        }
    }

    /// Most recent `limit` snapshots, newest first.
    pub async fn history(&self, limit: i64) -> Result<Vec<Snapshot>> {
        self.store.latest(limit).await
    }

    /// Retention maintenance. Never called by the check pipeline.
    pub async fn prune_history(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.store.prune_older_than(cutoff).await
    }

    /// Subscribe to change events, together with the status at subscription time.
    pub fn subscribe(&self) -> (StatusSnapshot, broadcast::Receiver<ChangeEvent>) {
        let receiver = self.notifier.subscribe();
        (self.status(), receiver)
    }

    pub fn set_monitoring_active(&self, active: bool) {
        self.monitoring_active.store(active, Ordering::Release);
    }

    pub fn is_monitoring_active(&self) -> bool {
        self.monitoring_active.load(Ordering::Acquire)
    }

    pub fn is_check_in_progress(&self) -> bool {
        self.check_in_progress.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LexiconConfig;
    use crate::database;
    use crate::database::repositories::SqlxSnapshotRepository;
    use crate::monitor::clock::ManualClock;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Replays a fixed script of fetch results.
    struct ScriptedSource {
        script: parking_lot::Mutex<VecDeque<std::result::Result<String, String>>>,
        calls: AtomicUsize,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        panic_on_call: Option<usize>,
    }

    impl ScriptedSource {
        fn new(script: Vec<std::result::Result<&str, &str>>) -> Self {
            Self {
                script: parking_lot::Mutex::new(
                    script
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                panic_on_call: None,
            }
        }

        /// Panic instead of answering the given (zero-based) call.
        fn panicking_on(mut self, call: usize) -> Self {
            self.panic_on_call = Some(call);
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl ContentSource for ScriptedSource {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch(
            &self,
            candidates: &[String],
            _timeouts: &[Duration],
        ) -> std::result::Result<FetchedContent, FetchFailure> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_call == Some(call) {
                panic!("scripted source blew up");
            }
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let next = self.script.lock().pop_front();
            match next {
                Some(Ok(text)) => Ok(FetchedContent {
                    text,
                    endpoint: candidates.first().cloned().unwrap_or_default(),
                    attempts: 1,
                }),
                Some(Err(cause)) => Err(FetchFailure::new(1, cause)),
                None => Err(FetchFailure::new(1, "script exhausted")),
            }
        }
    }

    /// A store whose writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl SnapshotRepository for BrokenStore {
        async fn append(&self, _snapshot: NewSnapshot) -> Result<Snapshot> {
            Err(crate::Error::Database("disk full".into()))
        }
        async fn latest(&self, _limit: i64) -> Result<Vec<Snapshot>> {
            Err(crate::Error::Database("disk full".into()))
        }
        async fn most_recent_before(&self, _now: DateTime<Utc>) -> Result<Option<Snapshot>> {
            Err(crate::Error::Database("disk full".into()))
        }
        async fn find(&self, _id: i64) -> Result<Option<Snapshot>> {
            Ok(None)
        }
        async fn count(&self) -> Result<i64> {
            Ok(0)
        }
        async fn prune_older_than(&self, _cutoff: DateTime<Utc>) -> Result<u64> {
            Ok(0)
        }
    }

    fn settings() -> CheckSettings {
        CheckSettings {
            endpoints: vec!["https://shop.example/item".into()],
            timeout_ladder: vec![Duration::from_secs(10)],
            retain_raw_content: true,
            max_consecutive_failures: 3,
            cooldown: Duration::from_secs(15 * 60),
        }
    }

    async fn monitor_with(
        source: Arc<ScriptedSource>,
        store: Arc<dyn SnapshotRepository>,
    ) -> PageMonitor {
        PageMonitor::new(
            source,
            Classifier::new(&LexiconConfig::default()),
            store,
            Notifier::new(),
            settings(),
        )
    }

    async fn sqlite_store() -> Arc<dyn SnapshotRepository> {
        let pool = database::init_in_memory().await.unwrap();
        Arc::new(SqlxSnapshotRepository::new(pool))
    }

    fn kinds(outcome: &CheckOutcome) -> Vec<ChangeKind> {
        outcome.events().iter().map(|e| e.kind).collect()
    }

    #[tokio::test]
    async fn test_baseline_then_no_change() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok("<p>Nothing yet</p>"),
            Ok("<p>Nothing yet</p>"),
        ]));
        let monitor = monitor_with(source, sqlite_store().await).await;

        let first = monitor.run_scheduled_check().await;
        let CheckOutcome::Completed(report) = &first else {
            panic!("expected completed check, got {}", first.kind());
        };
        assert!(report.baseline);
        assert!(report.persisted());
        assert!(report.events.is_empty());

        let second = monitor.run_scheduled_check().await;
        assert_eq!(kinds(&second), vec![ChangeKind::NoChange]);
    }

    #[tokio::test]
    async fn test_failure_emits_connection_error_and_stale_fallback() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok("<button>Buy now</button>"),
            Err("connection refused"),
        ]));
        let monitor = monitor_with(source, sqlite_store().await).await;
        let mut rx = monitor.notifier().subscribe();

        monitor.run_scheduled_check().await;
        let outcome = monitor.run_manual_check().await;

        let CheckOutcome::Failed(failed) = &outcome else {
            panic!("expected failure, got {}", outcome.kind());
        };
        assert_eq!(
            failed.governor,
            GovernorState::Degraded {
                consecutive_failures: 1
            }
        );
        let known = failed.last_known.as_ref().unwrap();
        assert!(known.has_order_button);
        assert!(known.observed_at.is_some());

        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::ConnectionError);
        let fallback = rx.recv().await.unwrap();
        assert_eq!(fallback.kind, ChangeKind::StaleFallback);
        assert_eq!(fallback.has_order_button, Some(true));

        assert_eq!(monitor.status().governor.state, "degraded");
    }

    #[tokio::test]
    async fn test_failure_without_history_has_no_fallback() {
        let source = Arc::new(ScriptedSource::new(vec![Err("timed out")]));
        let monitor = monitor_with(source, sqlite_store().await).await;

        let outcome = monitor.run_scheduled_check().await;
        assert_eq!(kinds(&outcome), vec![ChangeKind::ConnectionError]);
    }

    #[tokio::test]
    async fn test_persistence_failure_still_notifies() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok("<p>Waitlist</p>"),
            Ok("<button>Order now</button>"),
        ]));
        let monitor = monitor_with(source, Arc::new(BrokenStore)).await;

        let first = monitor.run_scheduled_check().await;
        let CheckOutcome::Completed(report) = &first else {
            panic!("expected completed check");
        };
        assert!(!report.persisted());
        assert!(report.persistence_error.is_some());
        assert!(report.baseline);

        // Baseline came from memory, so the gain is still detected.
        let second = monitor.run_scheduled_check().await;
        assert_eq!(
            kinds(&second),
            vec![ChangeKind::OrderSignalGained, ChangeKind::ContentChanged]
        );
        assert!(monitor.status().has_order_button);
    }

    #[tokio::test]
    async fn test_fast_retry_only_runs_when_unhealthy() {
        let source = Arc::new(ScriptedSource::new(vec![Err("refused"), Ok("<p>x</p>")]));
        let monitor = monitor_with(source.clone(), sqlite_store().await).await;

        assert!(monitor.run_fast_retry_check().await.is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        monitor.run_scheduled_check().await;
        let retried = monitor.run_fast_retry_check().await.unwrap();
        assert!(retried.is_success());

        // Healthy again, so fast retry goes quiet.
        assert!(monitor.run_fast_retry_check().await.is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cooldown_blocks_fetch_until_expiry() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let source = Arc::new(ScriptedSource::new(vec![
            Err("a"),
            Err("b"),
            Err("c"),
            Ok("<p>back</p>"),
        ]));
        let monitor = monitor_with(source.clone(), sqlite_store().await)
            .await
            .with_clock(clock.clone());

        for _ in 0..3 {
            monitor.run_scheduled_check().await;
            clock.advance(chrono::Duration::minutes(1));
        }
        let blocked = monitor.run_manual_check().await;
        assert!(matches!(blocked, CheckOutcome::CooldownActive { .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(monitor.status().governor.state, "cooldown");

        clock.advance(chrono::Duration::minutes(15));
        assert!(monitor.run_manual_check().await.is_success());
        assert_eq!(monitor.status().governor.state, "healthy");
    }

    #[tokio::test]
    async fn test_checks_never_overlap() {
        let source = Arc::new(
            ScriptedSource::new(vec![Ok("<p>a</p>"), Ok("<p>b</p>"), Ok("<p>c</p>")])
                .with_delay(Duration::from_millis(30)),
        );
        let monitor = monitor_with(source.clone(), sqlite_store().await).await;

        let (a, b, c) = tokio::join!(
            monitor.run_scheduled_check(),
            monitor.run_manual_check(),
            monitor.run_manual_check(),
        );
        assert!(a.is_success() && b.is_success() && c.is_success());
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(!monitor.is_check_in_progress());
    }

    #[tokio::test]
    async fn test_rehydrate_and_subscribe() {
        let store = sqlite_store().await;
        let snapshot = NewSnapshot::from_content(
            "<p>In stock</p>",
            Classification::new(false, true),
            Utc::now(),
            false,
        );
        store.append(snapshot).await.unwrap();

        let source = Arc::new(ScriptedSource::new(vec![Ok("<p>In stock</p>")]));
        let monitor = monitor_with(source, store).await;
        let restored = monitor.rehydrate().await.unwrap();
        assert!(restored.is_some());

        let (status, mut rx) = monitor.subscribe();
        assert!(status.has_availability);
        assert!(status.last_check.is_some());
        assert!(!status.monitoring_active);

        // Same content as the stored snapshot: not a baseline.
        let outcome = monitor.run_manual_check().await;
        assert_eq!(kinds(&outcome), vec![ChangeKind::NoChange]);
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::NoChange);
    }

    #[tokio::test]
    async fn test_panicking_source_becomes_connection_error() {
        let source = Arc::new(
            ScriptedSource::new(vec![Ok("<p>In stock</p>")]).panicking_on(0),
        );
        let monitor = monitor_with(source.clone(), sqlite_store().await).await;
        let mut rx = monitor.notifier().subscribe();

        let outcome = monitor.run_scheduled_check().await;
        let CheckOutcome::Failed(failed) = &outcome else {
            panic!("expected failure, got {}", outcome.kind());
        };
        assert_eq!(failed.error.last_cause, "fetch task panicked");
        assert_eq!(
            failed.governor,
            GovernorState::Degraded {
                consecutive_failures: 1
            }
        );
        assert_eq!(kinds(&outcome), vec![ChangeKind::ConnectionError]);
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::ConnectionError);
        assert!(!monitor.is_check_in_progress());

        // The lock is released and the next check runs normally.
        let next = monitor.run_manual_check().await;
        assert!(next.is_success());
        assert_eq!(monitor.status().governor.consecutive_failures, 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
