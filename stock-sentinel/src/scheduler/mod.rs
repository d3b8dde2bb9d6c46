//! Timers driving the page monitor.
//!
//! One task runs a `select!` loop over the cancellation token, the main poll
//! interval, the fast-retry interval and (optionally) a daily retention tick.
//! The first scheduled check fires immediately.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::monitor::{CheckOutcome, CheckTrigger, PageMonitor};

const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Timer settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub fast_retry_interval: Duration,
    /// Delete snapshots older than this, if set.
    pub retention: Option<Duration>,
}

impl From<&MonitorConfig> for SchedulerConfig {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            fast_retry_interval: config.fast_retry_interval,
            retention: config
                .retention_days
                .map(|days| Duration::from_secs(u64::from(days) * 24 * 60 * 60)),
        }
    }
}

/// Handle to the running scheduler task.
pub struct MonitorScheduler {
    monitor: Arc<PageMonitor>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Marks the monitor inactive when the loop exits, including on panic.
struct ActiveGuard(Arc<PageMonitor>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.set_monitoring_active(false);
    }
}

impl MonitorScheduler {
    /// Spawn the scheduler loop. It stops when `cancel` fires.
    pub fn start(
        monitor: Arc<PageMonitor>,
        config: SchedulerConfig,
        cancel: CancellationToken,
    ) -> Self {
        monitor.set_monitoring_active(true);
        let task = tokio::spawn(run_loop(monitor.clone(), config, cancel.clone()));
        Self {
            monitor,
            cancel,
            task,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished() && self.monitor.is_monitoring_active()
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }
}

fn interval(period: Duration, skip_first: bool) -> Interval {
    let start = if skip_first {
        tokio::time::Instant::now() + period
    } else {
        tokio::time::Instant::now()
    };
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn run_loop(monitor: Arc<PageMonitor>, config: SchedulerConfig, cancel: CancellationToken) {
    let _active = ActiveGuard(monitor.clone());

    info!(
        poll_interval_secs = config.poll_interval.as_secs(),
        fast_retry_interval_secs = config.fast_retry_interval.as_secs(),
        "Monitor scheduler started"
    );

    let mut main_timer = interval(config.poll_interval, false);
    let mut fast_retry_timer = interval(config.fast_retry_interval, true);
    let mut retention_timer = interval(RETENTION_SWEEP_INTERVAL, false);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!("Monitor scheduler shutting down");
                break;
            }

            _ = main_timer.tick() => {
                let task = monitor.clone();
                let joined = tokio::spawn(async move { Some(task.run_scheduled_check().await) }).await;
                settle(&monitor, CheckTrigger::Scheduled, joined).await;
            }

            _ = fast_retry_timer.tick() => {
                let task = monitor.clone();
                let joined = tokio::spawn(async move { task.run_fast_retry_check().await }).await;
                settle(&monitor, CheckTrigger::FastRetry, joined).await;
            }

            _ = retention_timer.tick(), if config.retention.is_some() => {
                if let Some(retention) = config.retention {
                    sweep_history(&monitor, retention).await;
                }
            }
        }
    }

    debug!("Monitor scheduler stopped");
}

/// Log a finished check task. A panicked check is recorded as a failure so the
/// governor and subscribers see it, and the loop keeps running.
async fn settle(
    monitor: &PageMonitor,
    trigger: CheckTrigger,
    joined: Result<Option<CheckOutcome>, JoinError>,
) {
    match joined {
        Ok(Some(outcome)) => log_outcome(&outcome),
        Ok(None) => debug!("Fast retry tick skipped"),
        Err(join_err) => {
            if join_err.is_panic() {
                error!(trigger = %trigger, error = ?join_err, "Check task panicked");
                log_outcome(&monitor.record_aborted_check(trigger, "check task panicked").await);
            } else {
                warn!(trigger = %trigger, error = ?join_err, "Check task cancelled");
            }
        }
    }
}

fn log_outcome(outcome: &CheckOutcome) {
    match outcome {
        CheckOutcome::Completed(report) => {
            debug!(trigger = %report.trigger, events = report.events.len(), "Timer check completed")
        }
        CheckOutcome::CooldownActive { until } => {
            debug!(cooldown_until = %until, "Timer check skipped")
        }
        CheckOutcome::Failed(failed) => {
            debug!(trigger = %failed.trigger, cause = %failed.error.last_cause, "Timer check failed")
        }
    }
}

async fn sweep_history(monitor: &PageMonitor, retention: Duration) {
    let Ok(retention) = chrono::Duration::from_std(retention) else {
        return;
    };
    let cutoff = Utc::now() - retention;
    match monitor.prune_history(cutoff).await {
        Ok(0) => debug!("Retention sweep removed nothing"),
        Ok(removed) => info!(removed, cutoff = %cutoff, "Retention sweep removed old snapshots"),
        Err(e) => warn!(error = %e, "Retention sweep failed"),
    }
}
