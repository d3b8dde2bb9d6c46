use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use stock_sentinel::api::{ApiServer, AppState};
use stock_sentinel::config::AppConfig;
use stock_sentinel::database::{self, repositories::SqlxSnapshotRepository};
use stock_sentinel::logging;
use stock_sentinel::monitor::{CheckSettings, Classifier, Notifier, PageMonitor, source_from_config};
use stock_sentinel::scheduler::{MonitorScheduler, SchedulerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let (logging_config, _log_guard) = logging::init_logging(&config.log_dir)?;

    info!(
        endpoints = ?config.monitor.endpoints,
        source = ?config.monitor.source_kind,
        fetch_budget_secs = config.monitor.fetch_budget().as_secs(),
        "Starting stock-sentinel v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = database::init_pool(&config.database_url)
        .await
        .with_context(|| format!("cannot open database {}", config.database_url))?;
    database::run_migrations(&pool).await?;

    let monitor = Arc::new(PageMonitor::new(
        Arc::from(source_from_config(&config.monitor)),
        Classifier::new(&config.monitor.lexicon),
        Arc::new(SqlxSnapshotRepository::new(pool.clone())),
        Notifier::new(),
        CheckSettings::from(&config.monitor),
    ));

    if let Err(e) = monitor.rehydrate().await {
        warn!(error = %e, "Could not restore state from history, starting fresh");
    }

    let cancel = CancellationToken::new();
    logging_config.start_retention_cleanup(cancel.child_token());

    let scheduler = MonitorScheduler::start(
        monitor.clone(),
        SchedulerConfig::from(&config.monitor),
        cancel.child_token(),
    );

    let state = AppState::new(monitor.clone()).with_logging_config(logging_config.clone());
    let server = ApiServer::new(config.api.clone(), state).with_cancel_token(cancel.clone());

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
        shutdown.cancel();
    });

    let served = server.run().await;

    cancel.cancel();
    scheduler.stop().await;
    pool.close().await;
    info!("stock-sentinel stopped");

    served?;
    Ok(())
}
