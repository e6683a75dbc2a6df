use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use upwatch_service::config::Config;
use upwatch_service::database::{self, DatabaseImpl};
use upwatch_service::monitoring::{CheckScheduler, ProbeExecutor};
use upwatch_service::retention::{RetentionCleanup, RetentionPolicy};

#[derive(Parser)]
#[command(name = "upwatch-service", about = "Headless uptime monitoring daemon", version)]
struct Cli {
    /// Path to the config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init_tracing();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_deref()).context("failed to load config")?;
    info!("{}", config);

    let pool = database::connect(&config.database.path).await?;
    let database = Arc::new(DatabaseImpl::new_from_pool(pool));
    let executor = Arc::new(ProbeExecutor::new()?);
    let scheduler = CheckScheduler::new(database.clone(), database.clone(), executor);

    let scheduled = scheduler.start().await?;
    info!("Monitoring {} targets", scheduled);

    let retention = RetentionCleanup::new(
        database.clone(),
        RetentionPolicy { result_days: config.monitoring.retention_days },
    );
    let retention_handle = retention.start_periodic_cleanup();

    // Reconcile picks up monitors other processes add or edit in the
    // shared database
    let mut reconcile_timer = tokio::time::interval(Duration::from_secs(
        config.monitoring.reconcile_interval_seconds.max(1),
    ));
    reconcile_timer.tick().await; // first tick fires immediately

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = reconcile_timer.tick() => {
                if let Err(e) = scheduler.reconcile().await {
                    error!("Schedule reconcile failed: {}", e);
                }
            }
        }
    }

    info!("Shutting down");
    retention_handle.abort();
    let stopped = scheduler.stop().await?;
    info!("Stopped {} monitor timers", stopped);

    Ok(())
}
