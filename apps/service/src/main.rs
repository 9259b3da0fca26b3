use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

mod config;
mod database;
mod error;
mod logs;
mod monitoring;
mod notifications;
mod pool;
#[cfg(test)]
mod testing;

use config::Config;
use database::LibsqlDataStore;
use error::AppError;
use logger::init_tracing;
use logs::FileLogStore;
use monitoring::{HttpChecker, Scheduler, Worker};
use notifications::{LogOnlyGateway, NotificationGateway, TwilioGateway};

#[derive(Parser)]
#[command(version, about = "Background worker probing registered uptime checks", long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Run a single sweep and rotation pass, then exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref())?;

    if cli.print_config {
        println!("{config}");
        return Ok(());
    }

    let worker = build_worker(&config).await?;

    if cli.once {
        let summary = worker.sweep().await;
        let report = worker.rotate_logs().await;
        info!(probed = summary.probed, rotated = report.rotated.len(), "Single pass complete");
        return Ok(());
    }

    let scheduler = Scheduler::new(
        worker,
        Duration::from_secs(config.worker.sweep_interval_seconds),
        Duration::from_secs(config.worker.rotation_interval_seconds),
    );
    let handles = scheduler.start();

    signal::ctrl_c().await?;
    info!("Ctrl+C received, stopping worker.");
    for handle in handles {
        handle.abort();
    }

    Ok(())
}

async fn build_worker(config: &Config) -> anyhow::Result<Worker> {
    let pool = pool::open_pool(&config.storage.database_path).await?;
    {
        let conn = pool.get().await?;
        database::initialize_database(&conn).await?;
    }
    info!(path = %config.storage.database_path.display(), "Database ready");

    let store = Arc::new(LibsqlDataStore::new_from_pool(pool));
    let logs = Arc::new(FileLogStore::open(&config.storage.logs_dir).await?);
    info!(dir = %logs.dir().display(), "Check logs ready");

    let gateway: Arc<dyn NotificationGateway> = match &config.twilio {
        Some(twilio) => Arc::new(TwilioGateway::new(twilio)?),
        None => {
            warn!("No [twilio] section configured, alerts will only be logged");
            Arc::new(LogOnlyGateway)
        }
    };

    let checker = Arc::new(HttpChecker::new()?);

    Ok(Worker::new(store, logs, gateway, checker).with_probe_limit(config.worker.max_concurrent_probes))
}
