//! Backup Runner - Main entry point
//!
//! Dumps the source database on an hourly cadence (or on demand), uploads
//! the archive, optionally replicates to a secondary cluster, prunes old
//! local backups, and mails the operator the outcome.

use anyhow::Result;
use backup_runner::config::AppConfig;
use backup_runner::services::backup_scheduler::BackupScheduler;
use backup_runner::services::mailer::{Notifier, SmtpNotifier};
use backup_runner::services::runner::{BackupRunner, Trigger};
use backup_runner::services::uploader::{ArchiveStore, S3ArchiveStore};
use backup_runner::utils;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run one backup immediately in addition to starting the hourly schedule
    #[arg(long)]
    backup_now: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::from_env()?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log_level);
    utils::logger::init(log_level)?;

    tracing::info!(
        "Starting backup-runner v{} (database: {})",
        env!("CARGO_PKG_VERSION"),
        config.db_name
    );

    std::fs::create_dir_all(&config.backup_root)?;

    let store: Option<Arc<dyn ArchiveStore>> = match &config.s3 {
        Some(s3) => {
            tracing::info!(bucket = %s3.bucket, "Object storage upload enabled");
            Some(Arc::new(S3ArchiveStore::from_config(s3).await))
        }
        None => {
            tracing::info!("Object storage not configured, uploads disabled");
            None
        }
    };

    let notifier: Option<Arc<dyn Notifier>> = match &config.mail {
        Some(mail) => {
            tracing::info!(host = %mail.host, to = %mail.alert_to, "Mail notifications enabled");
            Some(Arc::new(SmtpNotifier::from_config(mail)?))
        }
        None => {
            tracing::info!("Mail relay not configured, notifications disabled");
            None
        }
    };

    let runner = Arc::new(BackupRunner::new(Arc::new(config), store, notifier));

    // One-shot manual run; proceeds independently of the timer.
    if args.backup_now {
        let manual = runner.clone();
        tokio::spawn(async move {
            manual.run(Trigger::Manual).await;
        });
    }

    let scheduler = BackupScheduler::new(runner).await?;
    scheduler.schedule_hourly().await?;
    scheduler.start().await?;

    shutdown_signal().await;

    tracing::info!("Shutting down...");
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!("Scheduler shutdown error: {}", e);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
