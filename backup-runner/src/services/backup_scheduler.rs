use crate::services::runner::{BackupRunner, Trigger};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

/// Fires at minute zero of every hour.
const HOURLY_CRON: &str = "0 0 * * * *";

pub struct BackupScheduler {
    scheduler: Mutex<JobScheduler>,
    runner: Arc<BackupRunner>,
}

impl BackupScheduler {
    pub async fn new(runner: Arc<BackupRunner>) -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            runner,
        })
    }

    pub async fn schedule_hourly(&self) -> anyhow::Result<()> {
        let runner = self.runner.clone();

        let job = Job::new_async(HOURLY_CRON, move |_uuid, _lock| {
            let runner = runner.clone();
            Box::pin(async move {
                tracing::info!("Timer fired, starting scheduled backup");
                runner.run(Trigger::Scheduled).await;
            })
        })?;

        self.scheduler.lock().await.add(job).await?;
        tracing::info!(cron = HOURLY_CRON, "Backup schedule registered");
        Ok(())
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        self.scheduler.lock().await.start().await?;
        Ok(())
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.scheduler.lock().await.shutdown().await?;
        Ok(())
    }
}
