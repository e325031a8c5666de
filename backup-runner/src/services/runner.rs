//! One backup cycle: dump, upload, replicate, prune, notify.

use crate::config::AppConfig;
use crate::services::mailer::Notifier;
use crate::services::uploader::ArchiveStore;
use crate::services::{dump, retention};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Why a run started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Scheduled => "scheduled",
            Trigger::Manual => "manual",
        }
    }
}

/// Paths and identity of a single run, computed once at run start.
pub struct RunContext {
    pub trigger: Trigger,
    pub backup_id: String,
    pub run_dir: PathBuf,
    pub archive_path: PathBuf,
}

impl RunContext {
    pub fn new(root: &Path, now: DateTime<Local>, trigger: Trigger) -> Self {
        let date = now.format("%Y-%m-%d").to_string();
        let hour = now.format("%H").to_string();
        let backup_id = now.format("%Y-%m-%d_%H-%M").to_string();

        let run_dir = root.join(&date).join(&hour);
        let archive_path = run_dir.join(format!("backup_{}.gz", backup_id));

        Self {
            trigger,
            backup_id,
            run_dir,
            archive_path,
        }
    }
}

#[derive(Serialize)]
struct RunMeta<'a> {
    backup_id: &'a str,
    database: &'a str,
    trigger: &'a str,
    archive: String,
    created_at: String,
}

pub struct BackupRunner {
    config: Arc<AppConfig>,
    store: Option<Arc<dyn ArchiveStore>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl BackupRunner {
    pub fn new(
        config: Arc<AppConfig>,
        store: Option<Arc<dyn ArchiveStore>>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        Self {
            config,
            store,
            notifier,
        }
    }

    /// Execute one backup cycle. Outcomes are signaled only through logs
    /// and mail; the caller gets nothing back.
    pub async fn run(&self, trigger: Trigger) {
        let ctx = RunContext::new(&self.config.backup_root, Local::now(), trigger);
        tracing::info!(
            trigger = trigger.as_str(),
            archive = %ctx.archive_path.display(),
            "Starting backup run"
        );

        if let Err(e) = tokio::fs::create_dir_all(&ctx.run_dir).await {
            tracing::error!("Failed to create {}: {}", ctx.run_dir.display(), e);
            self.notify(
                &format!("Database backup failed ({})", self.config.db_name),
                &self.failure_body(
                    &ctx,
                    "The backup directory could not be created",
                    &e.to_string(),
                ),
            )
            .await;
            return;
        }

        if let Err(e) = dump::dump_to_archive(&self.config, &ctx.archive_path).await {
            tracing::error!(error = %e, "Dump failed, aborting run");
            self.notify(
                &format!("Database backup failed ({})", self.config.db_name),
                &self.failure_body(&ctx, "The database dump failed", &e.to_string()),
            )
            .await;
            return;
        }
        tracing::info!(backup_id = %ctx.backup_id, "Dump completed");

        self.write_run_meta(&ctx).await;

        if let Some(store) = &self.store {
            match store.put_archive(&ctx.archive_path, &ctx.backup_id).await {
                Ok(()) => tracing::info!(backup_id = %ctx.backup_id, "Archive uploaded"),
                Err(e) => tracing::warn!("Upload failed, continuing: {:#}", e),
            }
        } else {
            tracing::debug!("Object storage not configured, skipping upload");
        }

        match &self.config.replica_db_uri {
            Some(replica_uri) => match dump::replicate(&self.config, replica_uri).await {
                Ok(()) => {
                    tracing::info!("Replication to secondary cluster completed");
                    self.notify(
                        &format!("Database backup completed ({})", self.config.db_name),
                        &self.success_body(&ctx, "replicated to secondary cluster"),
                    )
                    .await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Replication failed");
                    self.notify(
                        &format!("Database replication failed ({})", self.config.db_name),
                        &self.failure_body(
                            &ctx,
                            "The replication to the secondary cluster failed",
                            &e.to_string(),
                        ),
                    )
                    .await;
                }
            },
            None => {
                self.notify(
                    &format!("Database backup completed ({})", self.config.db_name),
                    &self.success_body(&ctx, "not configured, file-only backup"),
                )
                .await;
            }
        }

        self.prune_expired_folders().await;
    }

    fn success_body(&self, ctx: &RunContext, replication: &str) -> String {
        format!(
            "Backup {} completed.\n\nArchive: {}\nReplication: {}\nTrigger: {}\n",
            ctx.backup_id,
            ctx.archive_path.display(),
            replication,
            ctx.trigger.as_str(),
        )
    }

    fn failure_body(&self, ctx: &RunContext, what: &str, detail: &str) -> String {
        format!(
            "{} for backup {}.\n\nArchive: {}\nTrigger: {}\n\n{}\n",
            what,
            ctx.backup_id,
            ctx.archive_path.display(),
            ctx.trigger.as_str(),
            detail,
        )
    }

    async fn notify(&self, subject: &str, body: &str) {
        let Some(notifier) = &self.notifier else {
            tracing::debug!(subject, "Mail relay not configured, skipping notification");
            return;
        };
        if let Err(e) = notifier.notify(subject, body).await {
            tracing::warn!("Failed to send notification '{}': {:#}", subject, e);
        }
    }

    async fn write_run_meta(&self, ctx: &RunContext) {
        let meta = RunMeta {
            backup_id: &ctx.backup_id,
            database: &self.config.db_name,
            trigger: ctx.trigger.as_str(),
            archive: ctx.archive_path.display().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let path = ctx.run_dir.join(".backup-meta.json");
        let json = match serde_json::to_string_pretty(&meta) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!("Failed to serialize run metadata: {}", e);
                return;
            }
        };
        if let Err(e) = tokio::fs::write(&path, json).await {
            tracing::warn!("Failed to write {}: {}", path.display(), e);
        }
    }

    async fn prune_expired_folders(&self) {
        let root = self.config.backup_root.clone();
        let days = self.config.retention_days;

        let result =
            tokio::task::spawn_blocking(move || retention::prune_expired(&root, days, Local::now()))
                .await;

        match result {
            Ok(Ok(removed)) if !removed.is_empty() => {
                tracing::info!(count = removed.len(), "Pruned expired backup folders")
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!("Retention cleanup failed: {:#}", e),
            Err(e) => tracing::warn!("Retention cleanup task panicked: {}", e),
        }
    }
}
