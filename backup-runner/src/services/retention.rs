//! Pruning of expired local backup folders.

use chrono::{DateTime, Duration, Local};
use std::path::Path;

/// Delete every immediate child directory of the backup root whose last
/// modification is strictly older than the retention window. Returns the
/// names of the removed folders. Per-entry errors are logged and skipped.
pub fn prune_expired(
    root: &Path,
    retention_days: u32,
    now: DateTime<Local>,
) -> anyhow::Result<Vec<String>> {
    let cutoff = now - Duration::days(i64::from(retention_days));
    let mut removed = Vec::new();

    for entry in std::fs::read_dir(root)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(t) => DateTime::<Local>::from(t),
            Err(e) => {
                tracing::warn!("No modification time for {}: {}", path.display(), e);
                continue;
            }
        };

        if modified < cutoff {
            let name = entry.file_name().to_string_lossy().to_string();
            match std::fs::remove_dir_all(&path) {
                Ok(()) => {
                    tracing::info!(folder = %name, "Removed expired backup folder");
                    removed.push(name);
                }
                Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }

    Ok(removed)
}
