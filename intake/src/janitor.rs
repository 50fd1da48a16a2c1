//! Periodic removal of uploads that were never relayed.

use crate::metrics_defs::{CLEANUP_FAILURES, JANITOR_REMOVED};
use shared::counter;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::time::{self, MissedTickBehavior};

#[derive(Debug, Default, PartialEq)]
pub struct SweepStats {
    pub removed: usize,
    pub errors: usize,
}

/// Sweeps `dir` every `interval`, deleting regular files last modified more than `retention` ago.
pub async fn run_janitor(dir: PathBuf, retention: Duration, interval: Duration) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match sweep_once(&dir, retention, SystemTime::now()).await {
            Ok(stats) if stats.removed > 0 || stats.errors > 0 => {
                tracing::info!(
                    removed = stats.removed,
                    errors = stats.errors,
                    "Upload sweep completed"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(
                    dir = %dir.display(),
                    error = %e,
                    "Failed to sweep upload directory"
                );
            }
        }
    }
}

/// One pass over `dir`. Per-file failures are logged and counted, only a failure to list
/// the directory is returned.
pub async fn sweep_once(
    dir: &Path,
    retention: Duration,
    now: SystemTime,
) -> io::Result<SweepStats> {
    let mut stats = SweepStats::default();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();

        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read upload metadata"
                );
                stats.errors += 1;
                continue;
            }
        };

        let expired = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > retention);
        if !expired {
            continue;
        }

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Deleted expired upload");
                counter!(JANITOR_REMOVED).increment(1);
                stats.removed += 1;
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to delete expired upload"
                );
                counter!(CLEANUP_FAILURES, "stage" => "janitor").increment(1);
                stats.errors += 1;
            }
        }
    }

    Ok(stats)
}
