//! Periodic removal of stale uploads and conversion outputs.
//!
//! The janitor runs as a single background task. Every `interval` it deletes regular files
//! older than `max_age` from the upload and output directories; the assistant's data directory
//! is never touched. The sweep itself is blocking filesystem work and runs on the blocking pool.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::storage::Storage;

#[derive(Debug, Clone)]
pub struct Janitor {
    storage: Storage,
    interval: Duration,
    max_age: Duration,
}

impl Janitor {
    pub fn new(storage: Storage, interval: Duration, max_age: Duration) -> Self {
        Self {
            storage,
            interval,
            max_age,
        }
    }

    /// Run one sweep, returning how many files were removed.
    #[instrument(skip(self), fields(max_age = ?self.max_age))]
    pub async fn sweep_once(&self) -> anyhow::Result<usize> {
        let storage = self.storage.clone();
        let max_age = self.max_age;
        let removed = tokio::task::spawn_blocking(move || storage.sweep(max_age)).await??;
        if removed > 0 {
            info!(removed, "Janitor removed stale files");
        } else {
            debug!("Janitor found nothing to remove");
        }
        Ok(removed)
    }

    /// Spawn the sweep loop. It stops when `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Janitor shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep_once().await {
                            error!("Janitor sweep failed: {:#}", e);
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use std::fs::File;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn storage_in(dir: &TempDir) -> Storage {
        Storage::new(&StorageConfig {
            upload_dir: dir.path().join("uploads"),
            output_dir: dir.path().join("outputs"),
            data_dir: dir.path().join("data"),
        })
    }

    fn backdate(path: &std::path::Path, age: Duration) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_sweep_once_keeps_active_workbook() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);
        storage.ensure_dirs().await.unwrap();

        let stale = storage.upload_dir().join("old.xlsx");
        let active = storage.active_workbook_path();
        for path in [&stale, &active] {
            std::fs::write(path, b"x").unwrap();
            backdate(path, Duration::from_secs(3 * 24 * 3600));
        }

        let janitor = Janitor::new(storage, Duration::from_secs(3600), Duration::from_secs(24 * 3600));
        assert_eq!(janitor.sweep_once().await.unwrap(), 1);
        assert!(!stale.exists());
        assert!(active.exists());
    }

    #[tokio::test]
    async fn test_spawn_sweeps_and_stops() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);
        storage.ensure_dirs().await.unwrap();

        let stale = storage.output_dir().join("old.csv");
        std::fs::write(&stale, b"a,b").unwrap();
        backdate(&stale, Duration::from_secs(120));

        let token = CancellationToken::new();
        let handle = Janitor::new(storage, Duration::from_millis(20), Duration::from_secs(60)).spawn(token.clone());

        // The first tick fires immediately
        for _ in 0..100 {
            if !stale.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!stale.exists());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
