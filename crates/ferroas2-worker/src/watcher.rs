//! Polling directory watcher
//!
//! Every `scan_interval` each watched directory is listed and compared against the
//! previous listing by size and modification time. New or changed files are reported
//! to the scheduler with `start_watching_file`, vanished ones with
//! `stop_watching_file`. The first scan reports everything already present. A
//! directory that cannot be listed keeps its previous listing, so its files are
//! neither dropped nor reported again.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    size: u64,
    modified: Option<SystemTime>,
}

pub struct DirectoryWatcher {
    scheduler: Arc<Scheduler>,
    snapshots: HashMap<PathBuf, Snapshot>,
}

impl DirectoryWatcher {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self {
            scheduler,
            snapshots: HashMap::new(),
        }
    }

    async fn list_files(dir: &std::path::Path) -> std::io::Result<Vec<(PathBuf, Snapshot)>> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                // removed between listing and stat
                Err(_) => continue,
            };
            if !metadata.is_file() {
                continue;
            }
            files.push((
                entry.path(),
                Snapshot {
                    size: metadata.len(),
                    modified: metadata.modified().ok(),
                },
            ));
        }
        Ok(files)
    }

    /// Compare every watched directory with the previous scan and report the
    /// differences. Returns the number of changes reported.
    pub async fn scan_once(&mut self) -> usize {
        let mut current = HashMap::new();
        for dir in self.scheduler.watched_directories().await {
            match Self::list_files(&dir.directory).await {
                Ok(files) => current.extend(files),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        directory = %dir.directory.display(),
                        "Unable to scan watched directory, keeping its previous listing"
                    );
                    current.extend(
                        self.snapshots
                            .iter()
                            .filter(|(path, _)| path.parent() == Some(dir.directory.as_path()))
                            .map(|(path, snapshot)| (path.clone(), *snapshot)),
                    );
                }
            }
        }

        let mut changes = 0;
        for (path, snapshot) in &current {
            if self.snapshots.get(path) != Some(snapshot) {
                tracing::debug!(path = %path.display(), "File created or modified");
                self.scheduler.start_watching_file(path).await;
                changes += 1;
            }
        }
        for path in self.snapshots.keys() {
            if !current.contains_key(path) {
                tracing::debug!(path = %path.display(), "File deleted");
                self.scheduler.stop_watching_file(path).await;
                changes += 1;
            }
        }

        self.snapshots = current;
        changes
    }

    /// Scan every `scan_interval` until shut down.
    pub fn spawn(mut self, scan_interval: Duration) -> WatcherHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let join = tokio::spawn(async move {
            tracing::info!(interval_secs = scan_interval.as_secs(), "Directory watcher started");
            let mut ticker = tokio::time::interval(scan_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        self.scan_once().await;
                    }
                }
            }
            tracing::info!("Directory watcher stopped");
        });
        WatcherHandle { shutdown_tx, join }
    }
}

pub struct WatcherHandle {
    shutdown_tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl WatcherHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.join.await {
            tracing::warn!(error = %e, "Directory watcher task ended abnormally");
        }
    }
}
