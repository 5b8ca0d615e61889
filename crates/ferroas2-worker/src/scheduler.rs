//! Send scheduler
//!
//! Tracks watched outboxes and the files in them. A tick runs
//! [`Scheduler::send_scheduled_files`], which sends due files one after another.
//! Only one run is active at a time; a tick that arrives while a run is in progress
//! is skipped.
//!
//! Shutdown: [`SchedulerHandle::shutdown`] stops the tick loop after the current run.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use ferroas2_core::models::{WatchStatus, WatchedDir, WatchedFile};
use ferroas2_core::{EventSink, Phase};

use crate::context::SendDispatch;

#[derive(Default)]
struct Registry {
    dirs: BTreeMap<PathBuf, WatchedDir>,
    files: BTreeMap<PathBuf, WatchedFile>,
}

impl Registry {
    /// Files waiting to be sent whose time has come, earliest first.
    fn due_for_send(&self, now: DateTime<Utc>) -> Vec<&WatchedFile> {
        let mut due: Vec<&WatchedFile> = self.files.values().filter(|f| f.is_due(now)).collect();
        due.sort_by_key(|f| f.send_at);
        due
    }
}

fn exists_on_disk(file: &WatchedFile) -> bool {
    file.file.is_file()
}

/// Clears the in-flight flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    registry: Mutex<Registry>,
    dispatch: Arc<dyn SendDispatch>,
    events: Arc<dyn EventSink>,
    sending: AtomicBool,
}

impl Scheduler {
    pub fn new(dispatch: Arc<dyn SendDispatch>, events: Arc<dyn EventSink>) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            dispatch,
            events,
            sending: AtomicBool::new(false),
        }
    }

    pub async fn watch_directory(&self, dir: WatchedDir) {
        tracing::info!(watched_dir = %dir, "Watching directory");
        self.registry
            .lock()
            .await
            .dirs
            .insert(dir.directory.clone(), dir);
    }

    pub async fn watched_directories(&self) -> Vec<WatchedDir> {
        self.registry.lock().await.dirs.values().cloned().collect()
    }

    /// A file in a watched directory was created or modified.
    pub async fn start_watching_file(&self, path: &Path) {
        let mut registry = self.registry.lock().await;
        let dir = match path.parent().and_then(|parent| registry.dirs.get(parent)) {
            Some(dir) => dir.clone(),
            None => {
                tracing::debug!(path = %path.display(), "Ignoring file outside watched directories");
                return;
            }
        };
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "Ignoring file that no longer exists");
            return;
        }

        match registry.files.get_mut(path) {
            Some(file) if file.status == WatchStatus::New => {
                file.debounce(Utc::now());
                tracing::debug!(file = %file, "File still changing, send postponed");
            }
            Some(file) => {
                tracing::debug!(file = %file, "File already scheduled");
            }
            None => {
                let file = WatchedFile::new(path, &dir);
                tracing::info!(file = %file, "Watching file");
                registry.files.insert(path.to_path_buf(), file);
            }
        }
    }

    /// A watched file was deleted. Tracking stops even if a send is in progress.
    pub async fn stop_watching_file(&self, path: &Path) {
        if let Some(file) = self.registry.lock().await.files.remove(path) {
            tracing::info!(file = %file, "Stopped watching file");
        }
    }

    /// Schedule another attempt for a file, `15 × retries` minutes out.
    pub async fn resend_file(&self, path: &Path) -> Result<WatchedFile> {
        let mut registry = self.registry.lock().await;
        let file = registry
            .files
            .get_mut(path)
            .ok_or_else(|| anyhow!("File is not being watched: {}", path.display()))?;
        file.schedule_resend(Utc::now());
        tracing::info!(file = %file, "File scheduled for resend");
        Ok(file.clone())
    }

    /// Snapshot of one tracked file.
    pub async fn watched_file(&self, path: &Path) -> Option<WatchedFile> {
        self.registry.lock().await.files.get(path).cloned()
    }

    /// Send every due file, one at a time. Returns how many sends were attempted;
    /// 0 when another run was already in progress.
    pub async fn send_scheduled_files(&self) -> usize {
        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Send already in progress, skipping");
            return 0;
        }
        let _guard = RunGuard(&self.sending);

        let mut attempted = 0;
        while let Some(file) = self.claim_next_due().await {
            attempted += 1;
            let file_path = file.file.display().to_string();
            let start = std::time::Instant::now();

            match self.dispatch.send_file(&file).await {
                Ok(()) => {
                    tracing::info!(
                        file = %file_path,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Scheduled file sent"
                    );
                    if !exists_on_disk(&file) {
                        self.stop_watching_file(&file.file).await;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, file = %file_path, "Scheduled send failed");
                    self.events.error(
                        Phase::Scheduler,
                        &file_path,
                        "Error sending scheduled file",
                        Some(&e.to_string()),
                    );
                }
            }
        }
        attempted
    }

    /// Take the first due file that still exists and mark it as being sent.
    async fn claim_next_due(&self) -> Option<WatchedFile> {
        let mut registry = self.registry.lock().await;
        let path = registry
            .due_for_send(Utc::now())
            .into_iter()
            .find(|f| exists_on_disk(f))
            .map(|f| f.file.clone())?;
        let file = registry.files.get_mut(&path)?;
        file.status = WatchStatus::Send;
        Some(file.clone())
    }

    pub async fn status_report(&self) -> String {
        let registry = self.registry.lock().await;
        let mut report = String::new();
        let _ = writeln!(report, "Watched directories: {}", registry.dirs.len());
        for dir in registry.dirs.values() {
            let _ = writeln!(report, "  {}", dir);
        }
        let _ = writeln!(report, "Watched files: {}", registry.files.len());
        for file in registry.files.values() {
            let _ = writeln!(report, "  {}", file);
        }
        report
    }

    /// Run `send_scheduled_files` every `interval` until shut down.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let join = tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "Send scheduler started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Send scheduler shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let attempted = self.send_scheduled_files().await;
                        if attempted > 0 {
                            tracing::debug!(attempted, "Scheduled sends finished");
                        }
                    }
                }
            }
            tracing::info!("Send scheduler stopped");
        });
        SchedulerHandle { shutdown_tx, join }
    }
}

/// Background task handle; see [`Scheduler::spawn`].
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.join.await {
            tracing::warn!(error = %e, "Send scheduler task ended abnormally");
        }
    }
}
