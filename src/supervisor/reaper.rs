//! Periodic removal of files nobody cleaned up.

use super::Supervisor;
use std::collections::HashSet;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

impl Supervisor {
    /// Start the stale-file reaper if it is enabled in the configuration
    ///
    /// The task sweeps the working directory every `storage.reaper.interval` and
    /// stops when [`Supervisor::shutdown`] completes.
    pub fn spawn_reaper(&self) -> Option<JoinHandle<()>> {
        let reaper = &self.config.storage.reaper;
        if !reaper.enabled {
            tracing::debug!("stale file reaper disabled");
            return None;
        }

        let supervisor = self.clone();
        let interval = reaper.interval;
        let max_age = reaper.max_age;
        tracing::info!(?interval, ?max_age, "starting stale file reaper");

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        supervisor.reap_stale_files(max_age).await;
                    }
                    _ = supervisor.shutdown_token.cancelled() => {
                        tracing::debug!("stale file reaper stopped");
                        return;
                    }
                }
            }
        }))
    }

    /// Delete regular files in the working directory older than `max_age`
    ///
    /// Files of jobs that are still running are skipped. Returns the number of
    /// deleted files.
    pub async fn reap_stale_files(&self, max_age: Duration) -> usize {
        let work_dir = self.config.work_dir();
        let running: HashSet<String> = self
            .active_jobs
            .lock()
            .await
            .keys()
            .map(|id| format!("{id}_"))
            .collect();

        let mut entries = match tokio::fs::read_dir(work_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(work_dir = %work_dir.display(), error = %e, "reaper cannot read working directory");
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut deleted = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if running.iter().any(|prefix| name.starts_with(prefix)) {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age <= max_age {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!(?path, ?age, "reaped stale file");
                    deleted += 1;
                }
                Err(e) => tracing::warn!(?path, error = %e, "failed to reap stale file"),
            }
        }

        if deleted > 0 {
            tracing::info!(deleted, "stale file sweep complete");
        }
        deleted
    }
}
