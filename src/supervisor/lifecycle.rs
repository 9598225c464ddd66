//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;

use super::Supervisor;

impl Supervisor {
    /// Gracefully shut down the supervisor
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new jobs (`submit` returns `ShuttingDown`)
    /// 2. Cancels all running jobs; their processes are killed and their records
    ///    end in `error` with a cancellation message
    /// 3. Waits for job tasks to finish, up to `supervisor.shutdown_timeout`
    /// 4. Stops background services and emits [`Event::Shutdown`]
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new jobs
        self.accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);
        tracing::info!("Stopped accepting new downloads");

        // 2. Cancel running jobs
        self.cancel_all().await;

        // 3. Wait for job tasks with timeout
        let shutdown_timeout = self.config.supervisor.shutdown_timeout;
        match tokio::time::timeout(shutdown_timeout, self.wait_for_active_jobs()).await {
            Ok(()) => tracing::info!("All download tasks finished"),
            Err(_) => tracing::warn!(
                timeout = ?shutdown_timeout,
                "Timeout waiting for download tasks, proceeding with shutdown"
            ),
        }

        // 4. Stop background services and notify subscribers
        self.shutdown_token.cancel();
        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Signal cancellation to every running job
    pub(crate) async fn cancel_all(&self) {
        let active = self.active_jobs.lock().await;
        tracing::debug!(active_count = active.len(), "Cancelling all running jobs");

        for (id, token) in active.iter() {
            tracing::debug!(job_id = %id, "Signaling cancellation");
            token.cancel();
        }
    }

    async fn wait_for_active_jobs(&self) {
        loop {
            let active_count = self.active_jobs.lock().await.len();
            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for download tasks to finish");
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}
