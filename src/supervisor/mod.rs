//! Download supervisor
//!
//! The `Supervisor` owns every running job. Its methods are split by concern:
//! - [`job`] - End-to-end execution of one download
//! - [`files`] - Serving and cleaning up finished artifacts
//! - [`reaper`] - Optional periodic removal of stale files
//! - [`lifecycle`] - Shutdown coordination

mod files;
mod job;
mod lifecycle;
mod reaper;

use crate::artifact::ArtifactResolver;
use crate::config::Config;
use crate::error::{Error, JobError, Result};
use crate::store::JobStore;
use crate::tool::{CliMediaTool, MediaTool};
use crate::types::{Event, JobId, JobRecord};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

pub use files::CompletedFile;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

/// Supervises download jobs (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Supervisor {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Job state table
    pub(crate) store: JobStore,
    /// External tool used for every job (trait object for pluggable implementations)
    pub(crate) tool: Arc<dyn MediaTool>,
    /// Artifact locator and validator
    pub(crate) resolver: Arc<ArtifactResolver>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Running jobs and their cancellation tokens
    pub(crate) active_jobs: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
    /// Whether new jobs are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Cancelled once shutdown completes; stops background services
    pub(crate) shutdown_token: CancellationToken,
}

impl Supervisor {
    /// Create a supervisor using the yt-dlp binary described by `config.tool`
    ///
    /// Creates the working directory if needed. A missing binary is not an error
    /// here; each job probes the tool and fails with a remediation hint instead.
    pub async fn new(config: Config) -> Result<Self> {
        let tool = CliMediaTool::from_config(&config.tool);
        Self::with_tool(config, Arc::new(tool)).await
    }

    /// Create a supervisor with a custom tool implementation
    pub async fn with_tool(config: Config, tool: Arc<dyn MediaTool>) -> Result<Self> {
        let work_dir = config.work_dir();
        tokio::fs::create_dir_all(work_dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create working directory '{}': {}",
                    work_dir.display(),
                    e
                ),
            ))
        })?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let resolver = ArtifactResolver::new(config.artifact.clone());

        tracing::info!(
            tool = tool.name(),
            work_dir = %work_dir.display(),
            "supervisor initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            store: JobStore::new(),
            tool,
            resolver: Arc::new(resolver),
            event_tx,
            active_jobs: Arc::new(Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Accept a download and start it in the background
    ///
    /// Returns as soon as the job is registered; progress is observable only through
    /// the store (or the event stream). Failures of the job itself never surface
    /// here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] once [`Supervisor::shutdown`] has started.
    pub async fn submit(&self, url: impl Into<String>) -> Result<JobId> {
        // Checked under the lock: `shutdown` flips the flag before `cancel_all`
        // takes this lock, so a job registered here is always cancelled
        let mut active = self.active_jobs.lock().await;
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let url = url.into();
        let id = self.store.create().await;
        let token = CancellationToken::new();
        active.insert(id, token.clone());
        drop(active);

        tracing::info!(job_id = %id, url = %url, "download accepted");
        self.emit_event(Event::Queued {
            id,
            url: url.clone(),
        });

        let supervisor = self.clone();
        tokio::spawn(async move {
            // Inner task so a panic is observed as a JoinError instead of a lost job
            let runner = supervisor.clone();
            let handle = tokio::spawn(async move { runner.execute(id, url, token).await });

            if let Err(e) = handle.await {
                tracing::error!(job_id = %id, error = %e, "download task aborted");
                supervisor
                    .finish_failed(id, 0.0, JobError::InternalFault(e.to_string()))
                    .await;
            }

            supervisor.active_jobs.lock().await.remove(&id);
        });

        Ok(id)
    }

    /// Get the current record of a job
    pub async fn progress(&self, id: JobId) -> Result<JobRecord> {
        self.store.get(id).await
    }

    /// The job state table
    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Subscribe to job events
    ///
    /// Each subscriber receives all events independently. A subscriber that falls
    /// behind by more than the channel capacity gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Name of the external tool
    pub fn tool_name(&self) -> &str {
        self.tool.name()
    }

    /// Whether new jobs are accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }

    /// Number of jobs whose task is still running
    pub async fn active_count(&self) -> usize {
        self.active_jobs.lock().await.len()
    }

    /// Emit an event to all subscribers (dropped when nobody listens)
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let supervisor = Arc::new(self.clone());
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(supervisor, config).await })
    }
}
