//! Execution of a single download job.

use super::Supervisor;
use crate::artifact::Artifact;
use crate::error::{JobError, ResolveError};
use crate::tool::{Invocation, ProgressState, ReadEvent, ToolProcess, summarize_failure};
use crate::types::{Event, JobId, JobRecord};
use crate::utils::{bytes_to_mib, truncate_chars};
use std::collections::VecDeque;
use std::time::{Instant, SystemTime};
use tokio_util::sync::CancellationToken;

/// Output lines kept for failure diagnostics
const TAIL_LINES: usize = 10;

/// Output lines appended to a not-found message
const NOT_FOUND_TAIL_LINES: usize = 3;

/// Bound on the output excerpt appended to a not-found message
const NOT_FOUND_TAIL_CHARS: usize = 200;

/// Bound on the first-line excerpt shown while the tool starts up
const STARTUP_LINE_CHARS: usize = 60;

/// Counts output lines and keeps the most recent ones
#[derive(Debug, Default)]
pub(crate) struct OutputLog {
    lines_read: usize,
    tail: VecDeque<String>,
}

impl OutputLog {
    pub(crate) fn push(&mut self, line: &str) {
        self.lines_read += 1;
        if self.tail.len() == TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line.to_string());
    }

    pub(crate) fn lines_read(&self) -> usize {
        self.lines_read
    }

    /// The last `count` lines, oldest first
    pub(crate) fn last(&self, count: usize) -> Vec<String> {
        let skip = self.tail.len().saturating_sub(count);
        self.tail.iter().skip(skip).cloned().collect()
    }
}

impl Supervisor {
    /// Run one download to completion
    ///
    /// All outcomes, including failures, end up in the store as a terminal record;
    /// nothing is returned to the caller. The job record must already exist (see
    /// [`JobStore::create`](crate::store::JobStore::create)).
    pub async fn run(&self, url: &str, id: JobId) {
        let token = CancellationToken::new();
        self.active_jobs.lock().await.insert(id, token.clone());
        self.execute(id, url.to_string(), token).await;
        self.active_jobs.lock().await.remove(&id);
    }

    /// Drive the job and write its terminal state
    pub(crate) async fn execute(&self, id: JobId, url: String, cancel: CancellationToken) {
        let started_at = SystemTime::now();
        let mut state = ProgressState::new(self.config.artifact.suspicious_size_bytes);
        let mut log = OutputLog::default();

        tracing::info!(job_id = %id, "download started");

        match self
            .download(id, &url, started_at, &cancel, &mut state, &mut log)
            .await
        {
            Ok(artifact) => self.finish_completed(id, artifact).await,
            Err(error) => self.finish_failed(id, state.progress, error).await,
        }
    }

    async fn download(
        &self,
        id: JobId,
        url: &str,
        started_at: SystemTime,
        cancel: &CancellationToken,
        state: &mut ProgressState,
        log: &mut OutputLog,
    ) -> Result<Artifact, JobError> {
        let supervisor = &self.config.supervisor;

        // 1. Probe the tool
        self.publish(id, 0.0, format!("checking {}...", self.tool.name()))
            .await;
        let probe = tokio::select! {
            result = self.tool.probe(supervisor.probe_timeout) => result,
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
        };
        match probe {
            Ok(version) => {
                tracing::debug!(job_id = %id, tool = self.tool.name(), version = %version, "tool available")
            }
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "tool probe failed");
                return Err(JobError::ToolUnavailable {
                    tool: self.tool.name().to_string(),
                    hint: self.tool.install_hint().to_string(),
                });
            }
        }

        // 2. Build the invocation
        let work_dir = self.config.work_dir().clone();
        tokio::fs::create_dir_all(&work_dir).await.map_err(|e| {
            JobError::InternalFault(format!(
                "cannot create working directory {}: {}",
                work_dir.display(),
                e
            ))
        })?;
        let output_template = work_dir
            .join(format!("{id}_%(title)s.%(ext)s"))
            .to_string_lossy()
            .into_owned();
        let invocation = Invocation {
            url: url.to_string(),
            output_template,
            work_dir: work_dir.clone(),
        };

        // 3. Launch with merged output
        self.publish(id, 0.0, "starting download process...").await;
        let mut process = ToolProcess::spawn(self.tool.download_command(&invocation))
            .map_err(|e| JobError::InternalFault(e.to_string()))?;
        tracing::debug!(job_id = %id, pid = ?process.id(), "download process spawned");

        // 4-5. Stream output through the parser with stall detection
        let mut last_output = Instant::now();
        loop {
            let event = tokio::select! {
                event = process.next_line(supervisor.read_timeout) => Some(event),
                _ = cancel.cancelled() => None,
            };
            let Some(event) = event else {
                process.kill().await;
                return Err(JobError::Cancelled);
            };

            match event {
                ReadEvent::Line(line) => {
                    last_output = Instant::now();
                    if line.is_empty() {
                        continue;
                    }
                    tracing::debug!(job_id = %id, line = %line, "tool output");
                    log.push(&line);

                    let before = (state.progress, state.message.clone());
                    if log.lines_read() == 1 {
                        state.message =
                            format!("starting: {}", truncate_chars(&line, STARTUP_LINE_CHARS));
                    }
                    state.apply_line(&line);

                    if before != (state.progress, state.message.clone()) {
                        self.publish(id, state.progress, state.message.clone()).await;
                    }
                }
                ReadEvent::Idle => {
                    if last_output.elapsed() > supervisor.stall_timeout {
                        tracing::warn!(job_id = %id, idle = ?last_output.elapsed(), "download stalled, killing process");
                        process.kill().await;
                        return Err(JobError::Stalled {
                            idle: supervisor.stall_timeout,
                        });
                    }
                }
                ReadEvent::Closed => break,
            }
        }

        // 6. Wait for exit, then let the filesystem settle
        let status = match process.wait(supervisor.stall_timeout).await {
            Ok(Some(status)) => status,
            Ok(None) => {
                tracing::warn!(job_id = %id, "process closed its output but did not exit, killing");
                process.kill().await;
                return Err(JobError::Stalled {
                    idle: supervisor.stall_timeout,
                });
            }
            Err(e) => return Err(JobError::InternalFault(e.to_string())),
        };
        tracing::debug!(job_id = %id, %status, lines = log.lines_read(), "download process exited");

        tokio::select! {
            _ = tokio::time::sleep(supervisor.settle_delay) => {}
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
        }

        // 7. Nothing printed and a failure exit: nothing to resolve
        if log.lines_read() == 0 && !status.success() {
            return Err(JobError::ProcessFailed {
                code: status.code(),
                summary: format!(
                    "the process exited ({status}) without any output; {} may be missing or broken",
                    self.tool.name()
                ),
            });
        }

        // 8. Failure exit
        if !status.success() {
            return Err(JobError::ProcessFailed {
                code: status.code(),
                summary: summarize_failure(&state.error_lines, &log.last(TAIL_LINES)),
            });
        }

        // 9. Success exit: locate and validate the artifact
        self.publish(id, state.progress, "verifying downloaded file...")
            .await;
        self.resolver
            .resolve(id, &work_dir, state.filename_hint(), started_at)
            .await
            .map_err(|error| match error {
                ResolveError::NotFound { .. } => {
                    let tail = log.last(NOT_FOUND_TAIL_LINES).join("\n");
                    if tail.is_empty() {
                        JobError::ArtifactNotFound(error.to_string())
                    } else {
                        JobError::ArtifactNotFound(format!(
                            "{} | last lines: {}",
                            error,
                            truncate_chars(&tail, NOT_FOUND_TAIL_CHARS)
                        ))
                    }
                }
                other => other.into(),
            })
    }

    /// Write a non-terminal record and announce it
    async fn publish(&self, id: JobId, progress: f64, message: impl Into<String>) {
        let record = JobRecord::downloading(progress, message);
        let event = Event::Progress {
            id,
            percent: record.progress,
            message: record.message.clone(),
        };
        match self.store.set(id, record).await {
            Ok(()) => self.emit_event(event),
            Err(e) => tracing::debug!(job_id = %id, error = %e, "progress update rejected"),
        }
    }

    async fn finish_completed(&self, id: JobId, artifact: Artifact) {
        let message = format!(
            "download complete, size: {:.2} MiB",
            bytes_to_mib(artifact.size_bytes)
        );
        let record = JobRecord::completed(
            artifact.display_name.clone(),
            artifact.path.clone(),
            message,
        );

        match self.store.set(id, record).await {
            Ok(()) => {
                tracing::info!(
                    job_id = %id,
                    path = ?artifact.path,
                    size_bytes = artifact.size_bytes,
                    "download completed"
                );
                self.emit_event(Event::Completed {
                    id,
                    filename: artifact.display_name,
                    path: artifact.path,
                    size_bytes: artifact.size_bytes,
                });
            }
            Err(e) => tracing::warn!(job_id = %id, error = %e, "could not record completion"),
        }
    }

    pub(crate) async fn finish_failed(&self, id: JobId, progress: f64, error: JobError) {
        let record = JobRecord::failed(progress, error.to_string());
        let message = record.message.clone();

        match self.store.set(id, record).await {
            Ok(()) => {
                tracing::warn!(job_id = %id, code = error.code(), error = %error, "download failed");
                self.emit_event(Event::Failed { id, error: message });
            }
            Err(e) => tracing::debug!(job_id = %id, error = %e, "job already terminal"),
        }
    }
}
