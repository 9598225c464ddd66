//! Access to finished artifacts and their removal.

use super::Supervisor;
use crate::error::{Error, Result};
use crate::types::{CleanupOutcome, CleanupStatus, Event, JobId, JobStatus};
use std::path::PathBuf;

/// A completed job's file, ready to be streamed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedFile {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Name offered to the client
    pub filename: String,
    /// Size in bytes at the time of the lookup
    pub size_bytes: u64,
}

impl Supervisor {
    /// Look up the artifact of a completed job
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for an unknown job
    /// - [`Error::InvalidState`] if the job has not completed
    /// - [`Error::FileMissing`] if the file is gone (cleaned up or reaped)
    pub async fn completed_file(&self, id: JobId) -> Result<CompletedFile> {
        let record = self.store.get(id).await?;

        let (JobStatus::Completed, Some(path)) = (record.status, record.filepath) else {
            return Err(Error::InvalidState {
                id: id.to_string(),
                operation: "fetch file of".into(),
                current_state: record.status.to_string(),
            });
        };

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Err(Error::FileMissing { id: id.to_string(), path }),
        };

        Ok(CompletedFile {
            path,
            filename: record.filename.unwrap_or_else(|| "video.mp4".to_string()),
            size_bytes: metadata.len(),
        })
    }

    /// Delete the file backing a job
    ///
    /// Idempotent and best-effort: a second call reports `no_file`, and a failed
    /// deletion is reported rather than raised. The job record itself is kept.
    pub async fn cleanup(&self, id: JobId) -> CleanupOutcome {
        let record = match self.store.get(id).await {
            Ok(record) => record,
            Err(_) => return CleanupOutcome::new(CleanupStatus::NotFound),
        };

        let outcome = match record.filepath {
            Some(path) => match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::info!(job_id = %id, ?path, "deleted downloaded file");
                    CleanupOutcome::new(CleanupStatus::Deleted)
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    CleanupOutcome::new(CleanupStatus::NoFile)
                }
                Err(e) => {
                    tracing::warn!(job_id = %id, ?path, error = %e, "failed to delete file");
                    CleanupOutcome::error(e.to_string())
                }
            },
            None => CleanupOutcome::new(CleanupStatus::NoFile),
        };

        self.emit_event(Event::Cleaned {
            id,
            status: outcome.status,
        });
        outcome
    }
}
