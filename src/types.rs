//! Core types for media-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::utils::truncate_chars;

/// Upper bound on the length of a job's status message, in characters
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Unique identifier for a download job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn get(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Job status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, process not started yet
    Queued,
    /// External tool is running
    Downloading,
    /// Artifact resolved and ready to fetch
    Completed,
    /// Failed with error
    Error,
}

impl JobStatus {
    /// Whether the job can no longer change state
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Lowercase name as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Downloading => "downloading",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable state of one job, as returned by the progress endpoint
///
/// `filepath` is present exactly when `status` is `completed`. Constructors keep
/// `message` within [`MAX_MESSAGE_CHARS`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobRecord {
    /// Current status
    pub status: JobStatus,

    /// Progress percentage (0.0 to 100.0), last value reported by the tool
    pub progress: f64,

    /// Human-readable status line
    pub message: String,

    /// Display name of the artifact (completed jobs only)
    pub filename: Option<String>,

    /// Absolute path of the artifact on the server (completed jobs only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub filepath: Option<PathBuf>,
}

impl JobRecord {
    /// Record for a freshly accepted job
    pub fn queued() -> Self {
        Self {
            status: JobStatus::Queued,
            progress: 0.0,
            message: "queued".into(),
            filename: None,
            filepath: None,
        }
    }

    /// Record for a running job
    pub fn downloading(progress: f64, message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Downloading,
            progress: progress.clamp(0.0, 100.0),
            message: truncate_chars(&message.into(), MAX_MESSAGE_CHARS),
            filename: None,
            filepath: None,
        }
    }

    /// Terminal success record
    pub fn completed(filename: String, filepath: PathBuf, message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Completed,
            progress: 100.0,
            message: truncate_chars(&message.into(), MAX_MESSAGE_CHARS),
            filename: Some(filename),
            filepath: Some(filepath),
        }
    }

    /// Terminal failure record; keeps the last known progress
    pub fn failed(progress: f64, message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Error,
            progress: progress.clamp(0.0, 100.0),
            message: truncate_chars(&message.into(), MAX_MESSAGE_CHARS),
            filename: None,
            filepath: None,
        }
    }
}

/// Outcome of deleting a job's backing file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStatus {
    /// The file existed and was removed
    Deleted,
    /// The job exists but has no file on disk
    NoFile,
    /// Unknown job id
    NotFound,
    /// The file could not be removed
    Error,
}

/// Response body of the cleanup endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CleanupOutcome {
    /// What happened
    pub status: CleanupStatus,

    /// Error detail (status `error` only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CleanupOutcome {
    /// Outcome without a message
    pub fn new(status: CleanupStatus) -> Self {
        Self {
            status,
            message: None,
        }
    }

    /// Failed deletion with a reason
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: CleanupStatus::Error,
            message: Some(message.into()),
        }
    }
}

/// Request body for starting a download
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadRequest {
    /// Media page URL handed to the external tool
    pub url: String,
}

/// Response body for an accepted download
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadStarted {
    /// Id to poll
    pub download_id: JobId,
    /// Always "started"
    pub status: String,
}

impl DownloadStarted {
    /// Response for a newly created job
    pub fn new(download_id: JobId) -> Self {
        Self {
            download_id,
            status: "started".into(),
        }
    }
}

/// Event emitted during the job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job accepted
    Queued {
        /// Job ID
        id: JobId,
        /// Requested URL
        url: String,
    },

    /// Progress or message changed
    Progress {
        /// Job ID
        id: JobId,
        /// Progress percentage (0.0 to 100.0)
        percent: f64,
        /// Current status line
        message: String,
    },

    /// Artifact resolved
    Completed {
        /// Job ID
        id: JobId,
        /// Display name of the file
        filename: String,
        /// Absolute path on the server
        #[schema(value_type = String)]
        path: PathBuf,
        /// File size
        size_bytes: u64,
    },

    /// Job ended in the error state
    Failed {
        /// Job ID
        id: JobId,
        /// Error message
        error: String,
    },

    /// Cleanup was requested for a job
    Cleaned {
        /// Job ID
        id: JobId,
        /// What the cleanup did
        status: CleanupStatus,
    },

    /// Service is shutting down
    Shutdown,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn job_id_parses_and_displays_as_uuid() {
        let id = JobId::new();
        let parsed = JobId::from_str(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
        assert!(JobId::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn job_id_serializes_as_bare_string() {
        let id = JobId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
    }

    #[test]
    fn only_completed_and_error_are_terminal() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Downloading.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Downloading).unwrap(),
            "\"downloading\""
        );
        assert_eq!(JobStatus::Error.to_string(), "error");
    }

    #[test]
    fn queued_record_has_null_filename_and_no_filepath() {
        let json = serde_json::to_value(JobRecord::queued()).unwrap();
        assert_eq!(json["status"], "queued");
        assert_eq!(json["progress"], 0.0);
        assert!(json["filename"].is_null());
        assert!(json.get("filepath").is_none());
    }

    #[test]
    fn completed_record_sets_filepath_and_full_progress() {
        let record = JobRecord::completed(
            "clip.mp4".into(),
            PathBuf::from("/tmp/video_downloader/x_clip.mp4"),
            "download complete",
        );
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.progress, 100.0);
        assert!(record.filepath.is_some());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["filepath"], "/tmp/video_downloader/x_clip.mp4");
        assert_eq!(json["filename"], "clip.mp4");
    }

    #[test]
    fn failed_record_bounds_message_length() {
        let long = "x".repeat(2_000);
        let record = JobRecord::failed(12.5, long);
        assert_eq!(record.message.chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(record.progress, 12.5);
        assert!(record.filepath.is_none());
    }

    #[test]
    fn downloading_record_clamps_progress() {
        assert_eq!(JobRecord::downloading(150.0, "x").progress, 100.0);
        assert_eq!(JobRecord::downloading(-3.0, "x").progress, 0.0);
    }

    #[test]
    fn cleanup_outcome_omits_message_unless_error() {
        let json = serde_json::to_value(CleanupOutcome::new(CleanupStatus::NoFile)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "no_file"}));

        let json = serde_json::to_value(CleanupOutcome::error("permission denied")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "permission denied");
    }

    #[test]
    fn events_are_tagged_by_type() {
        let id = JobId::new();
        let json = serde_json::to_value(Event::Progress {
            id,
            percent: 45.2,
            message: "downloading: 45.2%".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["percent"], 45.2);

        let json = serde_json::to_value(Event::Shutdown).unwrap();
        assert_eq!(json, serde_json::json!({"type": "shutdown"}));
    }
}
