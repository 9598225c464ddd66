//! Error types for media-dl
//!
//! This module provides error handling for the library, including:
//! - The crate-wide [`Error`] used by the store, supervisor and API layer
//! - [`ResolveError`] for artifact resolution failures
//! - [`JobError`], the taxonomy of terminal job failures surfaced through polling
//! - HTTP status code mapping and structured error bodies for the API

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "supervisor.read_timeout")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Job or resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not allowed in the job's current state
    #[error("cannot {operation} job {id} in state {current_state}")]
    InvalidState {
        /// The job ID
        id: String,
        /// The operation that was attempted (e.g., "update", "fetch file of")
        operation: String,
        /// The state that prevents the operation
        current_state: String,
    },

    /// A completed job's artifact is no longer on disk
    #[error("file for job {id} not found at {path}")]
    FileMissing {
        /// The job ID
        id: String,
        /// Where the artifact was expected
        path: PathBuf,
    },

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// External tool could not be executed
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// Reasons the artifact resolver rejected a finished download
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No candidate file survived validation
    #[error("file not found after download. {details}")]
    NotFound {
        /// Diagnostics: filename hint, directory listing
        details: String,
    },

    /// The candidate file is smaller than the configured minimum
    #[error(
        "downloaded file is too small ({:.2} MiB); metadata was probably fetched instead of the media",
        as_mib(.size)
    )]
    TooSmall {
        /// The rejected file (already deleted)
        path: PathBuf,
        /// Its size in bytes
        size: u64,
    },

    /// The candidate file is an HTML/text document rather than media
    #[error(
        "downloaded file has the wrong type ({extension}); probably an HTML page instead of the media"
    )]
    WrongType {
        /// The rejected file (already deleted)
        path: PathBuf,
        /// Its extension, or "unknown"
        extension: String,
    },
}

/// Terminal failure of a download job
///
/// Every variant ends the job in the `error` state; the `Display` text becomes the
/// job's message.
#[derive(Debug, Error)]
pub enum JobError {
    /// The external tool is missing or does not answer the version probe
    #[error("{tool} was not found or is not runnable. {hint}")]
    ToolUnavailable {
        /// Tool name
        tool: String,
        /// Remediation hint shown to the user
        hint: String,
    },

    /// The tool produced no output for longer than the stall threshold
    #[error("stalled: the download process produced no output for more than {} seconds", as_secs(.idle))]
    Stalled {
        /// The threshold that was exceeded
        idle: Duration,
    },

    /// The tool exited with a non-zero status
    #[error("download failed: {summary}")]
    ProcessFailed {
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Summary of the captured diagnostics
        summary: String,
    },

    /// Tool exited successfully but no artifact could be located
    #[error("{0}")]
    ArtifactNotFound(String),

    /// The artifact is below the minimum size
    #[error("{0}")]
    ArtifactTooSmall(String),

    /// The artifact is not a media file
    #[error("{0}")]
    ArtifactWrongType(String),

    /// The job was cancelled because the service is shutting down
    #[error("cancelled: the service is shutting down")]
    Cancelled,

    /// Unexpected fault while orchestrating the job
    #[error("internal error: {0}")]
    InternalFault(String),
}

fn as_mib(bytes: &u64) -> f64 {
    *bytes as f64 / (1024.0 * 1024.0)
}

fn as_secs(duration: &Duration) -> u64 {
    duration.as_secs()
}

impl From<ResolveError> for JobError {
    fn from(error: ResolveError) -> Self {
        let message = error.to_string();
        match error {
            ResolveError::NotFound { .. } => JobError::ArtifactNotFound(message),
            ResolveError::TooSmall { .. } => JobError::ArtifactTooSmall(message),
            ResolveError::WrongType { .. } => JobError::ArtifactWrongType(message),
        }
    }
}

impl JobError {
    /// Machine-readable code for this failure
    pub fn code(&self) -> &'static str {
        match self {
            JobError::ToolUnavailable { .. } => "tool_unavailable",
            JobError::Stalled { .. } => "stalled",
            JobError::ProcessFailed { .. } => "process_failed",
            JobError::ArtifactNotFound(_) => "artifact_not_found",
            JobError::ArtifactTooSmall(_) => "artifact_too_small",
            JobError::ArtifactWrongType(_) => "artifact_wrong_type",
            JobError::Cancelled => "cancelled",
            JobError::InternalFault(_) => "internal_fault",
        }
    }
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "invalid_state",
///     "message": "cannot fetch file of job 6f1c... in state downloading",
///     "details": { "download_id": "6f1c...", "current_state": "downloading" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "invalid_state")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::Config { .. } => 400,
            Error::InvalidState { .. } => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::FileMissing { .. } => 404,

            // 500 Internal Server Error
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
            Error::ExternalTool(_) => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::InvalidState { .. } => "invalid_state",
            Error::FileMissing { .. } => "file_not_found",
            Error::ShuttingDown => "shutting_down",
            Error::ExternalTool(_) => "external_tool_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::InvalidState {
                id, current_state, ..
            } => Some(serde_json::json!({
                "download_id": id,
                "current_state": current_state,
            })),
            Error::FileMissing { id, path } => Some(serde_json::json!({
                "download_id": id,
                "path": path,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(Error, u16, &'static str)> {
        vec![
            (
                Error::Config {
                    message: "bad value".into(),
                    key: Some("supervisor.read_timeout".into()),
                },
                400,
                "config_error",
            ),
            (
                Error::Io(std::io::Error::other("disk on fire")),
                500,
                "io_error",
            ),
            (Error::NotFound("job abc".into()), 404, "not_found"),
            (
                Error::InvalidState {
                    id: "abc".into(),
                    operation: "fetch file of".into(),
                    current_state: "downloading".into(),
                },
                400,
                "invalid_state",
            ),
            (
                Error::FileMissing {
                    id: "abc".into(),
                    path: PathBuf::from("/tmp/video_downloader/abc_x.mp4"),
                },
                404,
                "file_not_found",
            ),
            (Error::ShuttingDown, 503, "shutting_down"),
            (
                Error::ExternalTool("yt-dlp missing".into()),
                503,
                "external_tool_error",
            ),
            (
                Error::ApiServerError("bind failed".into()),
                500,
                "api_server_error",
            ),
        ]
    }

    #[test]
    fn every_variant_maps_to_expected_status_and_code() {
        for (error, status, code) in all_error_variants() {
            assert_eq!(error.status_code(), status, "status for {error:?}");
            assert_eq!(error.error_code(), code, "code for {error:?}");
        }
    }

    #[test]
    fn invalid_state_is_400_for_file_fetch_before_completion() {
        let error = Error::InvalidState {
            id: "abc".into(),
            operation: "fetch file of".into(),
            current_state: "downloading".into(),
        };
        assert_eq!(error.status_code(), 400);
        assert_eq!(
            error.to_string(),
            "cannot fetch file of job abc in state downloading"
        );
    }

    #[test]
    fn api_error_from_invalid_state_has_details() {
        let error = Error::InvalidState {
            id: "abc".into(),
            operation: "fetch file of".into(),
            current_state: "queued".into(),
        };
        let api_error: ApiError = error.into();

        assert_eq!(api_error.error.code, "invalid_state");
        let details = api_error.error.details.unwrap();
        assert_eq!(details["download_id"], "abc");
        assert_eq!(details["current_state"], "queued");
    }

    #[test]
    fn api_error_from_file_missing_has_path() {
        let error = Error::FileMissing {
            id: "abc".into(),
            path: PathBuf::from("/tmp/x.mp4"),
        };
        let api_error: ApiError = error.into();
        let details = api_error.error.details.unwrap();
        assert_eq!(details["path"], "/tmp/x.mp4");
    }

    #[test]
    fn api_error_without_details_omits_field_in_json() {
        let api_error: ApiError = Error::ShuttingDown.into();
        let json = serde_json::to_value(&api_error).unwrap();
        assert!(json["error"].get("details").is_none());
        assert_eq!(json["error"]["code"], "shutting_down");
    }

    #[test]
    fn resolve_errors_map_to_distinct_job_errors() {
        let not_found: JobError = ResolveError::NotFound {
            details: "directory is empty".into(),
        }
        .into();
        let too_small: JobError = ResolveError::TooSmall {
            path: PathBuf::from("a.mp4"),
            size: 512 * 1024,
        }
        .into();
        let wrong_type: JobError = ResolveError::WrongType {
            path: PathBuf::from("a.html"),
            extension: "html".into(),
        }
        .into();

        assert_eq!(not_found.code(), "artifact_not_found");
        assert_eq!(too_small.code(), "artifact_too_small");
        assert_eq!(wrong_type.code(), "artifact_wrong_type");

        assert!(not_found.to_string().contains("directory is empty"));
        assert!(too_small.to_string().contains("0.50 MiB"));
        assert!(wrong_type.to_string().contains("(html)"));
    }

    #[test]
    fn stalled_message_mentions_threshold() {
        let error = JobError::Stalled {
            idle: Duration::from_secs(30),
        };
        let message = error.to_string();
        assert!(message.starts_with("stalled"));
        assert!(message.contains("30 seconds"));
    }

    #[test]
    fn tool_unavailable_carries_hint() {
        let error = JobError::ToolUnavailable {
            tool: "yt-dlp".into(),
            hint: "Install it: pip install yt-dlp".into(),
        };
        assert_eq!(
            error.to_string(),
            "yt-dlp was not found or is not runnable. Install it: pip install yt-dlp"
        );
    }
}
