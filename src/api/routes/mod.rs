//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`jobs`] - Start, poll, fetch and clean up downloads
//! - [`system`] - Health, events, OpenAPI

use crate::error::Error;
use crate::types::JobId;

mod jobs;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use jobs::*;
pub use system::*;

/// Parse a job id from a path segment
///
/// A malformed id cannot name an existing job, so it is reported as not found.
pub(crate) fn parse_job_id(raw: &str) -> Result<JobId, Error> {
    raw.parse()
        .map_err(|_| Error::NotFound(format!("download {raw}")))
}
