//! # media-dl
//!
//! Local HTTP service that supervises yt-dlp downloads.
//!
//! A client posts a media URL and gets a job id back immediately. The download
//! runs as a supervised subprocess whose output is parsed into a progress record
//! the client polls. When the tool exits, the produced file is located, validated
//! (size, content type, naming) and offered for download until the client asks for
//! it to be cleaned up.
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let supervisor = Supervisor::new(Config::default()).await?;
//!
//!     let id = supervisor.submit("https://example.com/watch?v=abc123").await?;
//!
//!     // Subscribe to events instead of polling
//!     let mut events = supervisor.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//!
//!     println!("{:?}", supervisor.progress(id).await?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Locating and validating downloaded files
pub mod artifact;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// In-memory job state
pub mod store;
/// Job supervision (decomposed into focused submodules)
pub mod supervisor;
/// External download tool: invocation, process handling, output parsing
pub mod tool;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use artifact::{Artifact, ArtifactResolver};
pub use config::Config;
pub use error::{ApiError, Error, ErrorDetail, JobError, ResolveError, Result, ToHttpStatus};
pub use store::JobStore;
pub use supervisor::{CompletedFile, Supervisor};
pub use tool::{CliMediaTool, MediaTool, ProgressState};
pub use types::{
    CleanupOutcome, CleanupStatus, DownloadRequest, DownloadStarted, Event, JobId, JobRecord,
    JobStatus,
};

/// Helper function to run the supervisor with graceful signal handling.
///
/// Waits for a termination signal and then calls the supervisor's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use media_dl::{Config, Supervisor, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let supervisor = Supervisor::new(Config::default()).await?;
///     let _api = supervisor.spawn_api_server();
///
///     // Run with automatic signal handling
///     run_with_shutdown(&supervisor).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(supervisor: &Supervisor) -> Result<()> {
    wait_for_signal().await;
    supervisor.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
