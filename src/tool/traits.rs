//! Traits and types for the external download tool

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

/// Everything needed to start one download
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Media page URL
    pub url: String,
    /// Output template handed to the tool (`<work_dir>/<job_id>_%(title)s.%(ext)s`)
    pub output_template: String,
    /// Working directory of the child process
    pub work_dir: PathBuf,
}

/// Trait for the external media download tool
///
/// The supervisor only talks to the tool through this trait, so a job can be
/// driven by any executable that prints yt-dlp style progress lines.
///
/// # Examples
///
/// ```no_run
/// use media_dl::config::ToolConfig;
/// use media_dl::tool::{CliMediaTool, MediaTool};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let tool = CliMediaTool::from_config(&ToolConfig::default());
/// let version = tool.probe(Duration::from_secs(5)).await?;
/// println!("{} {}", tool.name(), version);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Check that the tool is installed and runnable
    ///
    /// # Returns
    ///
    /// The version string reported by the tool.
    ///
    /// # Errors
    ///
    /// Returns `Error::ExternalTool` if the binary cannot be started, exits with a
    /// non-zero status, or does not answer within `timeout`.
    async fn probe(&self, timeout: Duration) -> crate::Result<String>;

    /// Build the command for a download
    ///
    /// Stdio is left unconfigured; the caller decides how output is captured.
    fn download_command(&self, invocation: &Invocation) -> Command;

    /// Human-readable name for logging and error messages
    fn name(&self) -> &str;

    /// Remediation shown when the tool is unavailable
    fn install_hint(&self) -> &str;
}
