//! CLI-based media tool using the external yt-dlp binary

use super::traits::{Invocation, MediaTool};
use crate::config::ToolConfig;
use crate::error::Error;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// CLI-based media tool
///
/// Runs the configured binary (yt-dlp by default) with a fixed set of flags: best
/// video and audio merged into one container, no playlists, no sidecar files, one
/// progress line per update.
///
/// # Examples
///
/// ```no_run
/// use media_dl::config::ToolConfig;
/// use media_dl::tool::CliMediaTool;
/// use std::path::PathBuf;
///
/// // Explicit binary
/// let tool = CliMediaTool::new(PathBuf::from("/usr/local/bin/yt-dlp"), ToolConfig::default());
///
/// // Or resolve from configuration (explicit path, then PATH lookup)
/// let tool = CliMediaTool::from_config(&ToolConfig::default());
/// ```
#[derive(Debug, Clone)]
pub struct CliMediaTool {
    binary_path: PathBuf,
    config: ToolConfig,
}

impl CliMediaTool {
    /// Create a tool with an explicit binary path
    pub fn new(binary_path: PathBuf, config: ToolConfig) -> Self {
        Self {
            binary_path,
            config,
        }
    }

    /// Attempt to find the binary in PATH
    ///
    /// # Returns
    ///
    /// `Some(CliMediaTool)` if the binary is found, `None` otherwise.
    pub fn from_path(config: &ToolConfig) -> Option<Self> {
        which::which(&config.binary_name)
            .ok()
            .map(|path| Self::new(path, config.clone()))
    }

    /// Resolve the binary from configuration
    ///
    /// Uses `binary_path` when set, otherwise searches PATH (if enabled). When
    /// nothing is found the bare binary name is kept so the availability probe
    /// reports the problem per job instead of at startup.
    pub fn from_config(config: &ToolConfig) -> Self {
        if let Some(path) = &config.binary_path {
            return Self::new(path.clone(), config.clone());
        }

        if config.search_path
            && let Some(tool) = Self::from_path(config)
        {
            return tool;
        }

        tracing::warn!(
            binary = %config.binary_name,
            "download tool not found in PATH, jobs will fail until it is installed"
        );
        Self::new(PathBuf::from(&config.binary_name), config.clone())
    }

    /// Path of the binary that will be executed
    pub fn binary_path(&self) -> &PathBuf {
        &self.binary_path
    }

    /// Arguments for a download, in order
    ///
    /// The URL always comes last, after `--`, so it can never be read as an option.
    pub fn download_args(&self, invocation: &Invocation) -> Vec<String> {
        let config = &self.config;
        let mut args = config.base_args.clone();

        args.extend([
            "-f".to_string(),
            config.format.clone(),
            "--merge-output-format".to_string(),
            config.merge_output_format.clone(),
            "--no-playlist".to_string(),
            "--no-write-info-json".to_string(),
            "--no-write-thumbnail".to_string(),
            "--no-write-description".to_string(),
            "--no-write-annotations".to_string(),
            "--no-download-archive".to_string(),
        ]);

        if let Some(extractor_args) = &config.extractor_args {
            args.push("--extractor-args".to_string());
            args.push(extractor_args.clone());
        }

        args.extend([
            "--no-part".to_string(),
            "--no-mtime".to_string(),
            "-o".to_string(),
            invocation.output_template.clone(),
            "--progress".to_string(),
            "--newline".to_string(),
            "--no-warnings".to_string(),
        ]);

        args.extend(config.extra_args.iter().cloned());
        args.push("--".to_string());
        args.push(invocation.url.clone());
        args
    }
}

#[async_trait]
impl MediaTool for CliMediaTool {
    async fn probe(&self, timeout: Duration) -> crate::Result<String> {
        let mut command = Command::new(&self.binary_path);
        command
            .args(&self.config.base_args)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| {
                Error::ExternalTool(format!(
                    "{} --version timed out after {:?}",
                    self.config.binary_name, timeout
                ))
            })?
            .map_err(|e| {
                Error::ExternalTool(format!(
                    "failed to execute {}: {}",
                    self.binary_path.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(Error::ExternalTool(format!(
                "{} --version exited with {}",
                self.config.binary_name, output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        Ok(version)
    }

    fn download_command(&self, invocation: &Invocation) -> Command {
        let mut command = Command::new(&self.binary_path);
        command
            .args(self.download_args(invocation))
            .current_dir(&invocation.work_dir)
            .kill_on_drop(true);
        command
    }

    fn name(&self) -> &str {
        &self.config.binary_name
    }

    fn install_hint(&self) -> &str {
        &self.config.install_hint
    }
}
