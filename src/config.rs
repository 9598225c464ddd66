//! Configuration types for media-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};

/// External tool settings (binary discovery and invocation)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Explicit path to the downloader binary (auto-detected if None)
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Binary name looked up in PATH (default: "yt-dlp")
    #[serde(default = "default_binary_name")]
    pub binary_name: String,

    /// Whether to search PATH when `binary_path` is not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Arguments placed before every invocation, e.g. `["-m", "yt_dlp"]` with a
    /// `python3` binary
    #[serde(default)]
    pub base_args: Vec<String>,

    /// Format selector passed with `-f`
    #[serde(default = "default_format")]
    pub format: String,

    /// Container used when merging separate video and audio streams (default: "mp4")
    #[serde(default = "default_merge_output_format")]
    pub merge_output_format: String,

    /// Value for `--extractor-args` (None = not passed)
    #[serde(default = "default_extractor_args")]
    pub extractor_args: Option<String>,

    /// Additional arguments appended before the URL
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Remediation shown when the tool is unavailable
    #[serde(default = "default_install_hint")]
    pub install_hint: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            binary_name: default_binary_name(),
            search_path: true,
            base_args: Vec::new(),
            format: default_format(),
            merge_output_format: default_merge_output_format(),
            extractor_args: default_extractor_args(),
            extra_args: Vec::new(),
            install_hint: default_install_hint(),
        }
    }
}

/// Timing thresholds for supervising a download process
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Upper bound for the `--version` availability probe (default: 5s)
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub probe_timeout: Duration,

    /// Upper bound for a single read of the output stream (default: 5s)
    #[serde(default = "default_read_timeout", with = "duration_serde")]
    pub read_timeout: Duration,

    /// Kill the process after this long without output (default: 30s)
    #[serde(default = "default_stall_timeout", with = "duration_serde")]
    pub stall_timeout: Duration,

    /// Pause after exit before inspecting the working directory (default: 2000ms)
    #[serde(default = "default_settle_delay", with = "millis_serde")]
    pub settle_delay: Duration,

    /// How long shutdown waits for running jobs (default: 30s)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            probe_timeout: default_probe_timeout(),
            read_timeout: default_read_timeout(),
            stall_timeout: default_stall_timeout(),
            settle_delay: default_settle_delay(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Validation policy for produced files
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Files below this size are rejected (default: 1 MiB)
    #[serde(default = "default_min_size_bytes")]
    pub min_size_bytes: u64,

    /// Reported sizes below this are flagged in the progress message (default: 1000 KiB)
    #[serde(default = "default_suspicious_size_bytes")]
    pub suspicious_size_bytes: u64,

    /// Number of leading bytes inspected for HTML signatures (default: 1024)
    #[serde(default = "default_sniff_bytes")]
    pub sniff_bytes: usize,

    /// Extensions that are never media (compared case-insensitively)
    #[serde(default = "default_disallowed_extensions")]
    pub disallowed_extensions: Vec<String>,

    /// Extensions accepted as media containers without renaming
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,

    /// Extension given to files that carry none of `media_extensions` (default: "mp4")
    #[serde(default = "default_canonical_extension")]
    pub canonical_extension: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            min_size_bytes: default_min_size_bytes(),
            suspicious_size_bytes: default_suspicious_size_bytes(),
            sniff_bytes: default_sniff_bytes(),
            disallowed_extensions: default_disallowed_extensions(),
            media_extensions: default_media_extensions(),
            canonical_extension: default_canonical_extension(),
        }
    }
}

/// Working storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory receiving all job files (default: `<system temp>/video_downloader`)
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Stale file reaper
    #[serde(default)]
    pub reaper: ReaperConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            reaper: ReaperConfig::default(),
        }
    }
}

/// Periodic removal of files nobody cleaned up
///
/// Disabled by default: finished files stay in the working directory until a
/// client calls the cleanup endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// Enable the reaper (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Time between sweeps (default: 600s)
    #[serde(default = "default_reaper_interval", with = "duration_serde")]
    pub interval: Duration,

    /// Files older than this are deleted (default: 3600s)
    #[serde(default = "default_reaper_max_age", with = "duration_serde")]
    pub max_age: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: default_reaper_interval(),
            max_age: default_reaper_max_age(),
        }
    }
}

/// API and external server integration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,

    /// Directory with the browser UI (`index.html`, assets under `/static`)
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
            static_dir: None,
        }
    }
}

/// Main configuration for the download service
///
/// Every field has a default, so an empty JSON object is a valid configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// External downloader binary and arguments
    #[serde(default)]
    pub tool: ToolConfig,

    /// Timeouts for supervising the process
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Artifact validation policy
    #[serde(default)]
    pub artifact: ArtifactConfig,

    /// Working directory and reaper
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file '{}': {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Working directory for job files
    pub fn work_dir(&self) -> &PathBuf {
        &self.storage.work_dir
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let supervisor = &self.supervisor;
        for (key, value) in [
            ("supervisor.probe_timeout", supervisor.probe_timeout),
            ("supervisor.read_timeout", supervisor.read_timeout),
            ("supervisor.stall_timeout", supervisor.stall_timeout),
        ] {
            if value.is_zero() {
                return Err(config_error(key, "must be greater than zero"));
            }
        }

        if supervisor.read_timeout >= supervisor.stall_timeout {
            return Err(config_error(
                "supervisor.read_timeout",
                "must be shorter than supervisor.stall_timeout",
            ));
        }

        if self.artifact.min_size_bytes == 0 {
            return Err(config_error(
                "artifact.min_size_bytes",
                "must be greater than zero",
            ));
        }

        if self.artifact.canonical_extension.trim().is_empty() {
            return Err(config_error("artifact.canonical_extension", "must not be empty"));
        }

        if self.storage.reaper.enabled && self.storage.reaper.interval.is_zero() {
            return Err(config_error(
                "storage.reaper.interval",
                "must be greater than zero when the reaper is enabled",
            ));
        }

        Ok(())
    }
}

fn config_error(key: &str, message: &str) -> Error {
    Error::Config {
        message: format!("{key} {message}"),
        key: Some(key.to_string()),
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_binary_name() -> String {
    "yt-dlp".into()
}

fn default_format() -> String {
    // Prefer a single mp4, then separate mp4 video + m4a audio, then anything
    "best[ext=mp4]/bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".into()
}

fn default_merge_output_format() -> String {
    "mp4".into()
}

fn default_extractor_args() -> Option<String> {
    Some("youtube:player_client=android".into())
}

fn default_install_hint() -> String {
    "Install it: pip install yt-dlp".into()
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_stall_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_min_size_bytes() -> u64 {
    1024 * 1024 // 1 MiB
}

fn default_suspicious_size_bytes() -> u64 {
    1000 * 1024
}

fn default_sniff_bytes() -> usize {
    1024
}

fn default_disallowed_extensions() -> Vec<String> {
    vec![
        "html".into(),
        "htm".into(),
        "mhtml".into(),
        "txt".into(),
        "json".into(),
        "xml".into(),
        "webarchive".into(),
    ]
}

fn default_media_extensions() -> Vec<String> {
    vec!["mp4".into(), "webm".into(), "mkv".into(), "m4v".into()]
}

fn default_canonical_extension() -> String {
    "mp4".into()
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("video_downloader")
}

fn default_reaper_interval() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_reaper_max_age() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
