//! External download tool integration
//!
//! The actual media fetching is delegated to yt-dlp. This module wraps it behind
//! a small trait-based seam:
//!
//! - [`MediaTool`]: availability probe and command construction
//! - [`CliMediaTool`]: the yt-dlp implementation (explicit path or PATH lookup)
//! - [`ToolProcess`]: a running child whose stdout and stderr are read as one
//!   line stream with per-read timeouts
//! - [`ProgressState`]: folds output lines into progress, message, filename hint
//!   and error lines
//!
//! ## Usage
//!
//! ```no_run
//! use media_dl::config::ToolConfig;
//! use media_dl::tool::{CliMediaTool, Invocation, MediaTool, ProgressState, ReadEvent, ToolProcess};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tool = CliMediaTool::from_config(&ToolConfig::default());
//!     tool.probe(Duration::from_secs(5)).await?;
//!
//!     let invocation = Invocation {
//!         url: "https://example.com/watch?v=abc".into(),
//!         output_template: "/tmp/video_downloader/job_%(title)s.%(ext)s".into(),
//!         work_dir: "/tmp/video_downloader".into(),
//!     };
//!     let mut process = ToolProcess::spawn(tool.download_command(&invocation))?;
//!     let mut state = ProgressState::default();
//!     while let ReadEvent::Line(line) = process.next_line(Duration::from_secs(5)).await {
//!         state.apply_line(&line);
//!         println!("{:.1}% {}", state.progress, state.message);
//!     }
//!     Ok(())
//! }
//! ```

mod cli;
mod parser;
mod process;
mod traits;

pub use cli::CliMediaTool;
pub use parser::{
    DEFAULT_SUSPICIOUS_SIZE_BYTES, FilenameHint, HintConfidence, ProgressState, SizeToken,
    parse_size_token, summarize_failure,
};
pub use process::{ReadEvent, ToolProcess};
pub use traits::{Invocation, MediaTool};
