//! Parser for yt-dlp console output
//!
//! The tool prints free-form, line-oriented text. [`ProgressState::apply_line`]
//! folds one line at a time into a progress record; malformed or unrecognized lines
//! leave the record untouched.

use crate::utils::truncate_chars;
use regex::Regex;
use std::sync::OnceLock;

/// Maximum length of an error line surfaced as the status message
const ERROR_MESSAGE_CHARS: usize = 100;

/// Maximum length of an informational line surfaced as the status message
const INFO_MESSAGE_CHARS: usize = 80;

/// Maximum length of a failure summary
const FAILURE_SUMMARY_CHARS: usize = 300;

/// Number of trailing error lines considered by [`summarize_failure`]
const SUMMARY_ERROR_LINES: usize = 5;

/// Number of trailing output lines considered when no error lines were seen
const SUMMARY_TAIL_LINES: usize = 10;

/// Default threshold below which a reported size is suspicious (1000 KiB)
pub const DEFAULT_SUSPICIOUS_SIZE_BYTES: u64 = 1000 * 1024;

/// Container extensions accepted in filename markers that carry no path delimiter
const MARKER_MEDIA_EXTENSIONS: &str = "mp4|webm|mkv|m4a|m4v";

/// How much a filename marker can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HintConfidence {
    /// A sidecar write (metadata JSON); never the media itself
    Sidecar,
    /// Intermediate output (a single format stream)
    Tentative,
    /// The file the tool reports as its end product
    Final,
}

/// Output filename reported by the tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameHint {
    /// Path as printed, absolute or relative to the working directory
    pub path: String,
    /// Marker strength
    pub confidence: HintConfidence,
}

/// Progress record updated line by line
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Last percentage seen (0.0 to 100.0)
    pub progress: f64,
    /// Current human-readable status line
    pub message: String,
    /// Best filename marker seen so far
    pub filename: Option<FilenameHint>,
    /// Every line recognized as an error, in order
    pub error_lines: Vec<String>,
    suspicious_size_bytes: u64,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new(DEFAULT_SUSPICIOUS_SIZE_BYTES)
    }
}

impl ProgressState {
    /// Create an empty record
    ///
    /// # Arguments
    ///
    /// * `suspicious_size_bytes` - Reported sizes below this are flagged in the message
    pub fn new(suspicious_size_bytes: u64) -> Self {
        Self {
            progress: 0.0,
            message: String::new(),
            filename: None,
            error_lines: Vec::new(),
            suspicious_size_bytes,
        }
    }

    /// The filename hint as a plain path string
    pub fn filename_hint(&self) -> Option<&str> {
        self.filename.as_ref().map(|hint| hint.path.as_str())
    }

    /// Fold one line of output into the record
    ///
    /// Filename markers are extracted from every line. The remaining rules are
    /// tried in order and the first match decides the message: percentage, phase
    /// marker, error, warning (ignored), informational allowlist.
    pub fn apply_line(&mut self, raw: &str) {
        let line = raw.trim();
        if line.is_empty() {
            return;
        }

        if let Some(hint) = extract_filename(line) {
            self.offer_filename(hint);
        }

        if let Some(percent) = parse_percent(line) {
            self.progress = percent;
            self.message = self.progress_message(line, percent);
            return;
        }

        if line.contains("[Merger]") {
            self.message = "merging video and audio...".into();
            return;
        }

        if line.contains("[ExtractAudio]") {
            self.message = "processing audio...".into();
            return;
        }

        if line.to_lowercase().contains("error") {
            self.message = format!("error: {}", truncate_chars(line, ERROR_MESSAGE_CHARS));
            self.error_lines.push(line.to_string());
            return;
        }

        if line.to_uppercase().contains("WARNING") {
            return;
        }

        let tagged = ["[download]", "[Merger]", "[ExtractAudio]"]
            .iter()
            .any(|tag| line.contains(tag));
        let informational = ["Extracting", "Downloading", "Merging"]
            .iter()
            .any(|word| line.contains(word));
        if !tagged && informational {
            self.message = truncate_chars(line, INFO_MESSAGE_CHARS);
        }
    }

    /// Keep the first hint of the strongest confidence seen so far
    fn offer_filename(&mut self, hint: FilenameHint) {
        let replace = match &self.filename {
            None => true,
            Some(current) => hint.confidence > current.confidence,
        };
        if replace {
            self.filename = Some(hint);
        }
    }

    fn progress_message(&self, line: &str, percent: f64) -> String {
        let mut message = match parse_size_token(line) {
            Some(size) if size.bytes < self.suspicious_size_bytes as f64 => format!(
                "warning: small file ({}) at {:.1}%, this may not be the full video",
                size.text, percent
            ),
            Some(size) => format!("downloading: {:.1}% ({})", percent, size.text),
            None => format!("downloading: {:.1}%", percent),
        };

        let lower = line.to_lowercase();
        if lower.contains("frag") && (line.contains("of ~") || line.contains("ETA Unknown")) {
            message.push_str(" [HLS fragments]");
        }
        message
    }
}

/// Size token found next to a percentage
#[derive(Debug, Clone, PartialEq)]
pub struct SizeToken {
    /// Token as printed, without the approximation marker (e.g. "10.00MiB")
    pub text: String,
    /// Size in bytes
    pub bytes: f64,
}

/// Find an `of [~]<number><unit>` token and convert it to bytes
///
/// Units `K`, `M`, `G`, `T` are binary multiples whether written bare, with `iB`
/// or with `B`; a bare `B` means bytes.
pub fn parse_size_token(line: &str) -> Option<SizeToken> {
    let captures = size_pattern().captures(line)?;
    let number = captures.get(1)?.as_str();
    let unit = captures.get(2)?.as_str();
    let value: f64 = number.parse().ok()?;

    let multiplier = match unit.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('K') => 1024.0,
        Some('M') => 1024.0 * 1024.0,
        Some('G') => 1024.0 * 1024.0 * 1024.0,
        Some('T') => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    };

    Some(SizeToken {
        text: format!("{number}{unit}"),
        bytes: value * multiplier,
    })
}

/// First `<number>%` token, clamped to 0..=100
fn parse_percent(line: &str) -> Option<f64> {
    let captures = percent_pattern().captures(line)?;
    let value: f64 = captures.get(1)?.as_str().parse().ok()?;
    value.is_finite().then(|| value.clamp(0.0, 100.0))
}

fn extract_filename(line: &str) -> Option<FilenameHint> {
    let final_hint = |path: &str| FilenameHint {
        path: path.trim().trim_matches('"').trim().to_string(),
        confidence: HintConfidence::Final,
    };
    let tentative_hint = |path: &str| FilenameHint {
        path: path.trim().trim_matches('"').trim().to_string(),
        confidence: HintConfidence::Tentative,
    };
    let sidecar_hint = |path: &str| FilenameHint {
        path: path.trim().trim_matches('"').trim().to_string(),
        confidence: HintConfidence::Sidecar,
    };

    let hint = if let Some(captures) = merging_pattern().captures(line) {
        final_hint(captures.get(1)?.as_str())
    } else if let Some(captures) = already_downloaded_pattern().captures(line) {
        final_hint(captures.get(1)?.as_str())
    } else if let Some(captures) = destination_pattern().captures(line) {
        tentative_hint(captures.get(1)?.as_str())
    } else if let Some(captures) = metadata_pattern().captures(line) {
        sidecar_hint(captures.get(1)?.as_str())
    } else if line.contains("Post-process file") || line.contains("has been downloaded") {
        tentative_hint(media_path_pattern().captures(line)?.get(1)?.as_str())
    } else {
        return None;
    };

    (!hint.path.is_empty()).then_some(hint)
}

/// Condense the diagnostics of a failed run into one message
///
/// Uses the last few error lines, or the tail of the output when the tool printed
/// no error lines. When the text mentions an error, the first `ERROR: ...` message
/// is preferred, falling back to the first line.
///
/// # Arguments
///
/// * `error_lines` - Lines classified as errors by [`ProgressState::apply_line`]
/// * `tail` - Most recent output lines, oldest first
pub fn summarize_failure(error_lines: &[String], tail: &[String]) -> String {
    let text = if !error_lines.is_empty() {
        last_lines(error_lines, SUMMARY_ERROR_LINES)
    } else if !tail.is_empty() {
        last_lines(tail, SUMMARY_TAIL_LINES)
    } else {
        return "unknown error during download".into();
    };

    let summary = if text.to_uppercase().contains("ERROR") {
        match error_message_pattern()
            .captures(&text)
            .and_then(|captures| captures.get(1))
        {
            Some(message) => message.as_str().trim().to_string(),
            None => text.lines().next().unwrap_or_default().to_string(),
        }
    } else {
        text
    };

    truncate_chars(&summary, FAILURE_SUMMARY_CHARS)
}

fn last_lines(lines: &[String], count: usize) -> String {
    lines[lines.len().saturating_sub(count)..].join("\n")
}

// The patterns below are literals; compilation cannot fail at runtime.

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("literal regex pattern is valid")
}

fn percent_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compile(r"(\d+(?:\.\d+)?)%"))
}

fn size_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compile(r"(?i)\bof\s+~?\s*(\d+(?:\.\d+)?)\s?([KMGT](?:iB|B)?|B)\b"))
}

fn destination_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compile(r"Destination:\s*(.+)$"))
}

fn merging_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compile(r#"Merging formats into\s+"?([^"]+)"?\s*$"#))
}

fn already_downloaded_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        compile(&format!(
            r"\[download\]\s*(.+\.(?i:{MARKER_MEDIA_EXTENSIONS}))\s+has already been downloaded"
        ))
    })
}

fn metadata_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compile(r"Writing (?:video )?metadata.*?\bto:?\s+(.+)$"))
}

fn media_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        compile(&format!(
            r#""?(\S+\.(?i:{MARKER_MEDIA_EXTENSIONS}))"?"#
        ))
    })
}

fn error_message_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compile(r"(?i)ERROR:\s*([^\n]+)"))
}
