//! Candidate discovery, validation and best-effort removal

use crate::config::ArtifactConfig;
use crate::types::JobId;
use crate::utils::extension_lowercase;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Byte signatures of HTML and MHTML documents, lowercase
const HTML_SIGNATURES: &[&[u8]] = &[b"<!doctype", b"<html", b"content-type: multipart/related"];

/// A regular file that may be the job's artifact
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub path: PathBuf,
    pub size: u64,
    /// Creation time, or modification time where the filesystem has none
    pub created: SystemTime,
}

impl Candidate {
    pub(crate) async fn stat(path: &Path) -> Option<Self> {
        let metadata = fs::metadata(path).await.ok()?;
        if !metadata.is_file() {
            return None;
        }
        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .unwrap_or(UNIX_EPOCH);
        Some(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            created,
        })
    }

    pub(crate) fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Why a candidate cannot be the artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Rejection {
    /// Extension is on the disallowed list
    DisallowedExtension(String),
    /// Content starts like an HTML or MHTML page
    HtmlContent,
    /// Below the minimum size
    TooSmall(u64),
}

/// Regular files in `dir`, unordered
pub(crate) async fn list_files(dir: &Path) -> Vec<Candidate> {
    let mut files = Vec::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(?dir, error = %e, "cannot read working directory");
            return files;
        }
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                if let Some(candidate) = Candidate::stat(&entry.path()).await {
                    files.push(candidate);
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(?dir, error = %e, "error while listing working directory");
                break;
            }
        }
    }
    files
}

/// Check a candidate against the type and size policy
///
/// Extension is checked first, then size, then content. A file that cannot be read
/// for sniffing is not rejected on content grounds.
pub(crate) async fn check(config: &ArtifactConfig, candidate: &Candidate) -> Option<Rejection> {
    if let Some(extension) = disallowed_extension(config, &candidate.path) {
        return Some(Rejection::DisallowedExtension(extension));
    }
    if candidate.size < config.min_size_bytes {
        return Some(Rejection::TooSmall(candidate.size));
    }
    if looks_like_html(&candidate.path, config.sniff_bytes).await {
        return Some(Rejection::HtmlContent);
    }
    None
}

/// The lowercased extension if it is on the disallowed list
pub(crate) fn disallowed_extension(config: &ArtifactConfig, path: &Path) -> Option<String> {
    let extension = extension_lowercase(path)?;
    config
        .disallowed_extensions
        .iter()
        .any(|disallowed| disallowed.eq_ignore_ascii_case(&extension))
        .then_some(extension)
}

/// Whether the first `sniff_bytes` of the file carry an HTML/MHTML signature
///
/// Matching is ASCII case-insensitive.
pub(crate) async fn looks_like_html(path: &Path, sniff_bytes: usize) -> bool {
    let file = match fs::File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            debug!(?path, error = %e, "cannot open file for content sniffing");
            return false;
        }
    };

    let mut head = Vec::with_capacity(sniff_bytes);
    if let Err(e) = file.take(sniff_bytes as u64).read_to_end(&mut head).await {
        debug!(?path, error = %e, "cannot read file for content sniffing");
        return false;
    }

    head.make_ascii_lowercase();
    HTML_SIGNATURES
        .iter()
        .any(|signature| contains(&head, signature))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Delete a rejected file, logging failures
pub(crate) async fn remove_best_effort(job_id: JobId, path: &Path, reason: &str) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(job_id = %job_id, ?path, reason, "deleted rejected file"),
        Err(e) => warn!(job_id = %job_id, ?path, reason, error = %e, "failed to delete rejected file"),
    }
}

/// Whether a file name starts with `<uuid>_` for a job other than `job_id`
pub(crate) fn owned_by_other_job(file_name: &str, job_id: JobId) -> bool {
    let Some((prefix, _)) = file_name.split_once('_') else {
        return false;
    };
    match prefix.parse::<uuid::Uuid>() {
        Ok(id) => id != job_id.get(),
        Err(_) => false,
    }
}

/// Human-readable size used in diagnostics
pub(crate) fn describe_size(bytes: u64) -> String {
    if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
