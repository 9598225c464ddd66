//! Artifact resolution
//!
//! After the tool exits successfully the produced file has to be found and
//! vetted. The tool's own filename marker is trusted first; without one, the
//! working directory is searched for files carrying the job's id prefix and, as a
//! last resort, for any file created since the job started. Every rejected
//! candidate is deleted so junk (HTML error pages, metadata stubs) never piles up.

mod candidates;


use crate::config::ArtifactConfig;
use crate::error::ResolveError;
use crate::types::JobId;
use crate::utils::{MAX_FILENAME_CHARS, extension_lowercase, sanitize_filename, truncate_chars};
use candidates::{Candidate, Rejection};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Maximum number of directory entries listed in not-found diagnostics
const MAX_LISTED_ENTRIES: usize = 10;

/// Numbered names tried before giving up on a canonical-extension rename
const MAX_RENAME_ATTEMPTS: usize = 100;

/// A validated download result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Absolute path in the working directory
    pub path: PathBuf,
    /// Name offered to the client (job prefix stripped, sanitized)
    pub display_name: String,
    /// Size in bytes
    pub size_bytes: u64,
}

/// Locates and validates the file produced by a job
#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    config: ArtifactConfig,
}

impl ArtifactResolver {
    /// Create a resolver with the given policy
    pub fn new(config: ArtifactConfig) -> Self {
        Self { config }
    }

    /// Find the artifact of a finished job
    ///
    /// # Arguments
    ///
    /// * `job_id` - Job whose files carry the `<job_id>_` prefix
    /// * `work_dir` - Directory the tool wrote into
    /// * `hint` - Filename reported by the tool, absolute or relative to `work_dir`
    /// * `started_at` - Job start; bounds the recent-files fallback
    ///
    /// # Errors
    ///
    /// - [`ResolveError::WrongType`] if the hinted file is not media
    /// - [`ResolveError::TooSmall`] if the chosen file is below the minimum size
    /// - [`ResolveError::NotFound`] if no candidate survives validation
    pub async fn resolve(
        &self,
        job_id: JobId,
        work_dir: &Path,
        hint: Option<&str>,
        started_at: SystemTime,
    ) -> Result<Artifact, ResolveError> {
        let hinted = match hint {
            Some(hint) => Candidate::stat(&hinted_path(work_dir, hint)).await,
            None => None,
        };

        let chosen = match hinted {
            Some(candidate) => {
                debug!(job_id = %job_id, path = ?candidate.path, "using filename reported by the tool");
                self.validate_hinted(job_id, candidate).await?
            }
            None => match self.search(job_id, work_dir, started_at).await {
                Some(candidate) => candidate,
                None => {
                    return Err(ResolveError::NotFound {
                        details: not_found_details(work_dir, hint).await,
                    });
                }
            },
        };

        let path = self.ensure_media_extension(job_id, chosen.path).await;

        // The rename may have raced with another writer; size is checked again
        let size = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                return Err(ResolveError::NotFound {
                    details: format!("chosen file {} disappeared: {}", path.display(), e),
                });
            }
        };
        if size < self.config.min_size_bytes {
            candidates::remove_best_effort(job_id, &path, "below minimum size").await;
            return Err(ResolveError::TooSmall { path, size });
        }

        let path = tokio::fs::canonicalize(&path).await.unwrap_or(path);
        let display_name = self.display_name(job_id, &path);

        info!(job_id = %job_id, ?path, size, display_name = %display_name, "artifact resolved");

        Ok(Artifact {
            path,
            display_name,
            size_bytes: size,
        })
    }

    async fn validate_hinted(
        &self,
        job_id: JobId,
        candidate: Candidate,
    ) -> Result<Candidate, ResolveError> {
        match candidates::check(&self.config, &candidate).await {
            None => Ok(candidate),
            Some(Rejection::DisallowedExtension(extension)) => {
                candidates::remove_best_effort(job_id, &candidate.path, "disallowed extension")
                    .await;
                Err(ResolveError::WrongType {
                    path: candidate.path,
                    extension,
                })
            }
            Some(Rejection::HtmlContent) => {
                candidates::remove_best_effort(job_id, &candidate.path, "HTML content").await;
                let extension = extension_lowercase(&candidate.path)
                    .unwrap_or_else(|| "unknown".to_string());
                Err(ResolveError::WrongType {
                    path: candidate.path,
                    extension,
                })
            }
            Some(Rejection::TooSmall(size)) => {
                candidates::remove_best_effort(job_id, &candidate.path, "below minimum size")
                    .await;
                Err(ResolveError::TooSmall {
                    path: candidate.path,
                    size,
                })
            }
        }
    }

    /// Search the working directory when the tool named no usable file
    async fn search(
        &self,
        job_id: JobId,
        work_dir: &Path,
        started_at: SystemTime,
    ) -> Option<Candidate> {
        let prefix = format!("{job_id}_");
        let files = candidates::list_files(work_dir).await;

        let (own, others): (Vec<_>, Vec<_>) = files
            .into_iter()
            .partition(|candidate| candidate.file_name().starts_with(&prefix));

        if let Some(found) = self.newest_valid(job_id, own).await {
            return Some(found);
        }

        debug!(job_id = %job_id, "no prefixed file survived, checking recently created files");
        let recent: Vec<_> = others
            .into_iter()
            .filter(|candidate| candidate.created >= started_at)
            .filter(|candidate| !candidates::owned_by_other_job(&candidate.file_name(), job_id))
            .collect();
        self.newest_valid(job_id, recent).await
    }

    /// Drop (and delete) invalid candidates, return the most recently created survivor
    async fn newest_valid(&self, job_id: JobId, files: Vec<Candidate>) -> Option<Candidate> {
        let mut survivors = Vec::new();
        for candidate in files {
            match candidates::check(&self.config, &candidate).await {
                None => survivors.push(candidate),
                Some(rejection) => {
                    let reason = match rejection {
                        Rejection::DisallowedExtension(_) => "disallowed extension",
                        Rejection::HtmlContent => "HTML content",
                        Rejection::TooSmall(_) => "below minimum size",
                    };
                    candidates::remove_best_effort(job_id, &candidate.path, reason).await;
                }
            }
        }
        survivors.into_iter().max_by_key(|candidate| candidate.created)
    }

    /// Rename to the canonical extension unless the file already has a media extension
    async fn ensure_media_extension(&self, job_id: JobId, path: PathBuf) -> PathBuf {
        let is_media = extension_lowercase(&path).is_some_and(|extension| {
            self.config
                .media_extensions
                .iter()
                .any(|media| media.eq_ignore_ascii_case(&extension))
        });
        if is_media {
            return path;
        }

        let Some(renamed) = self.free_canonical_path(&path).await else {
            warn!(job_id = %job_id, ?path, "no free name for canonical extension, keeping original name");
            return path;
        };
        match tokio::fs::rename(&path, &renamed).await {
            Ok(()) => {
                debug!(job_id = %job_id, from = ?path, to = ?renamed, "renamed artifact to canonical extension");
                renamed
            }
            Err(e) => {
                warn!(job_id = %job_id, ?path, error = %e, "rename failed, keeping original name");
                path
            }
        }
    }

    /// First of `<stem>.<ext>`, `<stem>-1.<ext>`, `<stem>-2.<ext>` that does not exist
    async fn free_canonical_path(&self, path: &Path) -> Option<PathBuf> {
        let extension = &self.config.canonical_extension;
        let stem = path.file_stem()?.to_string_lossy().into_owned();

        for attempt in 0..MAX_RENAME_ATTEMPTS {
            let name = match attempt {
                0 => format!("{stem}.{extension}"),
                n => format!("{stem}-{n}.{extension}"),
            };
            let candidate = path.with_file_name(name);
            if !tokio::fs::try_exists(&candidate).await.unwrap_or(true) {
                return Some(candidate);
            }
        }
        None
    }

    /// Client-facing name: job prefix stripped, sanitized, canonical extension
    fn display_name(&self, job_id: JobId, path: &Path) -> String {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let prefix = format!("{job_id}_");
        let stripped = file_name.strip_prefix(&prefix).unwrap_or(&file_name);

        let suffix = format!(".{}", self.config.canonical_extension);
        let split = stripped.len().saturating_sub(suffix.len());
        let stem = if stripped.is_char_boundary(split)
            && stripped[split..].eq_ignore_ascii_case(&suffix)
        {
            stripped[..split].to_string()
        } else {
            Path::new(stripped)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        let budget = MAX_FILENAME_CHARS.saturating_sub(suffix.chars().count());
        let stem = truncate_chars(&sanitize_filename(&stem), budget);
        let stem = if stem.is_empty() { "video".to_string() } else { stem };
        format!("{stem}{suffix}")
    }
}

fn hinted_path(work_dir: &Path, hint: &str) -> PathBuf {
    let path = Path::new(hint);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        work_dir.join(path)
    }
}

async fn not_found_details(work_dir: &Path, hint: Option<&str>) -> String {
    let mut details = vec![match hint {
        Some(hint) => format!("file does not exist: {hint}"),
        None => "no filename was reported by the tool".to_string(),
    }];

    let files = candidates::list_files(work_dir).await;
    if files.is_empty() {
        details.push("directory is empty".to_string());
    } else {
        let listed: Vec<String> = files
            .iter()
            .take(MAX_LISTED_ENTRIES)
            .map(|file| format!("{} ({})", file.file_name(), candidates::describe_size(file.size)))
            .collect();
        details.push(format!(
            "files in directory: {} ({})",
            files.len(),
            listed.join(", ")
        ));
    }

    details.join(" | ")
}
