//! Download job handlers.

use super::parse_job_id;
use crate::api::AppState;
use crate::error::Error;
use crate::types::{CleanupOutcome, CleanupStatus, DownloadRequest, DownloadStarted};
use crate::utils::{content_disposition, content_type_for};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

/// POST /api/download - Start a download
#[utoipa::path(
    post,
    path = "/api/download",
    tag = "jobs",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "Download accepted", body = DownloadStarted),
        (status = 503, description = "Service is shutting down", body = crate::error::ApiError)
    )
)]
pub async fn start_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Result<Json<DownloadStarted>, Error> {
    let id = state.supervisor.submit(request.url).await?;
    Ok(Json(DownloadStarted::new(id)))
}

/// GET /api/progress/:id - Poll a job
#[utoipa::path(
    get,
    path = "/api/progress/{id}",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Download ID")
    ),
    responses(
        (status = 200, description = "Current job record", body = crate::types::JobRecord),
        (status = 404, description = "Download not found", body = crate::error::ApiError)
    )
)]
pub async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let id = parse_job_id(&id)?;
    let record = state.supervisor.progress(id).await?;
    Ok(Json(record))
}

/// GET /api/download-file/:id - Stream the finished file
#[utoipa::path(
    get,
    path = "/api/download-file/{id}",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Download ID")
    ),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 400, description = "Download has not completed", body = crate::error::ApiError),
        (status = 404, description = "Download or file not found", body = crate::error::ApiError)
    )
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, Error> {
    let id = parse_job_id(&id)?;
    let file = state.supervisor.completed_file(id).await?;

    let handle = tokio::fs::File::open(&file.path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileMissing {
                id: id.to_string(),
                path: file.path.clone(),
            }
        } else {
            Error::Io(e)
        }
    })?;

    // Non-ASCII bytes are allowed in header values as obs-text
    let disposition = HeaderValue::from_bytes(content_disposition(&file.filename).as_bytes())
        .map_err(|e| Error::ApiServerError(format!("invalid Content-Disposition: {e}")))?;

    tracing::info!(job_id = %id, path = ?file.path, size_bytes = file.size_bytes, "serving file");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&file.path))
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONTENT_LENGTH, file.size_bytes)
        .body(Body::from_stream(ReaderStream::new(handle)))
        .map_err(|e| Error::ApiServerError(e.to_string()))
}

/// DELETE /api/cleanup/:id - Delete the finished file
///
/// Always answers 200; the outcome is in the body.
#[utoipa::path(
    delete,
    path = "/api/cleanup/{id}",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Download ID")
    ),
    responses(
        (status = 200, description = "Cleanup outcome", body = CleanupOutcome)
    )
)]
pub async fn cleanup_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<CleanupOutcome> {
    match parse_job_id(&id) {
        Ok(id) => Json(state.supervisor.cleanup(id).await),
        Err(_) => Json(CleanupOutcome::new(CleanupStatus::NotFound)),
    }
}
