//! Job output download handler.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use brakeweb_core::{ErrorKind, ServiceError};
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::error::ApiError;
use crate::metrics::DOWNLOADS_TOTAL;
use crate::state::AppState;

/// Read size for streamed downloads.
const CHUNK_SIZE: usize = 64 * 1024;

/// GET /jobs/{id}/{preset}/{filename}
///
/// Streams a job output as an attachment. Anything not on disk is a 404.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path((job_id, preset, filename)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let environment = state.environment();

    let resolved = match state.downloads().resolve(&job_id, &preset, &filename).await {
        Ok(resolved) => resolved,
        Err(e) => {
            let outcome = if e.kind() == ErrorKind::NotFound {
                "not_found"
            } else {
                "failed"
            };
            DOWNLOADS_TOTAL.with_label_values(&[outcome]).inc();
            return Err(ApiError::from_service(e, environment));
        }
    };

    let file = tokio::fs::File::open(&resolved.path).await.map_err(|e| {
        DOWNLOADS_TOTAL.with_label_values(&["failed"]).inc();
        let err = if e.kind() == std::io::ErrorKind::NotFound {
            ServiceError::NotFound(resolved.path.display().to_string())
        } else {
            ServiceError::storage("Error reading job output", e)
        };
        ApiError::from_service(err, environment)
    })?;

    debug!(path = %resolved.path.display(), size = resolved.size, "Serving download");
    DOWNLOADS_TOTAL.with_label_values(&["served"]).inc();

    let content_type = mime_guess::from_path(&resolved.path)
        .first_or_octet_stream()
        .to_string();
    let body = Body::from_stream(ReaderStream::with_capacity(file, CHUNK_SIZE));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, resolved.size.to_string()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&resolved.file_name),
            ),
        ],
        body,
    )
        .into_response())
}

/// `attachment` disposition with an ASCII fallback name and the exact UTF-8 name.
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}
