//! Multipart upload decoding.
//!
//! File parts are streamed to the upload directory under generated names; the
//! `preset` text field is captured and other text fields are ignored.

use std::path::PathBuf;

use axum::extract::multipart::{Multipart, MultipartError};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use brakeweb_core::{ConversionUpload, Environment, ServiceError, UploadedFile};

use super::error::ApiError;
use crate::metrics::UPLOAD_BYTES_TOTAL;

/// Name of the form field carrying the comma separated preset list.
pub const PRESET_FIELD: &str = "preset";

/// Decodes one request's form and tracks every temporary file it creates.
///
/// Files are held by [`TempPath`] guards and removed if the decoder is dropped
/// before [`UploadDecoder::cleanup`] runs.
#[derive(Debug)]
pub struct UploadDecoder {
    upload_dir: PathBuf,
    environment: Environment,
    temp_paths: Vec<TempPath>,
}

impl UploadDecoder {
    pub fn new(upload_dir: impl Into<PathBuf>, environment: Environment) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            environment,
            temp_paths: Vec::new(),
        }
    }

    pub async fn decode(&mut self, mut multipart: Multipart) -> Result<ConversionUpload, ApiError> {
        let mut upload = ConversionUpload::default();

        while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
            let field_name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                // Browsers send an empty file part when no file was picked.
                Some(file_name) if file_name.is_empty() => {
                    debug!(field = %field_name, "Ignoring file part without a name");
                }
                Some(file_name) => {
                    tokio::fs::create_dir_all(&self.upload_dir)
                        .await
                        .map_err(|e| self.storage_error(e))?;
                    let temp_path = self.upload_dir.join(Uuid::now_v7().to_string());
                    self.temp_paths.push(TempPath::from_path(temp_path.clone()));

                    let mut file = tokio::fs::File::create(&temp_path)
                        .await
                        .map_err(|e| self.storage_error(e))?;
                    let mut written = 0u64;
                    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                        file.write_all(&chunk)
                            .await
                            .map_err(|e| self.storage_error(e))?;
                        written += chunk.len() as u64;
                    }
                    file.flush().await.map_err(|e| self.storage_error(e))?;
                    UPLOAD_BYTES_TOTAL.inc_by(written);

                    debug!(field = %field_name, file_name = %file_name, bytes = written, "Received file");
                    upload.files.push(UploadedFile {
                        temp_path,
                        original_filename: file_name,
                    });
                }
                None if field_name == PRESET_FIELD => {
                    upload.preset = Some(field.text().await.map_err(multipart_error)?);
                }
                None => {
                    debug!(field = %field_name, "Ignoring form field");
                }
            }
        }

        Ok(upload)
    }

    /// Removes temporary files the conversion did not consume.
    pub async fn cleanup(self) {
        for guard in self.temp_paths {
            // A guard that cannot be disarmed removes its file when dropped.
            let Ok(path) = guard.keep() else { continue };
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "Removed leftover upload"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove leftover upload"),
            }
        }
    }

    fn storage_error(&self, e: std::io::Error) -> ApiError {
        ApiError::from_service(
            ServiceError::storage("Error saving uploaded file", e),
            self.environment,
        )
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    warn!(error = %e, "Malformed multipart body");
    ApiError::new(e.status(), e.body_text())
}
