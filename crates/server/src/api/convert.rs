//! Conversion API handler.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use brakeweb_core::{ConversionResult, ConversionUpload};
use tracing::debug;

use super::error::ApiError;
use super::upload::UploadDecoder;
use crate::state::AppState;

/// POST /convert
///
/// Takes one file and a `preset` list, answers with a download URL per preset
/// plus `Original`. A body that is not multipart counts as an empty form.
pub async fn convert(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ConversionResult>, ApiError> {
    let environment = state.environment();
    let mut decoder = UploadDecoder::new(&state.config().storage.upload_dir, environment);

    let decoded = match multipart {
        Ok(multipart) => decoder.decode(multipart).await,
        Err(rejection) => {
            debug!(reason = %rejection, "Request body is not multipart");
            Ok(ConversionUpload::default())
        }
    };

    let result = match decoded {
        Ok(upload) => state
            .conversions()
            .convert(upload)
            .await
            .map_err(|e| ApiError::from_service(e, environment)),
        Err(e) => Err(e),
    };

    decoder.cleanup().await;
    result.map(Json)
}
