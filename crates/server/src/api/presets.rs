//! Preset catalog API handler.

use std::sync::Arc;

use axum::{extract::State, Json};
use brakeweb_core::{ProfileName, ServiceError};

use super::error::ApiError;
use crate::state::AppState;

/// GET /presets
///
/// Lists the presets the engine currently knows, in catalog order.
pub async fn list_presets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let profiles = state
        .conversions()
        .catalog()
        .list_profiles()
        .await
        .map_err(|e| ApiError::from_service(ServiceError::EngineQuery(e), state.environment()))?;

    Ok(Json(
        profiles.into_iter().map(ProfileName::into_string).collect(),
    ))
}
