use axum::extract::{Path, State};
use axum::Json;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::ar::ArSessionResponse;
use crate::routes::error::ApiError;

/// GET /api/ar/session/{design_id}: furniture placements for an AR viewer.
pub async fn get_ar_session(
    State(state): State<AppState>,
    Path(design_id): Path<String>,
) -> Result<Json<ArSessionResponse>, ApiError> {
    let design = queries::get_design(&state.db, &design_id)
        .await?
        .ok_or(ApiError::NotFound("Design not found"))?;

    Ok(Json(ArSessionResponse::from_plan(
        design.id,
        &design.plan,
        &state.config.backend_public_url,
    )))
}
