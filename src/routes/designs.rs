use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::design::{DesignGenerateRequest, DesignGenerateResponse, RenderRequest};
use crate::models::job::RenderJobResponse;
use crate::routes::error::ApiError;

/// POST /api/designs/generate: generate a furniture layout for an analysed room.
pub async fn generate_design(
    State(state): State<AppState>,
    Json(body): Json<DesignGenerateRequest>,
) -> Result<Json<DesignGenerateResponse>, ApiError> {
    body.validate()?;

    let room = queries::get_room(&state.db, &body.room_id)
        .await?
        .ok_or(ApiError::NotFound("Room not found"))?;

    let plan = state
        .ai
        .generate_design(&room.analysis, &body.style, &body.preferences)
        .await?;

    let design_id = Uuid::new_v4().to_string();
    let design = queries::create_design(&state.db, &design_id, &room.id, &body.style, &plan)
        .await?;

    tracing::info!(
        design_id = %design.id,
        room_id = %room.id,
        style = %body.style,
        pieces = design.plan.furniture.len(),
        "Design generated"
    );

    Ok(Json(DesignGenerateResponse {
        design_id: design.id,
        room_id: room.id,
        style: body.style,
        furniture: design.plan.furniture,
        layout_notes: design.plan.layout_notes,
        color_palette: design.plan.color_palette,
        estimated_cost_usd: design.plan.estimated_cost_usd,
        created_at: design.created_at,
    }))
}

/// POST /api/designs/render: submit a render job for a design.
pub async fn submit_render(
    State(state): State<AppState>,
    Json(body): Json<RenderRequest>,
) -> Result<Json<RenderJobResponse>, ApiError> {
    body.validate()?;

    let design = queries::get_design(&state.db, &body.design_id)
        .await?
        .ok_or(ApiError::NotFound("Design not found"))?;

    // One id for the database row and the queue entry.
    let job_id = Uuid::new_v4().to_string();
    queries::create_render_job(&state.db, &job_id, &design.id).await?;

    let job = state.queue.submit(
        &design.id,
        design.plan,
        Arc::clone(&state.ai),
        Some(job_id),
    )?;

    Ok(Json(job.into()))
}

/// GET /api/designs/render/{job_id}: poll render job status.
pub async fn get_render_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<RenderJobResponse>, ApiError> {
    let job = state.queue.lookup(&job_id)?;
    Ok(Json(job.into()))
}
