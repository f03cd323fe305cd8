use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{self, HeaderName};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::{Stream, StreamExt};
use garde::Validate;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::design::{ProcureRequest, ProcurementRequest};
use crate::models::event::AgentEvent;
use crate::routes::error::ApiError;

static X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// POST /api/agent/procure: stream procurement agent events over SSE.
///
/// Each frame is `data: {"event": <kind>, "data": <payload>}`; the stream
/// always ends with a `done` event.
pub async fn procure(
    State(state): State<AppState>,
    Json(body): Json<ProcureRequest>,
) -> Result<Response, ApiError> {
    body.validate()?;

    let design = queries::get_design(&state.db, &body.design_id)
        .await?
        .ok_or(ApiError::NotFound("Design not found"))?;

    tracing::info!(
        design_id = %design.id,
        budget_usd = ?body.budget_usd,
        "Procurement stream opened"
    );

    let request = ProcurementRequest {
        design: design.plan,
        budget_usd: body.budget_usd,
        preferred_vendors: body.preferred_vendors,
    };
    let agent = Arc::clone(&state.ai);
    let events = state
        .pipeline
        .run(move |sink| async move { agent.procure(request, sink).await });

    Ok(sse_response(events))
}

/// Frame agent events as an unbuffered `text/event-stream` response.
///
/// Only `data:` frames are written; there are no keep-alive comments.
pub fn sse_response<S>(events: S) -> Response
where
    S: Stream<Item = AgentEvent> + Send + 'static,
{
    let frames = events.map(|event| Event::default().json_data(&event));

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING.clone(), "no"),
        ],
        Sse::new(frames),
    )
        .into_response()
}
