use std::path::Path;

use axum::extract::{Multipart, State};
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::room::RoomAnalyzeResponse;
use crate::routes::error::ApiError;
use crate::services::storage::ArtifactStorage;

const ALLOWED_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/heic"];
const DEFAULT_FILENAME: &str = "upload.jpg";

struct Upload {
    filename: String,
    content_type: String,
    data: Vec<u8>,
}

/// Basename of a client-supplied filename; path components are dropped.
pub fn sanitize_filename(name: Option<&str>) -> String {
    name.and_then(|n| Path::new(n).file_name())
        .and_then(|n| n.to_str())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(DEFAULT_FILENAME)
        .to_string()
}

/// POST /api/rooms/analyze: upload a room photograph and analyse it.
pub async fn analyze_room(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<RoomAnalyzeResponse>, ApiError> {
    let mut upload: Option<Upload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !ALLOWED_TYPES.contains(&content_type.as_str()) {
            return Err(ApiError::UnsupportedMediaType(format!(
                "Unsupported file type: {content_type}"
            )));
        }
        let filename = sanitize_filename(field.file_name());
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        upload = Some(Upload {
            filename,
            content_type,
            data: data.to_vec(),
        });
    }

    let upload = upload.ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;

    if upload.data.len() > state.config.upload_max_bytes() {
        return Err(ApiError::PayloadTooLarge(format!(
            "File exceeds {} MB limit",
            state.config.upload_max_mb
        )));
    }
    // The image crate cannot sniff HEIC; trust the declared type there.
    if upload.content_type != "image/heic" && image::guess_format(&upload.data).is_err() {
        return Err(ApiError::UnsupportedMediaType(
            "File content is not a recognised image".to_string(),
        ));
    }

    state.uploads.ensure_directory().await?;
    state.uploads.write(&upload.filename, &upload.data).await?;
    let file_url = state.uploads.public_url(&upload.filename);

    let analysis = state
        .ai
        .analyze_room(&upload.data, &upload.filename)
        .await?;

    let room_id = Uuid::new_v4().to_string();
    let room = queries::create_room(
        &state.db,
        &room_id,
        &upload.filename,
        Some(&file_url),
        &analysis,
    )
    .await?;

    tracing::info!(
        room_id = %room.id,
        filename = %room.filename,
        room_type = %room.analysis.room_type,
        "Room analysed"
    );

    Ok(Json(RoomAnalyzeResponse {
        room_id: room.id,
        filename: room.filename,
        file_url: room.file_url,
        analysis: room.analysis,
        created_at: room.created_at,
    }))
}
