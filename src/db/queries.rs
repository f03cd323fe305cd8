use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::models::design::DesignPlan;
use crate::models::room::RoomAnalysis;

/// A stored room upload and its analysis.
#[derive(Debug, Clone)]
pub struct RoomRecord {
    pub id: String,
    pub filename: String,
    pub file_url: Option<String>,
    pub analysis: RoomAnalysis,
    pub created_at: DateTime<Utc>,
}

/// A stored generated design.
#[derive(Debug, Clone)]
pub struct DesignRecord {
    pub id: String,
    pub room_id: String,
    pub style: Option<String>,
    pub plan: DesignPlan,
    pub created_at: DateTime<Utc>,
}

fn room_from_row(row: &PgRow) -> Result<RoomRecord, sqlx::Error> {
    let analysis: Json<RoomAnalysis> = row.try_get("analysis_json")?;
    Ok(RoomRecord {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        file_url: row.try_get("file_url")?,
        analysis: analysis.0,
        created_at: row.try_get("created_at")?,
    })
}

fn design_from_row(row: &PgRow) -> Result<DesignRecord, sqlx::Error> {
    let plan: Json<DesignPlan> = row.try_get("design_json")?;
    Ok(DesignRecord {
        id: row.try_get("id")?,
        room_id: row.try_get("room_id")?,
        style: row.try_get("style")?,
        plan: plan.0,
        created_at: row.try_get("created_at")?,
    })
}

/// Insert a new room
pub async fn create_room(
    pool: &PgPool,
    id: &str,
    filename: &str,
    file_url: Option<&str>,
    analysis: &RoomAnalysis,
) -> Result<RoomRecord, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO rooms (id, filename, file_url, analysis_json)
        VALUES ($1, $2, $3, $4)
        RETURNING id, filename, file_url, analysis_json, created_at
        "#,
    )
    .bind(id)
    .bind(filename)
    .bind(file_url)
    .bind(Json(analysis))
    .fetch_one(pool)
    .await?;

    room_from_row(&row)
}

/// Get a room by ID
pub async fn get_room(pool: &PgPool, id: &str) -> Result<Option<RoomRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, filename, file_url, analysis_json, created_at
        FROM rooms
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(room_from_row).transpose()
}

/// Insert a new design for a room
pub async fn create_design(
    pool: &PgPool,
    id: &str,
    room_id: &str,
    style: &str,
    plan: &DesignPlan,
) -> Result<DesignRecord, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO designs (id, room_id, style, design_json)
        VALUES ($1, $2, $3, $4)
        RETURNING id, room_id, style, design_json, created_at
        "#,
    )
    .bind(id)
    .bind(room_id)
    .bind(style)
    .bind(Json(plan))
    .fetch_one(pool)
    .await?;

    design_from_row(&row)
}

/// Get a design by ID
pub async fn get_design(pool: &PgPool, id: &str) -> Result<Option<DesignRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, room_id, style, design_json, created_at
        FROM designs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(design_from_row).transpose()
}

/// Record a submitted render job under the identifier shared with the queue
pub async fn create_render_job(
    pool: &PgPool,
    job_id: &str,
    design_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO render_jobs (id, design_id, status)
        VALUES ($1, $2, 'pending')
        "#,
    )
    .bind(job_id)
    .bind(design_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Status string of a stored render job row
pub async fn get_render_job_status(
    pool: &PgPool,
    job_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query("SELECT status FROM render_jobs WHERE id = $1")
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

    row.map(|r| r.try_get("status")).transpose()
}
