pub mod agent;
pub mod ar;
pub mod designs;
pub mod error;
pub mod health;
pub mod metrics;
pub mod rooms;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::app_state::AppState;
use crate::config::AppConfig;

/// Slack above the upload cap for multipart boundaries and headers.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application routes without the process-level layers (metrics, tracing,
/// CORS, compression) that `main` adds.
pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.upload_max_bytes() + MULTIPART_OVERHEAD;
    let static_dir = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/api/rooms/analyze",
            post(rooms::analyze_room).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/designs/generate", post(designs::generate_design))
        .route("/api/designs/render", post(designs::submit_render))
        .route(
            "/api/designs/render/{job_id}",
            get(designs::get_render_status),
        )
        .route("/api/agent/procure", post(agent::procure))
        .route("/api/ar/session/{design_id}", get(ar::get_ar_session))
        .nest_service("/static", static_dir)
        .with_state(state)
}

/// CORS policy from `ALLOWED_ORIGINS`; `*` allows any origin.
pub fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins = config.cors_origins();
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
