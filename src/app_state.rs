use sqlx::PgPool;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    ai_provider::AiProvider, event_stream::EventPipeline, render_queue::RenderQueue,
    storage::LocalDirStorage,
};

/// Shared application state passed to all route handlers.
///
/// Built once at startup; every handler sees the same queue and provider.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub ai: Arc<dyn AiProvider>,
    pub queue: Arc<RenderQueue>,
    pub uploads: Arc<LocalDirStorage>,
    pub pipeline: EventPipeline,
}

impl AppState {
    pub fn new(
        db: PgPool,
        config: AppConfig,
        ai: Arc<dyn AiProvider>,
        queue: RenderQueue,
        uploads: LocalDirStorage,
    ) -> Self {
        let pipeline = EventPipeline::new(config.stream_buffer);
        Self {
            db,
            config: Arc::new(config),
            ai,
            queue: Arc::new(queue),
            uploads: Arc::new(uploads),
            pipeline,
        }
    }
}
