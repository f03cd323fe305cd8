use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use spaceforge::app_state::AppState;
use spaceforge::config::{AppConfig, StorageBackend};
use spaceforge::db;
use spaceforge::routes;
use spaceforge::services::ai_provider::build_provider;
use spaceforge::services::render_queue::RenderQueue;
use spaceforge::services::storage::{
    prepare_static_tree, ArtifactStorage, LocalDirStorage, R2Storage,
};

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    // RUST_LOG wins over LOG_LEVEL when both are set.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    tracing::info!(config = %config.safe_summary(), "Initializing spaceforge server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe_metrics();

    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    prepare_static_tree(
        &[config.renders_dir(), config.uploads_dir()],
        &config.models_dir(),
    )
    .await
    .expect("Failed to prepare static directories");

    let ai = build_provider(&config);
    tracing::info!(provider = ai.name(), "AI provider selected");

    let render_storage: Arc<dyn ArtifactStorage> = match config.storage_backend {
        StorageBackend::Local => Arc::new(LocalDirStorage::new(
            config.renders_dir(),
            config.static_url(&config.renders_subdir),
        )),
        StorageBackend::R2 => {
            let r2 = config
                .r2_settings()
                .expect("R2 settings are checked during config validation");
            tracing::info!(bucket = r2.bucket, "Storing renders in R2");
            Arc::new(
                R2Storage::new(
                    r2.bucket,
                    r2.endpoint,
                    r2.access_key,
                    r2.secret_key,
                    &config.renders_subdir,
                    r2.public_url,
                )
                .expect("Failed to initialize R2 client"),
            )
        }
    };

    let uploads = LocalDirStorage::new(
        config.uploads_dir(),
        config.static_url(&config.uploads_subdir),
    );
    let queue = RenderQueue::new(render_storage);

    let bind_addr = config.bind_addr.clone();
    let body_limit = config.upload_max_bytes() * 2;
    let cors = routes::cors_layer(&config);

    let state = AppState::new(db_pool, config, ai, queue, uploads);

    let app = Router::new()
        .merge(routes::router(state))
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
