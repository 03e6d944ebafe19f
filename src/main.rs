mod config;
mod db;
mod error;
mod models;
mod routes;
mod services;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::services::{
    catalog_store::PgCatalogStore, classifier::MediaClassifier, pipeline::IngestPipeline,
    progress::ProgressRegistry,
};
use sqlx::PgPool;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub pool: PgPool,
    pub pipeline: IngestPipeline,
    pub start_time: Instant,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strm_catalog_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();
    let port = config.port;

    tracing::info!("Starting STRM Catalog Server v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL connection pool
    let pool = create_pool(&config).await?;
    run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    tokio::fs::create_dir_all(&config.output_root).await?;
    let workers = config.worker_count();
    tracing::info!(
        "Output root: {} ({} reference writers)",
        config.output_root.display(),
        workers
    );

    let pipeline = IngestPipeline::new(
        Arc::new(PgCatalogStore::new(pool.clone())),
        ProgressRegistry::new(),
        MediaClassifier::new(&config.reference_extension),
        config.output_root.clone(),
        workers,
    );

    // Build application state
    let state = Arc::new(AppState {
        config,
        pool,
        pipeline,
        start_time: Instant::now(),
    });

    // Build router
    let app = Router::new()
        // Health endpoints
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/ready", get(routes::health::ready))
        .route("/live", get(routes::health::live))
        // Ingestion endpoints
        .route("/api/ingest", post(routes::ingest::start_ingest))
        .route(
            "/api/ingest/:task_id/progress",
            get(routes::ingest::get_progress),
        )
        .route(
            "/api/ingest/:task_id/events",
            get(routes::ingest::progress_events),
        )
        // Catalog endpoints
        .route("/api/catalog/reinsert", post(routes::catalog::reinsert))
        .route(
            "/api/catalog/:collection",
            get(routes::catalog::list_documents),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
