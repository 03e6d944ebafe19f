//! Database connection pool management

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::config::Config;

/// Create the catalog store connection pool
pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    info!("Connecting to catalog database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await?;

    info!(
        "Catalog database pool created with max {} connections",
        config.db_max_connections
    );

    Ok(pool)
}

/// Apply embedded migrations from `./migrations`
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await
}

/// Round-trip latency of a trivial query, or None when the database is unreachable
pub async fn health_check(pool: &PgPool) -> Option<Duration> {
    let started = Instant::now();
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => Some(started.elapsed()),
        Err(e) => {
            error!("Database health check failed: {}", e);
            None
        }
    }
}
