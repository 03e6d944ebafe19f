use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,

    // PostgreSQL
    pub database_url: String,
    pub db_max_connections: u32,

    // Ingestion
    pub output_root: PathBuf,
    pub reference_extension: String,
    pub worker_reserve: usize,
    pub max_workers: Option<usize>,

    // Progress
    pub progress_stream_interval_ms: u64,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            // Server
            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .unwrap_or(3001),

            // PostgreSQL
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/strm_catalog".to_string()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .unwrap_or(15),

            // Ingestion
            output_root: PathBuf::from(
                env::var("OUTPUT_ROOT").unwrap_or_else(|_| "./results".to_string()),
            ),
            reference_extension: env::var("REFERENCE_EXTENSION")
                .unwrap_or_else(|_| "strm".to_string()),
            worker_reserve: env::var("WORKER_RESERVE")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(2),
            max_workers: env::var("MAX_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0),

            // Progress
            progress_stream_interval_ms: env::var("PROGRESS_STREAM_INTERVAL_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
        }
    }

    /// Number of concurrent reference-file writers
    pub fn worker_count(&self) -> usize {
        self.max_workers
            .unwrap_or_else(|| default_worker_count(self.worker_reserve))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Available parallelism minus a small reserve, never below one
pub fn default_worker_count(reserve: usize) -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(reserve)
        .max(1)
}
