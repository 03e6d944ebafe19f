//! Error types for the ingestion pipeline and the catalog store

use std::path::PathBuf;

/// Failures raised by the catalog store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to encode catalog document: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("catalog store rejected insert: {0}")]
    Rejected(String),
}

/// Stage-fatal failures of one ingestion run
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("no playlist files supplied")]
    NoInput,

    #[error("failed to read playlist {path}: {source}")]
    ReadPlaylist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to prepare output directory {path}: {source}")]
    PrepareOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write snapshot {path}: {source}")]
    WriteSnapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read snapshot {path}: {source}")]
    ReadSnapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("catalog store insert failed: {0}")]
    Store(#[from] StoreError),
}
