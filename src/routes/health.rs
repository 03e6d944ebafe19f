use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

use crate::db;
use crate::AppState;

/// Root endpoint - basic status
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "STRM Catalog Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseStatus {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u128>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestStatus {
    output_root: String,
    output_root_exists: bool,
    workers: usize,
    tracked_tasks: usize,
}

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    uptime: u64,
    postgres: DatabaseStatus,
    ingest: IngestStatus,
}

/// GET /health - Advanced health check
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    let latency = db::health_check(&state.pool).await;

    let output_root = state.pipeline.output_root();
    let output_root_exists = tokio::fs::metadata(output_root)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    // Without the catalog database nothing can be persisted
    let status = if latency.is_none() {
        "unhealthy"
    } else if !output_root_exists {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: status.to_string(),
        uptime,
        postgres: DatabaseStatus {
            ok: latency.is_some(),
            latency_ms: latency.map(|d| d.as_millis()),
        },
        ingest: IngestStatus {
            output_root: output_root.display().to_string(),
            output_root_exists,
            workers: state.config.worker_count(),
            tracked_tasks: state.pipeline.progress().task_count(),
        },
    })
}

/// GET /metrics - Prometheus metrics
pub async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                b"Internal Server Error".to_vec(),
            )
        }
    }
}

/// Readiness probe (for Kubernetes)
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match db::health_check(&state.pool).await {
        Some(_) => (StatusCode::OK, "ready"),
        None => (StatusCode::SERVICE_UNAVAILABLE, "not ready - postgres unavailable"),
    }
}

/// Liveness probe (for Kubernetes)
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}
