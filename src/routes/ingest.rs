use async_stream::stream;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub task_id: String,
    pub files: usize,
}

/// POST /api/ingest - Start ingesting playlist files (background processing)
/// Returns the task id immediately; poll /api/ingest/:task_id/progress
pub async fn start_ingest(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IngestRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if payload.files.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "No playlist files supplied" })),
        ));
    }

    let files = payload.files.len();
    let task_id = state.pipeline.start(payload.files);
    tracing::info!(task_id = %task_id, "Started ingestion of {} files", files);

    Ok((StatusCode::ACCEPTED, Json(IngestResponse { task_id, files })))
}

/// GET /api/ingest/:task_id/progress
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    match state.pipeline.progress().get(&task_id) {
        Some(snapshot) => Ok(Json(snapshot)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Task not found" })),
        )),
    }
}

/// GET /api/ingest/:task_id/events - Progress as server-sent events until the task completes
pub async fn progress_events(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let progress = state.pipeline.progress().clone();
    let period = Duration::from_millis(state.config.progress_stream_interval_ms.max(1));

    let events = stream! {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match progress.get(&task_id) {
                Some(snapshot) => {
                    let done = snapshot.is_complete;
                    yield Event::default().event("progress").json_data(&snapshot);
                    if done {
                        break;
                    }
                }
                None => {
                    yield Ok(Event::default().event("not_found").data(task_id.clone()));
                    break;
                }
            }
        }
    };

    // Keepalive prevents proxies from closing idle streams
    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keepalive"),
    )
}
