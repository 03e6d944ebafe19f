use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::db::repository::catalog;
use crate::models::Collection;
use crate::services::pipeline::ReinsertReport;
use crate::AppState;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn internal_error(e: impl std::fmt::Display) -> ApiError {
    tracing::error!("Catalog request failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
}

#[derive(Debug, Deserialize)]
pub struct DocumentsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DocumentsResponse {
    pub collection: Collection,
    pub total: i64,
    pub documents: Vec<serde_json::Value>,
}

/// GET /api/catalog/:collection - Most recently inserted documents
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<Collection>,
    Query(query): Query<DocumentsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);

    let total = catalog::count_by_collection(&state.pool, collection)
        .await
        .map_err(internal_error)?;
    let rows = catalog::find_by_collection(&state.pool, collection, limit)
        .await
        .map_err(internal_error)?;

    Ok(Json(DocumentsResponse {
        collection,
        total,
        documents: rows.into_iter().map(|row| row.document).collect(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReinsertRequest {
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// POST /api/catalog/reinsert - Insert stored snapshots again
/// With `dir`, only that result directory; otherwise every one under the output root
pub async fn reinsert(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<ReinsertRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();

    let report = match request.dir {
        Some(dir) => {
            let documents = state.pipeline.reinsert_dir(&dir).await.map_err(internal_error)?;
            ReinsertReport {
                directories: 1,
                documents,
                failed: 0,
            }
        }
        None => state.pipeline.reinsert_all().await.map_err(internal_error)?,
    };

    Ok(Json(report))
}
