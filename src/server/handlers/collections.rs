use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn list_collections(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let names = state.store.list_collections().await?;
    let count = names.len();
    Ok(Json(json!({ "collections": names, "count": count })))
}

pub async fn peek_collection(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(5)
        .min(50);

    let documents = state.store.get(&name, limit).await?;
    Ok(Json(json!({ "collection": name, "documents": documents })))
}
