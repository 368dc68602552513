use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.list_collections().await {
        Ok(names) => Json(json!({
            "status": "healthy",
            "store": "connected",
            "collections": names.len(),
            "sessions": state.sessions.len(),
            "version": env!("CARGO_PKG_VERSION"),
        })),
        Err(err) => {
            tracing::warn!("Health check could not reach the vector store: {}", err);
            Json(json!({
                "status": "degraded",
                "store": "unreachable",
                "collections": 0,
                "sessions": state.sessions.len(),
                "version": env!("CARGO_PKG_VERSION"),
            }))
        }
    }
}
