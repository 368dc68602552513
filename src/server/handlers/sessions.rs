use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut sessions: Vec<Value> = Vec::new();
    for id in state.sessions.ids() {
        if let Some(handle) = state.sessions.get(&id) {
            let session = handle.lock().await;
            sessions.push(json!({
                "id": id,
                "turns": session.turn_count(),
                "search_count": session.search_count,
                "last_neighborhood": session.last_neighborhood,
                "created_at": session.created_at.to_rfc3339(),
                "updated_at": session.updated_at.to_rfc3339(),
            }));
        }
    }
    Ok(Json(json!({ "sessions": sessions })))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;

    let session = handle.lock().await;
    let turns: Vec<_> = session.turns().collect();

    Ok(Json(json!({
        "id": session_id,
        "turns": turns,
        "search_count": session.search_count,
        "last_filters": session.last_filters,
        "last_neighborhood": session.last_neighborhood,
    })))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.sessions.remove(&session_id) {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }
    Ok(Json(json!({ "success": true })))
}
