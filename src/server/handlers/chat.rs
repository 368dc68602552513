use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::core::validation::validate_query;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub conversation_id: Option<String>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let sanitized = validate_query(&payload.query).map_err(ApiError::BadRequest)?;

    let conversation_id = payload
        .conversation_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let response = state.engine.chat(&sanitized, &conversation_id).await;

    Ok(Json(json!({
        "answer": response.answer,
        "sources": response.sources,
        "documents_retrieved": response.documents_retrieved,
        "conversation_id": conversation_id,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

pub async fn sample_queries() -> impl IntoResponse {
    Json(json!({
        "samples": [
            "Show me 3 bedroom properties in Back Bay under $1M",
            "Is Dorchester safe at night?",
            "Which neighborhoods have the best schools?",
            "Find rentals near a subway station",
            "What about cheaper options?",
        ]
    }))
}
