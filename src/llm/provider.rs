use async_trait::async_trait;

use crate::core::errors::ApiError;

/// A single answer-synthesis call: fixed system prompt, composed user
/// content, explicit sampling parameters.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Chat completion (non-streaming). Returns the assistant text.
    async fn chat(&self, request: CompletionRequest) -> Result<String, ApiError>;

    /// Generate one embedding per input text, in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;
}
