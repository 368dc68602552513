use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::llm::{LlmClient, OpenAiClient};
use crate::rag::chroma::ChromaStore;
use crate::rag::engine::RagEngine;
use crate::rag::store::VectorStore;
use crate::session::SessionStore;

/// Shared application state handed to every handler.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn VectorStore>,
    pub sessions: Arc<SessionStore>,
    pub engine: RagEngine,
}

impl AppState {
    pub fn initialize(config: AppConfig) -> anyhow::Result<Arc<Self>> {
        let store: Arc<dyn VectorStore> = Arc::new(ChromaStore::new(&config.store)?);
        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(&config.llm)?);
        let sessions = Arc::new(SessionStore::new(
            config.chat.session_capacity,
            config.chat.max_turns,
        ));
        let engine = RagEngine::new(&config, store.clone(), llm, sessions.clone());

        Ok(Arc::new(AppState {
            config,
            store,
            sessions,
            engine,
        }))
    }
}
