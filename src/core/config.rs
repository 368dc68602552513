//! Typed application configuration.
//!
//! Settings are read from `config.toml` (path overridable via
//! `PROPBOT_CONFIG`), with every section optional and falling back to
//! defaults that match the ingested Boston datasets. A handful of
//! deployment-specific values (endpoints, API key) can be overridden
//! through environment variables so the config file never has to carry
//! secrets.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::rag::collections::CollectionMetric;

#[derive(Debug, Clone)]
pub struct AppPaths {
    #[allow(dead_code)]
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub config_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let data_dir = env::var("PROPBOT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = env::var("HOME")
                    .or_else(|_| env::var("USERPROFILE"))
                    .unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".propbot")
            });
        let log_dir = data_dir.join("logs");
        let config_path = env::var("PROPBOT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        for dir in [&data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            log_dir,
            config_path,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub chat: ChatConfig,
    pub collections: CollectionsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embed_model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            chat_model: "gpt-4o-mini".to_string(),
            embed_model: "text-embedding-3-small".to_string(),
            temperature: 0.7,
            max_tokens: 600,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Nearest neighbors requested from each collection.
    pub k_per_collection: usize,
    /// Overall merged result cap.
    pub top_k: usize,
    /// Maximum collections searched per query.
    pub max_collections: usize,
    /// Per-collection query deadline.
    pub search_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k_per_collection: 3,
            top_k: 10,
            max_collections: 6,
            search_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Conversation turns injected into the context window.
    pub history_turns: usize,
    /// Character budget for each injected turn.
    pub turn_char_budget: usize,
    /// Parsed property bullets included in the context.
    pub property_limit: usize,
    /// Raw snippets included when nothing parsed.
    pub snippet_limit: usize,
    /// Character budget for each raw snippet.
    pub snippet_char_budget: usize,
    /// Character budget for source snippets in the response.
    pub source_snippet_budget: usize,
    /// Turns retained per session before FIFO eviction.
    pub max_turns: usize,
    /// Sessions retained before LRU eviction.
    pub session_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_turns: 6,
            turn_char_budget: 80,
            property_limit: 5,
            snippet_limit: 3,
            snippet_char_budget: 200,
            source_snippet_budget: 150,
            max_turns: 20,
            session_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CollectionsConfig {
    /// Distance metric per collection; unlisted collections are cosine,
    /// matching the ingestion default.
    pub metrics: HashMap<String, CollectionMetric>,
}

impl AppConfig {
    /// Load configuration from disk, then apply environment overrides.
    ///
    /// A missing config file is not an error; a malformed one is.
    pub fn load(paths: &AppPaths) -> anyhow::Result<AppConfig> {
        let mut config = if paths.config_path.exists() {
            let raw = fs::read_to_string(&paths.config_path)?;
            toml::from_str(&raw)?
        } else {
            AppConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("PROPBOT_STORE_URL") {
            if !url.trim().is_empty() {
                self.store.endpoint = url;
            }
        }
        if let Ok(url) = env::var("PROPBOT_LLM_URL") {
            if !url.trim().is_empty() {
                self.llm.base_url = url;
            }
        }
        let key = env::var("PROPBOT_LLM_API_KEY").or_else(|_| env::var("OPENAI_API_KEY"));
        if let Ok(key) = key {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key);
            }
        }
    }
}
