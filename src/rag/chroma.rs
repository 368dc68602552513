//! Chroma-backed vector store.
//!
//! Talks to a Chroma server over its REST API. Collection names are
//! resolved to collection ids once and cached; the cache is refreshed
//! whenever an unknown name shows up, so collections added after startup
//! are picked up without a restart.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::config::StoreConfig;
use crate::core::errors::ApiError;

use super::store::{Hit, StoredDocument, VectorStore};

pub struct ChromaStore {
    base_url: String,
    client: Client,
    id_cache: RwLock<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
    name: String,
}

impl ChromaStore {
    pub fn new(config: &StoreConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            client,
            id_cache: RwLock::new(HashMap::new()),
        })
    }

    async fn fetch_collections(&self) -> Result<Vec<CollectionInfo>, ApiError> {
        let url = format!("{}/api/v1/collections", self.base_url);
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "collection listing failed: {}",
                res.status()
            )));
        }

        let collections: Vec<CollectionInfo> = res.json().await.map_err(ApiError::upstream)?;

        let mut cache = self.id_cache.write();
        cache.clear();
        for info in &collections {
            cache.insert(info.name.clone(), info.id.clone());
        }

        Ok(collections)
    }

    async fn resolve_id(&self, name: &str) -> Result<String, ApiError> {
        if let Some(id) = self.id_cache.read().get(name) {
            return Ok(id.clone());
        }

        self.fetch_collections().await?;

        self.id_cache
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("collection not found: {}", name)))
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, ApiError> {
        let res = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "store request failed ({}): {}",
                status, text
            )));
        }

        res.json().await.map_err(ApiError::upstream)
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn list_collections(&self) -> Result<Vec<String>, ApiError> {
        let collections = self.fetch_collections().await?;
        Ok(collections.into_iter().map(|c| c.name).collect())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<Hit>, ApiError> {
        let id = self.resolve_id(collection).await?;
        let url = format!("{}/api/v1/collections/{}/query", self.base_url, id);

        let body = json!({
            "query_embeddings": [embedding],
            "n_results": k,
            "include": ["documents", "metadatas", "distances"],
        });

        let payload = self.post(&url, &body).await?;

        // Chroma nests results one level per query embedding; we always
        // send exactly one.
        let ids = payload["ids"][0].as_array().cloned().unwrap_or_default();
        let documents = payload["documents"][0]
            .as_array()
            .cloned()
            .unwrap_or_default();
        let metadatas = payload["metadatas"][0]
            .as_array()
            .cloned()
            .unwrap_or_default();
        let distances = payload["distances"][0]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let mut hits = Vec::with_capacity(ids.len());
        for (idx, id_value) in ids.iter().enumerate() {
            let document = documents
                .get(idx)
                .and_then(|d| d.as_str())
                .unwrap_or_default();
            if document.is_empty() {
                continue;
            }
            hits.push(Hit {
                collection: collection.to_string(),
                id: id_value.as_str().unwrap_or_default().to_string(),
                document: document.to_string(),
                metadata: metadatas.get(idx).cloned().unwrap_or(Value::Null),
                distance: distances.get(idx).and_then(|d| d.as_f64()).unwrap_or(0.0),
            });
        }

        Ok(hits)
    }

    async fn get(&self, collection: &str, limit: usize) -> Result<Vec<StoredDocument>, ApiError> {
        let id = self.resolve_id(collection).await?;
        let url = format!("{}/api/v1/collections/{}/get", self.base_url, id);

        let body = json!({
            "limit": limit,
            "include": ["documents", "metadatas"],
        });

        let payload = self.post(&url, &body).await?;

        let ids = payload["ids"].as_array().cloned().unwrap_or_default();
        let documents = payload["documents"].as_array().cloned().unwrap_or_default();
        let metadatas = payload["metadatas"].as_array().cloned().unwrap_or_default();

        let mut result = Vec::with_capacity(ids.len());
        for (idx, id_value) in ids.iter().enumerate() {
            result.push(StoredDocument {
                id: id_value.as_str().unwrap_or_default().to_string(),
                document: documents
                    .get(idx)
                    .and_then(|d| d.as_str())
                    .unwrap_or_default()
                    .to_string(),
                metadata: metadatas.get(idx).cloned().unwrap_or(Value::Null),
            });
        }

        Ok(result)
    }
}
