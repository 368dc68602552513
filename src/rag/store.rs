//! VectorStore trait — abstract interface for the similarity-search backend.
//!
//! The engine treats the store as a black box that maps an embedding to the
//! nearest stored documents. The primary implementation is `ChromaStore` in
//! the `chroma` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::ApiError;

/// A single similarity-search result, tagged with its source collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    pub collection: String,
    pub id: String,
    pub document: String,
    pub metadata: Value,
    /// Dissimilarity score from the store; lower is more similar. The
    /// metric (cosine or L2) is collection-specific.
    pub distance: f64,
}

/// A stored document, as returned by inspection endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub document: String,
    pub metadata: Value,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Names of all collections currently present in the store.
    async fn list_collections(&self) -> Result<Vec<String>, ApiError>;

    /// Nearest-neighbor query against one collection. Results come back
    /// already tagged with the collection name, sorted by the store.
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<Hit>, ApiError>;

    /// Fetch up to `limit` documents from a collection, for inspection.
    async fn get(&self, collection: &str, limit: usize) -> Result<Vec<StoredDocument>, ApiError>;
}
