//! Multi-collection similarity retrieval.
//!
//! The query is embedded exactly once per call and reused across every
//! collection. Per-collection searches fan out concurrently, each under
//! its own deadline; a failing or slow collection is logged and dropped
//! from the merge instead of aborting the request.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use crate::core::errors::ApiError;
use crate::llm::LlmClient;

use super::store::{Hit, VectorStore};

pub struct MultiRetriever {
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LlmClient>,
    search_timeout: Duration,
}

impl MultiRetriever {
    pub fn new(store: Arc<dyn VectorStore>, llm: Arc<dyn LlmClient>, search_timeout: Duration) -> Self {
        Self {
            store,
            llm,
            search_timeout,
        }
    }

    /// Search the given collections and merge the hits, globally sorted
    /// ascending by distance and truncated to `top_k`.
    ///
    /// The sort is stable, so equal distances keep collection-priority
    /// order (the order of `collections`), then insertion order.
    pub async fn retrieve(
        &self,
        query: &str,
        collections: &[String],
        k_per_collection: usize,
        top_k: usize,
    ) -> Result<Vec<Hit>, ApiError> {
        if collections.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.llm.embed(&[query.to_string()]).await?;
        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Upstream("no embedding returned".to_string()))?;

        let searches = collections.iter().map(|collection| {
            let embedding = &embedding;
            async move {
                tokio::time::timeout(
                    self.search_timeout,
                    self.store.query(collection, embedding, k_per_collection),
                )
                .await
            }
        });
        let results = join_all(searches).await;

        let mut merged: Vec<Hit> = Vec::new();
        for (collection, result) in collections.iter().zip(results) {
            match result {
                Ok(Ok(hits)) => merged.extend(hits),
                Ok(Err(err)) => {
                    tracing::warn!("Search failed for {}: {}", collection, err);
                }
                Err(_) => {
                    tracing::warn!(
                        "Search timed out for {} after {:?}",
                        collection,
                        self.search_timeout
                    );
                }
            }
        }

        merged.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        merged.truncate(top_k);
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::llm::CompletionRequest;
    use crate::rag::store::StoredDocument;

    use super::*;

    struct FakeStore {
        hits: HashMap<String, Vec<Hit>>,
        failing: Vec<String>,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                hits: HashMap::new(),
                failing: Vec::new(),
            }
        }

        fn with_collection(mut self, name: &str, distances: &[f64]) -> Self {
            let hits = distances
                .iter()
                .enumerate()
                .map(|(idx, d)| Hit {
                    collection: name.to_string(),
                    id: format!("{}_{}", name, idx),
                    document: format!("doc {} {}", name, idx),
                    metadata: Value::Null,
                    distance: *d,
                })
                .collect();
            self.hits.insert(name.to_string(), hits);
            self
        }

        fn with_failing(mut self, name: &str) -> Self {
            self.failing.push(name.to_string());
            self
        }
    }

    #[async_trait]
    impl VectorStore for FakeStore {
        async fn list_collections(&self) -> Result<Vec<String>, ApiError> {
            Ok(self.hits.keys().cloned().collect())
        }

        async fn query(
            &self,
            collection: &str,
            _embedding: &[f32],
            k: usize,
        ) -> Result<Vec<Hit>, ApiError> {
            if self.failing.iter().any(|f| f == collection) {
                return Err(ApiError::Upstream("connection refused".to_string()));
            }
            let mut hits = self.hits.get(collection).cloned().unwrap_or_default();
            hits.truncate(k);
            Ok(hits)
        }

        async fn get(
            &self,
            _collection: &str,
            _limit: usize,
        ) -> Result<Vec<StoredDocument>, ApiError> {
            Ok(Vec::new())
        }
    }

    struct FakeLlm {
        embed_calls: AtomicUsize,
    }

    impl FakeLlm {
        fn new() -> Self {
            Self {
                embed_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmClient for FakeLlm {
        async fn chat(&self, _request: CompletionRequest) -> Result<String, ApiError> {
            Ok("ok".to_string())
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            self.embed_calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(inputs.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
        }
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn merges_and_sorts_ascending_by_distance() {
        let store = Arc::new(
            FakeStore::new()
                .with_collection("a", &[0.9, 0.2])
                .with_collection("b", &[0.5]),
        );
        let llm = Arc::new(FakeLlm::new());
        let retriever = MultiRetriever::new(store, llm.clone(), Duration::from_secs(5));

        let hits = retriever
            .retrieve("q", &names(&["a", "b"]), 3, 10)
            .await
            .unwrap();

        let distances: Vec<f64> = hits.iter().map(|h| h.distance).collect();
        assert_eq!(distances, vec![0.2, 0.5, 0.9]);
        // One embedding for two collections.
        assert_eq!(llm.embed_calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn equal_distances_keep_collection_priority_order() {
        let store = Arc::new(
            FakeStore::new()
                .with_collection("first", &[0.5])
                .with_collection("second", &[0.5]),
        );
        let retriever = MultiRetriever::new(
            store,
            Arc::new(FakeLlm::new()),
            Duration::from_secs(5),
        );

        let hits = retriever
            .retrieve("q", &names(&["first", "second"]), 3, 10)
            .await
            .unwrap();

        assert_eq!(hits[0].collection, "first");
        assert_eq!(hits[1].collection, "second");
    }

    #[tokio::test]
    async fn one_failing_collection_does_not_abort_the_merge() {
        let store = Arc::new(
            FakeStore::new()
                .with_collection("good", &[0.3, 0.6])
                .with_collection("also_good", &[0.1])
                .with_failing("broken"),
        );
        let retriever = MultiRetriever::new(
            store,
            Arc::new(FakeLlm::new()),
            Duration::from_secs(5),
        );

        let hits = retriever
            .retrieve("q", &names(&["broken", "good", "also_good"]), 3, 10)
            .await
            .unwrap();

        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| h.collection != "broken"));
        assert_eq!(hits[0].distance, 0.1);
    }

    #[tokio::test]
    async fn result_is_truncated_to_top_k() {
        let store = Arc::new(
            FakeStore::new().with_collection("a", &[0.1, 0.2, 0.3, 0.4, 0.5]),
        );
        let retriever = MultiRetriever::new(
            store,
            Arc::new(FakeLlm::new()),
            Duration::from_secs(5),
        );

        let hits = retriever.retrieve("q", &names(&["a"]), 5, 2).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn empty_collection_list_skips_embedding() {
        let store = Arc::new(FakeStore::new());
        let llm = Arc::new(FakeLlm::new());
        let retriever = MultiRetriever::new(store, llm.clone(), Duration::from_secs(5));

        let hits = retriever.retrieve("q", &[], 3, 10).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(llm.embed_calls.load(AtomicOrdering::SeqCst), 0);
    }
}
