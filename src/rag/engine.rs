//! Chat orchestration: classify → select → retrieve → compose →
//! synthesize → assemble, with session memory read before and written
//! after every non-greeting turn.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::core::config::AppConfig;
use crate::llm::{CompletionRequest, LlmClient};
use crate::session::{Role, SessionStore};

use super::collections::{CollectionSelector, MetricRegistry};
use super::context::{truncate_chars, ContextComposer};
use super::intent::{self, IntentKind, SearchFilters};
use super::parser::{self, ParsedProperty};
use super::retriever::MultiRetriever;
use super::store::VectorStore;

const SYSTEM_PROMPT: &str = "\
You are PropBot, a warm, knowledgeable Boston real estate assistant.

- If the user has not said whether they want to rent or buy, ask that first.
- Use the EXACT addresses, prices and features provided in the context; never invent listings.
- Show no match scores or confidence percentages.
- Ask clarifying questions one at a time (budget, bedrooms, neighborhood), then show options.
- When no data was found, suggest different search criteria instead of guessing.
- Reference what the user told you earlier in the conversation.
- Keep responses to 2-4 short paragraphs, friendly and conversational.";

const FALLBACK_ANSWER: &str =
    "I apologize, but I encountered an error. Please try rephrasing your question! 🏠";

/// The single caller-facing result shape.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub documents_retrieved: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub collection: String,
    /// Normalized 0–100 relevance, one decimal place.
    pub relevance: f64,
    pub snippet: String,
}

pub struct RagEngine {
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LlmClient>,
    sessions: Arc<SessionStore>,
    selector: CollectionSelector,
    retriever: MultiRetriever,
    composer: ContextComposer,
    metrics: MetricRegistry,
    k_per_collection: usize,
    top_k: usize,
    history_turns: usize,
    source_snippet_budget: usize,
    temperature: f64,
    max_tokens: u32,
}

impl RagEngine {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LlmClient>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        let retriever = MultiRetriever::new(
            store.clone(),
            llm.clone(),
            Duration::from_secs(config.retrieval.search_timeout_secs),
        );

        Self {
            store,
            llm,
            sessions,
            selector: CollectionSelector::new(config.retrieval.max_collections),
            retriever,
            composer: ContextComposer::new(&config.chat),
            metrics: MetricRegistry::new(config.collections.metrics.clone()),
            k_per_collection: config.retrieval.k_per_collection,
            top_k: config.retrieval.top_k,
            history_turns: config.chat.history_turns,
            source_snippet_budget: config.chat.source_snippet_budget,
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        }
    }

    /// Answer one query within a conversation. Never fails: every error
    /// path degrades to a well-formed response.
    pub async fn chat(&self, query: &str, conversation_id: &str) -> ChatResponse {
        let handle = self.sessions.get_or_create(conversation_id);
        let mut session = handle.lock().await;

        let intent = intent::classify(
            query,
            Some(&session.last_filters),
            session.last_neighborhood.as_deref(),
        );

        if intent.kind == IntentKind::Greeting {
            let answer = greeting_reply(intent.greeting_name.as_deref());
            session.push_turn(Role::User, query);
            session.push_turn(Role::Assistant, answer.as_str());
            return ChatResponse {
                answer,
                sources: Vec::new(),
                documents_retrieved: 0,
            };
        }

        let available = match self.store.list_collections().await {
            Ok(names) => Some(names),
            Err(err) => {
                tracing::warn!("Could not list collections: {}", err);
                None
            }
        };
        let selected = self.selector.select(query, available.as_deref());
        tracing::info!(query, collections = ?selected, "searching");

        let retrieval_query = if intent.context_used {
            augment_query(query, &intent.filters)
        } else {
            query.to_string()
        };

        let hits = match self
            .retriever
            .retrieve(
                &retrieval_query,
                &selected,
                self.k_per_collection,
                self.top_k,
            )
            .await
        {
            Ok(hits) => hits,
            Err(err) => {
                tracing::warn!("Retrieval failed: {}", err);
                Vec::new()
            }
        };

        let parsed: Vec<ParsedProperty> =
            hits.iter().map(|hit| parser::parse(&hit.document)).collect();
        let turns = session.recent_turns(self.history_turns);
        let context = self.composer.compose(query, &turns, &hits, &parsed);

        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: context,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let answer = match self.llm.chat(request).await {
            Ok(answer) => answer,
            Err(err) => {
                tracing::error!("Answer synthesis failed: {}", err);
                return ChatResponse {
                    answer: FALLBACK_ANSWER.to_string(),
                    sources: Vec::new(),
                    documents_retrieved: 0,
                };
            }
        };

        session.push_turn(Role::User, query);
        session.push_turn(Role::Assistant, answer.as_str());
        merge_filters(&mut session.last_filters, &intent.filters);
        if let Some(neighborhood) = &intent.filters.neighborhood {
            session.last_neighborhood = Some(neighborhood.clone());
        }
        session.search_count += 1;

        let sources = hits
            .iter()
            .take(5)
            .map(|hit| SourceRef {
                collection: hit.collection.clone(),
                relevance: round1(self.metrics.relevance(&hit.collection, hit.distance)),
                snippet: truncate_chars(&hit.document, self.source_snippet_budget),
            })
            .collect();

        ChatResponse {
            answer,
            sources,
            documents_retrieved: hits.len(),
        }
    }
}

fn greeting_reply(name: Option<&str>) -> String {
    match name {
        Some(name) => format!(
            "Hi {}! 👋 Great to meet you! I'm PropBot. I can help you find homes, \
             answer neighborhood questions, check crime rates, and more!",
            name
        ),
        None => "Hi there! 👋 I'm PropBot, your Boston real estate assistant. \
                 How can I help you today?"
            .to_string(),
    }
}

/// Fold carried-forward filters back into the retrieval query so the
/// embedding reflects them.
fn augment_query(query: &str, filters: &SearchFilters) -> String {
    let mut parts = vec![query.to_string()];
    if let Some(bedrooms) = filters.bedrooms {
        parts.push(format!("{} bedroom", bedrooms));
    }
    if let Some(max_price) = filters.max_price {
        parts.push(format!("under ${:.0}", max_price));
    }
    if let Some(neighborhood) = &filters.neighborhood {
        parts.push(format!("in {}", neighborhood));
    }
    parts.join(" ")
}

fn merge_filters(last: &mut SearchFilters, new: &SearchFilters) {
    if new.bedrooms.is_some() {
        last.bedrooms = new.bedrooms;
    }
    if new.max_price.is_some() {
        last.max_price = new.max_price;
    }
    if new.neighborhood.is_some() {
        last.neighborhood = new.neighborhood.clone();
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::core::config::AppConfig;
    use crate::core::errors::ApiError;
    use crate::rag::store::{Hit, StoredDocument};

    use super::*;

    struct FakeStore {
        collections: Vec<String>,
        document: String,
    }

    #[async_trait]
    impl VectorStore for FakeStore {
        async fn list_collections(&self) -> Result<Vec<String>, ApiError> {
            Ok(self.collections.clone())
        }

        async fn query(
            &self,
            collection: &str,
            _embedding: &[f32],
            k: usize,
        ) -> Result<Vec<Hit>, ApiError> {
            Ok((0..k.min(2))
                .map(|idx| Hit {
                    collection: collection.to_string(),
                    id: format!("{}_{}", collection, idx),
                    document: self.document.clone(),
                    metadata: Value::Null,
                    distance: 0.2 + idx as f64 * 0.1,
                })
                .collect())
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
        fail_chat: AtomicBool,
    }

    impl FakeLlm {
        fn new(fail_chat: bool) -> Self {
            Self {
                fail_chat: AtomicBool::new(fail_chat),
            }
        }
    }

    #[async_trait]
    impl LlmClient for FakeLlm {
        async fn chat(&self, request: CompletionRequest) -> Result<String, ApiError> {
            if self.fail_chat.load(Ordering::SeqCst) {
                return Err(ApiError::Upstream("llm down".to_string()));
            }
            Ok(format!("answer based on {} chars", request.user.len()))
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(inputs.iter().map(|_| vec![0.5, 0.5]).collect())
        }
    }

    fn engine(fail_chat: bool) -> RagEngine {
        let config = AppConfig::default();
        let store = Arc::new(FakeStore {
            collections: vec!["properties".to_string(), "boston_properties".to_string()],
            document: "104 Putnam St, Boston, MA 02128. THREE-FAM DWELLING. 6. 3. 719,400"
                .to_string(),
        });
        let llm = Arc::new(FakeLlm::new(fail_chat));
        let sessions = Arc::new(SessionStore::new(
            config.chat.session_capacity,
            config.chat.max_turns,
        ));
        RagEngine::new(&config, store, llm, sessions)
    }

    #[tokio::test]
    async fn greeting_short_circuits_retrieval() {
        let engine = engine(false);
        let response = engine.chat("hi", "conv").await;
        assert!(response.answer.starts_with("Hi there!"));
        assert!(response.sources.is_empty());
        assert_eq!(response.documents_retrieved, 0);

        // Both turns recorded.
        let session = engine.sessions.get("conv").unwrap();
        assert_eq!(session.lock().await.turn_count(), 2);
    }

    #[tokio::test]
    async fn greeting_uses_extracted_name() {
        let engine = engine(false);
        let response = engine.chat("hello, i'm dana", "conv").await;
        assert!(response.answer.starts_with("Hi Dana!"));
    }

    #[tokio::test]
    async fn property_query_retrieves_and_assembles_sources() {
        let engine = engine(false);
        let response = engine
            .chat("show me 3 bedroom properties in Back Bay", "conv")
            .await;

        assert!(response.documents_retrieved > 0);
        assert!(!response.sources.is_empty());
        assert!(response.sources.len() <= 5);
        for source in &response.sources {
            assert!((0.0..=100.0).contains(&source.relevance));
            assert!(!source.snippet.is_empty());
        }
        assert!(response.answer.starts_with("answer based on"));

        let session = engine.sessions.get("conv").unwrap();
        let session = session.lock().await;
        assert_eq!(session.search_count, 1);
        assert_eq!(session.last_filters.bedrooms, Some(3));
        assert_eq!(session.last_neighborhood.as_deref(), Some("Back Bay"));
    }

    #[tokio::test]
    async fn synthesis_failure_degrades_to_fallback() {
        let engine = engine(true);
        let response = engine.chat("show me homes in fenway", "conv").await;
        assert_eq!(response.answer, FALLBACK_ANSWER);
        assert!(response.sources.is_empty());
        assert_eq!(response.documents_retrieved, 0);
    }

    #[tokio::test]
    async fn cheaper_follow_up_reuses_session_memory() {
        let engine = engine(false);
        engine
            .chat("show me homes in back bay under $1000k", "conv")
            .await;
        let response = engine.chat("what about cheaper options?", "conv").await;
        assert!(response.documents_retrieved > 0);

        let session = engine.sessions.get("conv").unwrap();
        let session = session.lock().await;
        assert_eq!(session.last_filters.max_price, Some(800_000.0));
        assert_eq!(session.search_count, 2);
    }

    #[test]
    fn augmented_query_folds_filters_in() {
        let filters = SearchFilters {
            bedrooms: Some(2),
            max_price: Some(800_000.0),
            neighborhood: Some("Back Bay".to_string()),
        };
        let augmented = augment_query("what about cheaper options?", &filters);
        assert_eq!(
            augmented,
            "what about cheaper options? 2 bedroom under $800000 in Back Bay"
        );
    }
}
