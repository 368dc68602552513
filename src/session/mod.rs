//! In-memory conversation state, keyed by conversation id.
//!
//! Sessions live in a bounded LRU map so a long-running process cannot
//! accumulate them without limit. Each session is wrapped in its own
//! async mutex; a chat turn holds that lock for the whole
//! read-modify-write, which serializes concurrent requests for the same
//! conversation while leaving different conversations fully parallel.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use crate::rag::intent::SearchFilters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// One conversation's working memory.
#[derive(Debug)]
pub struct SessionContext {
    turns: VecDeque<Turn>,
    max_turns: usize,
    pub last_filters: SearchFilters,
    pub last_neighborhood: Option<String>,
    pub search_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionContext {
    fn new(max_turns: usize) -> Self {
        let now = Utc::now();
        Self {
            turns: VecDeque::new(),
            max_turns,
            last_filters: SearchFilters::default(),
            last_neighborhood: None,
            search_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn, evicting the oldest once the retention bound is
    /// exceeded. The turn being appended is never the one evicted.
    pub fn push_turn(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push_back(Turn {
            role,
            content: content.into(),
        });
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
        self.updated_at = Utc::now();
    }

    /// The most recent `n` turns, oldest first.
    pub fn recent_turns(&self, n: usize) -> Vec<Turn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }
}

pub type SessionHandle = Arc<AsyncMutex<SessionContext>>;

pub struct SessionStore {
    inner: Mutex<LruCache<String, SessionHandle>>,
    max_turns: usize,
}

impl SessionStore {
    pub fn new(capacity: usize, max_turns: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("non-zero capacity");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            max_turns,
        }
    }

    /// Fetch a session, creating it lazily on first sight of the id.
    pub fn get_or_create(&self, conversation_id: &str) -> SessionHandle {
        let mut cache = self.inner.lock();
        if let Some(handle) = cache.get(conversation_id) {
            return handle.clone();
        }
        let handle = Arc::new(AsyncMutex::new(SessionContext::new(self.max_turns)));
        cache.put(conversation_id.to_string(), handle.clone());
        handle
    }

    pub fn get(&self, conversation_id: &str) -> Option<SessionHandle> {
        self.inner.lock().get(conversation_id).cloned()
    }

    pub fn remove(&self, conversation_id: &str) -> bool {
        self.inner.lock().pop(conversation_id).is_some()
    }

    /// Ids of all live sessions, most recently used first.
    pub fn ids(&self) -> Vec<String> {
        self.inner.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
