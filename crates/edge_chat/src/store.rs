//! Conversation Store.
//!
//! A process-wide map from conversation id to a bounded turn log. Each
//! conversation sits behind its own async mutex: a request holds the
//! [`HistoryHandle`] lock from reading the history until the new exchange
//! is appended, so two in-flight requests for the same id are serialized
//! and neither update is lost. Requests for different ids never contend
//! beyond the brief map lookup.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use edge_core::ConversationTurn;

/// Shared handle to one conversation's history.
pub type HistoryHandle = Arc<tokio::sync::Mutex<History>>;

/// Ordered turns of one conversation. Never holds system turns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    turns: VecDeque<ConversationTurn>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn to_vec(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    /// Append turns in order, skipping system turns.
    pub fn append(&mut self, turns: impl IntoIterator<Item = ConversationTurn>) {
        for turn in turns {
            if turn.is_system() {
                warn!("Refusing to store a system turn in conversation history");
                continue;
            }
            self.turns.push_back(turn);
        }
    }

    /// Keep only the newest `max_len` turns.
    pub fn trim(&mut self, max_len: usize) {
        let excess = self.turns.len().saturating_sub(max_len);
        if excess > 0 {
            self.turns.drain(..excess);
            debug!(dropped = excess, max_len, "Trimmed conversation history");
        }
    }

    /// Append a user/assistant pair and trim to `cap`.
    pub fn record_exchange(
        &mut self,
        user: impl Into<String>,
        assistant: impl Into<String>,
        cap: usize,
    ) {
        self.append([
            ConversationTurn::user(user),
            ConversationTurn::assistant(assistant),
        ]);
        self.trim(cap);
    }
}

/// Process-wide conversation map.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: Mutex<HashMap<String, HistoryHandle>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `id`, creating an empty history on first reference.
    pub fn get_or_create(&self, id: &str) -> HistoryHandle {
        let mut conversations = self.conversations.lock();
        conversations
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(conversation_id = %id, "Created conversation");
                Arc::new(tokio::sync::Mutex::new(History::new()))
            })
            .clone()
    }

    /// Append turns to `id`. System turns are skipped.
    pub async fn append(&self, id: &str, turns: impl IntoIterator<Item = ConversationTurn>) {
        let handle = self.get_or_create(id);
        let mut history = handle.lock().await;
        history.append(turns);
    }

    /// Keep only the newest `max_len` turns of `id`.
    pub async fn trim(&self, id: &str, max_len: usize) {
        let handle = self.conversations.lock().get(id).cloned();
        if let Some(handle) = handle {
            handle.lock().await.trim(max_len);
        }
    }

    /// Copy of the turns of `id`; empty when the id was never used.
    pub async fn snapshot(&self, id: &str) -> Vec<ConversationTurn> {
        let handle = self.conversations.lock().get(id).cloned();
        match handle {
            Some(handle) => handle.lock().await.to_vec(),
            None => Vec::new(),
        }
    }

    /// Number of known conversations.
    pub fn len(&self) -> usize {
        self.conversations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
