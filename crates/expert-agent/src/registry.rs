//! The Conversation Registry: an in-memory map of live conversations keyed
//! by current context id.
//!
//! The authoritative state of a turn in progress lives in the owning
//! conversation task's local `ConversationState` ([`crate::conversation`]) —
//! this map is a snapshot for the registry-uniqueness invariant and for
//! operational introspection, not the thing pipelines branch on. Mutated by
//! the Bid Pipeline (insert, via the conversation task it spawns), the
//! Question→Answer Pipeline (remove, re-insert under a new key), and
//! `Lifecycle::stop` (clear) — one writer owns any given key at a time, the
//! same shape a single-writer key-value store gives each of its keys.

use std::collections::HashMap;
use std::sync::Mutex;

/// A point-in-time view of one live Conversation.
#[derive(Debug, Clone)]
pub struct ConversationSnapshot {
    pub ask_id: String,
    pub session_pubkey: String,
    pub payment_hash: String,
    pub created_at: i64,
    pub history_len: usize,
}

#[derive(Default)]
pub struct Registry {
    inner: Mutex<HashMap<String, ConversationSnapshot>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a Conversation under its current context id. The uniqueness
    /// invariant holds as long as callers only ever insert under a context
    /// id they've already removed any prior entry for.
    pub fn insert(&self, context_id: String, snapshot: ConversationSnapshot) {
        self.inner.lock().unwrap().insert(context_id, snapshot);
    }

    pub fn remove(&self, context_id: &str) -> Option<ConversationSnapshot> {
        self.inner.lock().unwrap().remove(context_id)
    }

    pub fn contains(&self, context_id: &str) -> bool {
        self.inner.lock().unwrap().contains_key(context_id)
    }

    pub fn get(&self, context_id: &str) -> Option<ConversationSnapshot> {
        self.inner.lock().unwrap().get(context_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every live Conversation. Called once, by `Lifecycle::stop`.
    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }
}
