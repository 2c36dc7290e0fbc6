//! Per-conversation state registry.
//!
//! Each conversation owns one [`MedicationList`], created on the first turn
//! that touches it and dropped when the conversation ends or sits idle past
//! the configured timeout.
//!
//! Key properties:
//! - Lists are never shared between conversations
//! - Operations on one conversation are serialized by its own `Mutex`
//! - The registry map is behind an `RwLock`; lookups of existing
//!   conversations only take the read side
//! - A turn only runs against the conversation currently registered under
//!   its id, never against one evicted mid-lookup

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::medications::MedicationList;

// ═══════════════════════════════════════════════════════════
// Conversation — one dialogue's state
// ═══════════════════════════════════════════════════════════

/// State owned by a single conversation.
#[derive(Debug)]
pub struct Conversation {
    id: String,
    pub medications: MedicationList,
    started_at: NaiveDateTime,
    last_activity: Instant,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            medications: MedicationList::new(),
            started_at: chrono::Local::now().naive_local(),
            last_activity: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> NaiveDateTime {
        self.started_at
    }

    /// Record a turn against this conversation.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            started_at: self.started_at,
            medications: self.medications.len(),
        }
    }
}

/// What a conversation looked like when it was ended or evicted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub started_at: NaiveDateTime,
    /// Medications on the list at the time.
    pub medications: usize,
}

/// Shared handle to one conversation's state.
pub type ConversationHandle = Arc<Mutex<Conversation>>;

// ═══════════════════════════════════════════════════════════
// ConversationCache — all live conversations
// ═══════════════════════════════════════════════════════════

pub struct ConversationCache {
    conversations: RwLock<HashMap<String, ConversationHandle>>,
}

impl ConversationCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Get a conversation, creating it on first use.
    pub fn get_or_create(&self, id: &str) -> Result<ConversationHandle, ConversationCacheError> {
        if let Some(handle) = self.get(id)? {
            return Ok(handle);
        }

        let mut map = self
            .conversations
            .write()
            .map_err(|_| ConversationCacheError::LockPoisoned)?;
        // Another caller may have created it between the read and write locks.
        let handle = map
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::debug!(conversation = %id, "Conversation started");
                Arc::new(Mutex::new(Conversation::new(id)))
            })
            .clone();
        Ok(handle)
    }

    /// Run `f` against a live conversation, creating it on first use.
    ///
    /// The conversation is locked and marked active before `f` runs. If the
    /// handle was evicted or ended between lookup and lock, the lookup is
    /// retried so the turn lands in the registered conversation.
    pub fn with_conversation<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Conversation) -> R,
    ) -> Result<R, ConversationCacheError> {
        loop {
            let handle = self.get_or_create(id)?;
            if let Some(mut conversation) = self.lock_live(id, &handle)? {
                conversation.touch();
                return Ok(f(&mut *conversation));
            }
            tracing::debug!(conversation = %id, "Conversation removed before lock, retrying");
        }
    }

    /// Lock `handle`, or `None` if it is no longer the one registered under `id`.
    ///
    /// Lock order is conversation then registry; eviction only `try_lock`s
    /// conversations while holding the registry, so this cannot deadlock.
    fn lock_live<'a>(
        &self,
        id: &str,
        handle: &'a ConversationHandle,
    ) -> Result<Option<MutexGuard<'a, Conversation>>, ConversationCacheError> {
        let conversation = handle
            .lock()
            .map_err(|_| ConversationCacheError::LockPoisoned)?;
        let map = self
            .conversations
            .read()
            .map_err(|_| ConversationCacheError::LockPoisoned)?;
        let live = map
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, handle));
        Ok(live.then_some(conversation))
    }

    /// Get an existing conversation.
    pub fn get(&self, id: &str) -> Result<Option<ConversationHandle>, ConversationCacheError> {
        let map = self
            .conversations
            .read()
            .map_err(|_| ConversationCacheError::LockPoisoned)?;
        Ok(map.get(id).cloned())
    }

    /// Drop a conversation and its list. Returns `None` if it was not live.
    ///
    /// Waits for an in-flight turn on the conversation to finish before
    /// reading its summary.
    pub fn end(&self, id: &str) -> Result<Option<ConversationSummary>, ConversationCacheError> {
        let removed = self
            .conversations
            .write()
            .map_err(|_| ConversationCacheError::LockPoisoned)?
            .remove(id);
        let Some(handle) = removed else {
            return Ok(None);
        };

        let summary = handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .summary();
        tracing::debug!(
            conversation = %id,
            started_at = %summary.started_at,
            medications = summary.medications,
            "Conversation ended"
        );
        Ok(Some(summary))
    }

    /// Evict conversations idle for at least `timeout`.
    ///
    /// A conversation whose lock is held by an in-flight turn is busy, not
    /// idle, and is skipped. A poisoned conversation is always evicted.
    pub fn evict_idle(
        &self,
        timeout: Duration,
    ) -> Result<Vec<ConversationSummary>, ConversationCacheError> {
        let mut map = self
            .conversations
            .write()
            .map_err(|_| ConversationCacheError::LockPoisoned)?;

        let mut evicted = Vec::new();
        map.retain(|_, handle| {
            let (conversation, poisoned) = match handle.try_lock() {
                Ok(conversation) => (conversation, false),
                Err(TryLockError::WouldBlock) => return true,
                Err(TryLockError::Poisoned(e)) => (e.into_inner(), true),
            };
            if !poisoned && conversation.idle_for() < timeout {
                return true;
            }
            let summary = conversation.summary();
            tracing::debug!(
                conversation = %summary.id,
                started_at = %summary.started_at,
                medications = summary.medications,
                poisoned,
                "Evicting idle conversation"
            );
            evicted.push(summary);
            false
        });

        if !evicted.is_empty() {
            tracing::info!(evicted = evicted.len(), remaining = map.len(), "Evicted idle conversations");
        }

        Ok(evicted)
    }

    /// Number of live conversations.
    pub fn len(&self) -> Result<usize, ConversationCacheError> {
        let map = self
            .conversations
            .read()
            .map_err(|_| ConversationCacheError::LockPoisoned)?;
        Ok(map.len())
    }

    /// Whether no conversation is live.
    pub fn is_empty(&self) -> Result<bool, ConversationCacheError> {
        Ok(self.len()? == 0)
    }
}

impl Default for ConversationCache {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Error type
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConversationCacheError {
    #[error("Conversation registry lock poisoned")]
    LockPoisoned,
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
