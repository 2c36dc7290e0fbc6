//! Shared state behind the dialogue layer.
//!
//! `CoreState` is the single object a chat host holds. It exposes the five
//! medication operations as structured outcomes and never renders text. The
//! knowledge base is an immutable snapshot behind `RwLock<Arc<_>>`: readers
//! clone the `Arc` and keep a consistent view even if a reload swaps in a new
//! snapshot mid-turn.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::config::{AppConfig, ConfigError};
use crate::conversation_cache::{ConversationCache, ConversationCacheError, ConversationSummary};
use crate::knowledge::{self, ExplainResult, InteractionCheck, KnowledgeBase, KnowledgeError};
use crate::medications::{InsertPolicy, InsertResult, ListResult, ResetOutcome};

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    /// Current knowledge snapshot. Replaced wholesale on reload, never mutated.
    knowledge: RwLock<Arc<KnowledgeBase>>,
    conversations: ConversationCache,
    pub insert_policy: InsertPolicy,
    pub idle_timeout: Duration,
}

impl CoreState {
    /// Wrap an already-built knowledge base.
    pub fn new(knowledge: KnowledgeBase, insert_policy: InsertPolicy, idle_timeout: Duration) -> Self {
        Self {
            knowledge: RwLock::new(Arc::new(knowledge)),
            conversations: ConversationCache::new(),
            insert_policy,
            idle_timeout,
        }
    }

    /// Load the knowledge tables named by `config`. Refuses to start on any load error.
    pub fn load(config: &AppConfig) -> Result<Self, CoreError> {
        let kb = KnowledgeBase::load(&config.explanations_path, &config.interactions_path)?;
        tracing::info!(
            policy = config.insert_policy.as_str(),
            idle_timeout_secs = config.idle_timeout.as_secs(),
            "Medication core ready"
        );
        Ok(Self::new(kb, config.insert_policy, config.idle_timeout))
    }

    /// Build from `MEDCHECK_*` environment settings.
    pub fn from_env() -> Result<Self, CoreError> {
        let config = AppConfig::from_env()?;
        Self::load(&config)
    }

    // ── Knowledge snapshot ──────────────────────────────────

    /// The current knowledge snapshot.
    pub fn knowledge(&self) -> Result<Arc<KnowledgeBase>, CoreError> {
        let guard = self.knowledge.read().map_err(|_| CoreError::LockPoisoned)?;
        Ok(Arc::clone(&*guard))
    }

    /// Load fresh tables and swap them in atomically.
    ///
    /// On failure the previous snapshot keeps serving and the error is returned.
    pub fn reload_knowledge(&self, config: &AppConfig) -> Result<(), CoreError> {
        let fresh = match KnowledgeBase::load(&config.explanations_path, &config.interactions_path) {
            Ok(kb) => kb,
            Err(e) => {
                tracing::warn!(error = %e, "Knowledge reload failed, keeping current snapshot");
                return Err(e.into());
            }
        };
        let mut guard = self.knowledge.write().map_err(|_| CoreError::LockPoisoned)?;
        *guard = Arc::new(fresh);
        Ok(())
    }

    // ── Medication operations ───────────────────────────────

    /// Add a medication to the conversation's list.
    pub fn insert_medication(&self, conversation: &str, raw: &str) -> Result<InsertResult, CoreError> {
        let kb = self.knowledge()?;
        let result = self.conversations.with_conversation(conversation, |state| {
            state.medications.insert(raw, self.insert_policy, &kb)
        })?;
        tracing::debug!(conversation, input = raw, ?result, "Insert medication");
        Ok(result)
    }

    /// The conversation's medications in insertion order.
    pub fn list_medications(&self, conversation: &str) -> Result<ListResult, CoreError> {
        Ok(self
            .conversations
            .with_conversation(conversation, |state| state.medications.list_result())?)
    }

    /// Check every pair on the conversation's list against the interaction rules.
    pub fn check_interactions(&self, conversation: &str) -> Result<InteractionCheck, CoreError> {
        let kb = self.knowledge()?;
        Ok(self.conversations.with_conversation(conversation, |state| {
            knowledge::find_interactions(&state.medications, kb.interaction_rules())
        })?)
    }

    /// Clear the conversation's list. No confirmation step.
    pub fn reset_list(&self, conversation: &str) -> Result<ResetOutcome, CoreError> {
        let outcome = self
            .conversations
            .with_conversation(conversation, |state| state.medications.reset())?;
        tracing::debug!(conversation, cleared = outcome.cleared, "Medication list reset");
        Ok(outcome)
    }

    /// Explanation for a medication mention. Independent of any conversation.
    pub fn explain_medication(&self, raw: &str) -> Result<ExplainResult, CoreError> {
        let kb = self.knowledge()?;
        Ok(knowledge::explain(raw, &kb))
    }

    // ── Conversation lifecycle ──────────────────────────────

    /// Forget a conversation and its list. `None` if it was not live.
    pub fn end_conversation(&self, conversation: &str) -> Result<Option<ConversationSummary>, CoreError> {
        Ok(self.conversations.end(conversation)?)
    }

    /// Drop conversations idle past `idle_timeout`.
    pub fn evict_idle_conversations(&self) -> Result<Vec<ConversationSummary>, CoreError> {
        Ok(self.conversations.evict_idle(self.idle_timeout)?)
    }

    /// Number of live conversations.
    pub fn conversation_count(&self) -> Result<usize, CoreError> {
        Ok(self.conversations.len()?)
    }
}

// ═══════════════════════════════════════════════════════════
// Error type
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock poisoned")]
    LockPoisoned,
    #[error("Knowledge base unavailable: {0}")]
    Knowledge(#[from] KnowledgeError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<ConversationCacheError> for CoreError {
    fn from(err: ConversationCacheError) -> Self {
        match err {
            ConversationCacheError::LockPoisoned => CoreError::LockPoisoned,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
