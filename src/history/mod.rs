// ABOUTME: Conversation store abstraction for bounded, expiring per-user history
// ABOUTME: Pluggable backend support (Redis, in-memory) behind one trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

//! # Conversation Store
//!
//! Append-only, size-bounded, time-expiring per-user conversation log.
//! Each stored entry is one completed turn: the user message paired with the
//! assistant reply, stamped with its creation time. Entries live newest-first
//! in storage and are rendered chronologically as role/content messages.
//!
//! Conversation continuity is best-effort: the [`factory::ConversationStore`]
//! wrapper absorbs cache outages and degrades to "no history" instead of
//! failing the caller's turn.

/// Backend selection and the outage-absorbing store wrapper
pub mod factory;
/// In-memory backend for tests and cache-less deployments
pub mod memory;
/// Redis backend
pub mod redis;

pub use factory::ConversationStore;

use crate::config::environment::RedisConnectionConfig;
use crate::constants::history;
use crate::errors::AppResult;
use crate::llm::ChatMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One completed conversation turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    /// Creation time, ISO-8601 UTC on the wire
    pub timestamp: DateTime<Utc>,
    /// What the user sent
    pub user_message: String,
    /// What the assistant replied (a real completion or a failure notice)
    pub assistant_message: String,
}

impl ConversationEntry {
    /// Create an entry stamped with the current time
    #[must_use]
    pub fn new(user_message: impl Into<String>, assistant_message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            user_message: user_message.into(),
            assistant_message: assistant_message.into(),
        }
    }
}

/// Conversation store configuration
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Turns retained per user; the store keeps at most this many entries
    pub depth: usize,
    /// Absolute expiry, reset on every append
    pub ttl: Duration,
    /// Redis URL; `None` selects the in-memory backend
    pub redis_url: Option<String>,
    /// Redis connection behavior
    pub connection: RedisConnectionConfig,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            depth: history::DEFAULT_DEPTH,
            ttl: Duration::from_secs(history::CONVERSATION_TTL_SECS),
            redis_url: None,
            connection: RedisConnectionConfig::default(),
        }
    }
}

/// Build the per-user storage key
#[must_use]
pub fn conversation_key(user_id: i64) -> String {
    format!("{}{user_id}", history::KEY_PREFIX)
}

/// Expand stored turns, oldest-first, into role/content messages
#[must_use]
pub fn entries_to_messages(entries: &[ConversationEntry]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(entries.len() * 2);
    for entry in entries {
        messages.push(ChatMessage::user(entry.user_message.clone()));
        messages.push(ChatMessage::assistant(entry.assistant_message.clone()));
    }
    messages
}

/// Storage backend for per-user conversation logs
///
/// `read` returns entries oldest-first; backends normalize from their
/// internal newest-first layout. Failures propagate here and are absorbed by
/// the [`ConversationStore`] wrapper.
#[async_trait::async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Store one turn, truncate to the configured depth, and reset expiry
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the cache write fails.
    async fn append(&self, user_id: i64, entry: &ConversationEntry) -> AppResult<()>;

    /// Read all retained turns, oldest-first
    ///
    /// # Errors
    ///
    /// Returns an error if the cache read fails.
    async fn read(&self, user_id: i64) -> AppResult<Vec<ConversationEntry>>;

    /// Delete all retained turns for the user
    ///
    /// # Errors
    ///
    /// Returns an error if the cache delete fails.
    async fn clear(&self, user_id: i64) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;

    #[test]
    fn test_conversation_key_format() {
        assert_eq!(conversation_key(42), "conversation:42");
    }

    #[test]
    fn test_entries_expand_in_pairs() {
        let entries = vec![
            ConversationEntry::new("hi", "hello"),
            ConversationEntry::new("how are you", "fine"),
        ];

        let messages = entries_to_messages(&entries);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].content, "hello");
        assert_eq!(messages[3].content, "fine");
    }
}
