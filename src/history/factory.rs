// ABOUTME: Conversation store wrapper with backend selection and outage absorption
// ABOUTME: Degrades to "no history" instead of propagating cache failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

use super::{
    entries_to_messages, memory::InMemoryHistory, redis::RedisHistory, ConversationEntry,
    HistoryBackend, HistoryConfig,
};
use crate::llm::ChatMessage;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Unified conversation store
///
/// Selects a backend from configuration and owns the degradation boundary:
/// `append` and `clear` absorb cache outages with a logged warning, and
/// `read` degrades to an empty history. Callers never see a cache failure.
#[derive(Clone)]
pub struct ConversationStore {
    backend: Option<Arc<dyn HistoryBackend>>,
    depth: usize,
}

impl ConversationStore {
    /// Create a store from configuration
    ///
    /// With a Redis URL configured, a connection failure is not fatal: the
    /// process continues without conversation history, matching the rest of
    /// the degraded-dependency policy. Without a URL the in-memory backend
    /// keeps history for the lifetime of the process.
    pub async fn connect(config: &HistoryConfig) -> Self {
        let backend: Option<Arc<dyn HistoryBackend>> = match &config.redis_url {
            Some(url) => match RedisHistory::connect(url, config).await {
                Ok(redis) => Some(Arc::new(redis)),
                Err(e) => {
                    warn!("Failed to initialize Redis conversation store: {e}");
                    info!("Continuing without conversation history");
                    None
                }
            },
            None => {
                info!("No cache configured; keeping conversation history in memory");
                Some(Arc::new(InMemoryHistory::new(config.depth, config.ttl)))
            }
        };

        Self {
            backend,
            depth: config.depth,
        }
    }

    /// Create a store over the in-memory backend
    #[must_use]
    pub fn in_memory(config: &HistoryConfig) -> Self {
        Self {
            backend: Some(Arc::new(InMemoryHistory::new(config.depth, config.ttl))),
            depth: config.depth,
        }
    }

    /// Create a store with no reachable backend; every operation degrades
    #[must_use]
    pub fn disconnected(config: &HistoryConfig) -> Self {
        Self {
            backend: None,
            depth: config.depth,
        }
    }

    /// Turns retained per user
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Store one completed turn, truncate to depth, and reset expiry
    ///
    /// Safe to call when the cache is unreachable: that is a no-op with a
    /// logged warning, not a failure.
    pub async fn append(&self, user_id: i64, user_message: &str, assistant_message: &str) {
        let Some(backend) = &self.backend else {
            debug!("Conversation store unavailable - skipping history append");
            return;
        };

        let entry = ConversationEntry::new(user_message, assistant_message);
        if let Err(e) = backend.append(user_id, &entry).await {
            warn!(user_id, "Error appending to conversation history: {e}");
        }
    }

    /// Read the retained history, oldest-first, expanded into role/content
    /// messages: each turn becomes a user message followed by the assistant
    /// reply. Returns an empty sequence when the cache is unreachable or the
    /// user has no history.
    pub async fn read(&self, user_id: i64) -> Vec<ChatMessage> {
        let Some(backend) = &self.backend else {
            debug!("Conversation store unavailable - returning empty history");
            return Vec::new();
        };

        match backend.read(user_id).await {
            Ok(entries) => entries_to_messages(&entries),
            Err(e) => {
                warn!(user_id, "Error reading conversation history: {e}");
                Vec::new()
            }
        }
    }

    /// Delete all retained turns for the user; no-op if already empty or the
    /// cache is unreachable
    pub async fn clear(&self, user_id: i64) {
        let Some(backend) = &self.backend else {
            debug!("Conversation store unavailable - skipping clear");
            return;
        };

        if let Err(e) = backend.clear(user_id).await {
            warn!(user_id, "Error clearing conversation history: {e}");
        }
    }
}
