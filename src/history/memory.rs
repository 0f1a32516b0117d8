// ABOUTME: In-memory conversation backend with per-user expiry
// ABOUTME: Mirrors the Redis backend semantics for tests and cache-less runs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

use super::{ConversationEntry, HistoryBackend};
use crate::errors::AppResult;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Per-user log with an absolute expiry, reset on every append
#[derive(Debug)]
struct UserLog {
    entries: VecDeque<ConversationEntry>,
    expires_at: Instant,
}

impl UserLog {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory conversation log
///
/// Keeps the same bounded, expiring semantics as the Redis backend. Lazily
/// expires a user's log on the next access instead of running a background
/// sweeper.
#[derive(Clone)]
pub struct InMemoryHistory {
    store: Arc<RwLock<HashMap<i64, UserLog>>>,
    depth: usize,
    ttl: Duration,
}

impl InMemoryHistory {
    /// Create a new in-memory backend
    #[must_use]
    pub fn new(depth: usize, ttl: Duration) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            depth,
            ttl,
        }
    }
}

#[async_trait::async_trait]
impl HistoryBackend for InMemoryHistory {
    async fn append(&self, user_id: i64, entry: &ConversationEntry) -> AppResult<()> {
        let mut store = self.store.write().await;
        let log = store.entry(user_id).or_insert_with(|| UserLog {
            entries: VecDeque::new(),
            expires_at: Instant::now() + self.ttl,
        });

        if log.is_expired() {
            log.entries.clear();
        }

        log.entries.push_back(entry.clone());
        while log.entries.len() > self.depth {
            log.entries.pop_front();
        }
        log.expires_at = Instant::now() + self.ttl;

        Ok(())
    }

    async fn read(&self, user_id: i64) -> AppResult<Vec<ConversationEntry>> {
        let mut store = self.store.write().await;

        match store.get(&user_id) {
            Some(log) if log.is_expired() => {
                store.remove(&user_id);
                Ok(Vec::new())
            }
            Some(log) => Ok(log.entries.iter().cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn clear(&self, user_id: i64) -> AppResult<()> {
        self.store.write().await.remove(&user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_bounds_entries_to_depth() {
        let backend = InMemoryHistory::new(3, Duration::from_secs(60));

        for i in 0..5 {
            backend
                .append(1, &ConversationEntry::new(format!("q{i}"), format!("a{i}")))
                .await
                .unwrap();
        }

        let entries = backend.read(1).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].user_message, "q2");
        assert_eq!(entries[2].user_message, "q4");
    }

    #[tokio::test]
    async fn test_expired_log_reads_empty() {
        let backend = InMemoryHistory::new(3, Duration::from_millis(10));
        backend
            .append(1, &ConversationEntry::new("q", "a"))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        let entries = backend.read(1).await.unwrap();
        assert!(entries.is_empty());
    }
}
