// ABOUTME: Redis conversation backend with connection pooling and TTL reset
// ABOUTME: Push-newest-to-front, trim-to-depth, and absolute expiry on every append
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

use super::{conversation_key, ConversationEntry, HistoryBackend, HistoryConfig};
use crate::config::environment::RedisConnectionConfig;
use crate::errors::{AppError, AppResult};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{info, warn};

/// Redis-backed conversation log
///
/// Uses Redis `ConnectionManager` for automatic reconnection. Each user's
/// history is one list under `conversation:{user_id}`: LPUSH keeps the
/// newest turn at the front, LTRIM bounds the list to the configured depth,
/// and EXPIRE resets the absolute TTL. The three commands run sequentially,
/// not atomically; a crash between them leaves at worst one extra entry or a
/// slightly stale TTL.
#[derive(Clone)]
pub struct RedisHistory {
    manager: ConnectionManager,
    depth: usize,
    ttl_secs: i64,
}

impl RedisHistory {
    /// Connect to Redis and build the backend
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established within the
    /// configured retry budget.
    pub async fn connect(url: &str, config: &HistoryConfig) -> AppResult<Self> {
        let conn_config = &config.connection;

        info!(
            "Connecting to Redis at {} (timeout={}s, retries={})",
            url, conn_config.connection_timeout_secs, conn_config.initial_connection_retries
        );

        let client = redis::Client::open(url)
            .map_err(|e| AppError::internal(format!("Failed to create Redis client: {e}")))?;

        let manager = Self::connect_with_retry(&client, conn_config).await?;

        info!("Successfully connected to Redis");

        Ok(Self {
            manager,
            depth: config.depth,
            ttl_secs: i64::try_from(config.ttl.as_secs()).unwrap_or(i64::MAX),
        })
    }

    /// Connect with exponential backoff retry on failure
    async fn connect_with_retry(
        client: &redis::Client,
        conn_config: &RedisConnectionConfig,
    ) -> AppResult<ConnectionManager> {
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Duration::from_secs(conn_config.connection_timeout_secs))
            .set_response_timeout(Duration::from_secs(conn_config.response_timeout_secs));

        let max_retries = conn_config.initial_connection_retries;
        let mut delay_ms = conn_config.initial_retry_delay_ms;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            match ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await {
                Ok(manager) => {
                    if attempt > 0 {
                        info!("Redis connection established after {} retries", attempt);
                    }
                    return Ok(manager);
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < max_retries {
                        warn!(
                            "Redis connection attempt {}/{} failed, retrying in {}ms",
                            attempt + 1,
                            max_retries + 1,
                            delay_ms
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = (delay_ms * 2).min(conn_config.max_retry_delay_ms);
                    }
                }
            }
        }

        Err(AppError::internal(format!(
            "Failed to connect to Redis after {} attempts: {}",
            max_retries + 1,
            last_error.map_or_else(|| "unknown error".to_owned(), |e| e.to_string())
        )))
    }
}

#[async_trait::async_trait]
impl HistoryBackend for RedisHistory {
    async fn append(&self, user_id: i64, entry: &ConversationEntry) -> AppResult<()> {
        let key = conversation_key(user_id);
        let payload = serde_json::to_string(entry)?;
        let mut conn = self.manager.clone();

        conn.lpush::<_, _, ()>(&key, payload)
            .await
            .map_err(|e| AppError::internal(format!("Cache error: {e}")))?;

        let end = isize::try_from(self.depth).unwrap_or(isize::MAX).saturating_sub(1);
        conn.ltrim::<_, ()>(&key, 0, end)
            .await
            .map_err(|e| AppError::internal(format!("Cache error: {e}")))?;

        conn.expire::<_, ()>(&key, self.ttl_secs)
            .await
            .map_err(|e| AppError::internal(format!("Cache error: {e}")))?;

        Ok(())
    }

    async fn read(&self, user_id: i64) -> AppResult<Vec<ConversationEntry>> {
        let key = conversation_key(user_id);
        let mut conn = self.manager.clone();

        let raw: Vec<String> = conn
            .lrange(&key, 0, -1)
            .await
            .map_err(|e| AppError::internal(format!("Cache error: {e}")))?;

        // Newest-first in storage; parse then reverse to chronological order.
        // Malformed entries are skipped rather than failing the whole read.
        let mut entries: Vec<ConversationEntry> = raw
            .iter()
            .filter_map(|payload| match serde_json::from_str(payload) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Failed to parse conversation entry, skipping: {e}");
                    None
                }
            })
            .collect();
        entries.reverse();

        Ok(entries)
    }

    async fn clear(&self, user_id: i64) -> AppResult<()> {
        let key = conversation_key(user_id);
        let mut conn = self.manager.clone();

        conn.del::<_, ()>(&key)
            .await
            .map_err(|e| AppError::internal(format!("Cache error: {e}")))?;

        Ok(())
    }
}
