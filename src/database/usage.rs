// ABOUTME: Usage telemetry database operations
// ABOUTME: Event rows per interaction plus one aggregate statistics row per user
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

use super::Database;
use crate::errors::AppResult;
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use sqlx::Row;

/// One interaction event to persist
#[derive(Debug, Clone)]
pub struct InteractionRecord {
    /// User who sent the message
    pub user_id: i64,
    /// Chat the message arrived in
    pub chat_id: i64,
    /// What happened, e.g. "message"
    pub action: String,
    /// Optional sub-type of the inbound payload
    pub message_type: Option<String>,
    /// Inbound message length in characters (token proxy)
    pub message_length: i64,
    /// Reply length in characters (token proxy)
    pub response_length: i64,
}

/// Aggregate usage statistics for one user
#[derive(Debug, Clone)]
pub struct UserStats {
    /// All-time interaction count
    pub total_messages: i64,
    /// Interactions since the current UTC day started
    pub messages_today: i64,
    /// Interactions since the current UTC week (Monday) started
    pub messages_this_week: i64,
    /// Cumulative message + response length (token proxy)
    pub tokens_used: i64,
    /// `tokens_used / total_messages`
    pub avg_response_length: i64,
    /// First interaction time
    pub first_used: DateTime<Utc>,
    /// Most recent interaction time
    pub last_used: DateTime<Utc>,
}

impl Database {
    /// Create interaction and statistics tables
    pub(super) async fn migrate_usage(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS user_interactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                chat_id INTEGER NOT NULL,
                action TEXT NOT NULL,
                message_type TEXT,
                message_length INTEGER NOT NULL DEFAULT 0,
                response_length INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL
            )
            ",
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS user_stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE,
                total_messages INTEGER NOT NULL DEFAULT 0,
                messages_today INTEGER NOT NULL DEFAULT 0,
                messages_this_week INTEGER NOT NULL DEFAULT 0,
                tokens_used INTEGER NOT NULL DEFAULT 0,
                avg_response_length INTEGER NOT NULL DEFAULT 0,
                first_used DATETIME NOT NULL,
                last_used DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            ",
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_user_interactions_user_id \
             ON user_interactions(user_id)",
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_user_interactions_created_at \
             ON user_interactions(created_at)",
        )
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Persist one interaction event and refresh the user's aggregate row
    ///
    /// # Errors
    ///
    /// Returns an error if a database write fails.
    pub async fn record_interaction(&self, record: &InteractionRecord) -> AppResult<()> {
        let now = Utc::now();

        sqlx::query(
            r"
            INSERT INTO user_interactions
                (user_id, chat_id, action, message_type, message_length, response_length, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(record.user_id)
        .bind(record.chat_id)
        .bind(&record.action)
        .bind(record.message_type.as_deref())
        .bind(record.message_length)
        .bind(record.response_length)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.update_user_stats(record, now).await
    }

    /// Refresh the aggregate row. Running totals are incremented inside the
    /// upsert itself, so concurrent recordings for the same user cannot lose
    /// increments. The day and week counts are recounted from stored event
    /// rows so they self-correct across UTC day and week rollover.
    async fn update_user_stats(
        &self,
        record: &InteractionRecord,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let tokens_delta = record.message_length + record.response_length;

        let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let week_start = day_start
            - Duration::days(i64::from(day_start.weekday().num_days_from_monday()));

        let messages_today = self.count_interactions_since(record.user_id, day_start).await?;
        let messages_this_week = self
            .count_interactions_since(record.user_id, week_start)
            .await?;

        sqlx::query(
            r"
            INSERT INTO user_stats
                (user_id, total_messages, messages_today, messages_this_week,
                 tokens_used, avg_response_length, first_used, last_used, updated_at)
            VALUES (?, 1, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                total_messages = user_stats.total_messages + 1,
                tokens_used = user_stats.tokens_used + excluded.tokens_used,
                avg_response_length =
                    (user_stats.tokens_used + excluded.tokens_used)
                        / (user_stats.total_messages + 1),
                messages_today = excluded.messages_today,
                messages_this_week = excluded.messages_this_week,
                last_used = excluded.last_used,
                updated_at = excluded.updated_at
            ",
        )
        .bind(record.user_id)
        .bind(messages_today)
        .bind(messages_this_week)
        .bind(tokens_delta)
        .bind(tokens_delta)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Count a user's interactions at or after `since`
    async fn count_interactions_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM user_interactions \
             WHERE user_id = ? AND created_at >= ?",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(self.pool())
        .await?;

        Ok(row.get::<i64, _>("count"))
    }

    /// Fetch the aggregate row for a user, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the database read fails.
    pub async fn get_user_stats(&self, user_id: i64) -> AppResult<Option<UserStats>> {
        let row = sqlx::query(
            r"
            SELECT total_messages, messages_today, messages_this_week,
                   tokens_used, avg_response_length, first_used, last_used
            FROM user_stats
            WHERE user_id = ?
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|row| UserStats {
            total_messages: row.get("total_messages"),
            messages_today: row.get("messages_today"),
            messages_this_week: row.get("messages_this_week"),
            tokens_used: row.get("tokens_used"),
            avg_response_length: row.get("avg_response_length"),
            first_used: row.get("first_used"),
            last_used: row.get("last_used"),
        }))
    }

    /// Delete a user's interaction events, keeping the aggregate row
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn clear_user_interactions(&self, user_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM user_interactions WHERE user_id = ?")
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(())
    }
}
