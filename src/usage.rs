// ABOUTME: Fire-and-forget usage telemetry recorder over the database sink
// ABOUTME: Spawned writes that are swallowed and logged on failure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

//! # Usage Recorder
//!
//! Best-effort telemetry sink. Recording never blocks or fails the caller's
//! response path: the database write is spawned onto the runtime, and any
//! failure (including an entirely absent database) is logged and dropped.

use crate::database::{Database, InteractionRecord, UserStats};
use std::sync::Arc;
use tracing::{debug, warn};

/// Fire-and-forget recorder of interaction counts and response sizes
#[derive(Clone)]
pub struct UsageRecorder {
    database: Option<Arc<Database>>,
}

impl UsageRecorder {
    /// Create a recorder over the given database
    #[must_use]
    pub const fn new(database: Arc<Database>) -> Self {
        Self {
            database: Some(database),
        }
    }

    /// Create a recorder that silently drops every record
    #[must_use]
    pub const fn disabled() -> Self {
        Self { database: None }
    }

    /// Record one interaction. Returns immediately; the write happens in the
    /// background and failures are swallowed with a logged warning.
    pub fn record(
        &self,
        user_id: i64,
        chat_id: i64,
        action: &str,
        message_len: usize,
        response_len: usize,
    ) {
        let Some(database) = self.database.clone() else {
            debug!("usage recording disabled - skipping");
            return;
        };

        let record = InteractionRecord {
            user_id,
            chat_id,
            action: action.to_owned(),
            message_type: None,
            message_length: i64::try_from(message_len).unwrap_or(i64::MAX),
            response_length: i64::try_from(response_len).unwrap_or(i64::MAX),
        };

        tokio::spawn(async move {
            if let Err(e) = database.record_interaction(&record).await {
                warn!(
                    user_id = record.user_id,
                    "failed to record usage interaction: {e}"
                );
            }
        });
    }

    /// Read back a user's aggregate statistics for display; `None` when the
    /// database is absent, unreachable, or holds no row for the user
    pub async fn user_stats(&self, user_id: i64) -> Option<UserStats> {
        let database = self.database.as_ref()?;
        match database.get_user_stats(user_id).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(user_id, "failed to read usage statistics: {e}");
                None
            }
        }
    }
}
