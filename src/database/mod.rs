// ABOUTME: SQLite database layer for durable usage telemetry
// ABOUTME: Owns the connection pool and runs idempotent migrations at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

//! # Database Management
//!
//! Durable sink for usage telemetry: per-interaction event rows and one
//! aggregate statistics row per user. The routing path only appends and
//! increments here; nothing is read back while handling a turn.

mod usage;

pub use usage::{InteractionRecord, UserStats};

use crate::errors::AppResult;
use sqlx::SqlitePool;

/// Database manager for usage telemetry storage
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or a
    /// migration fails.
    pub async fn new(database_url: &str) -> AppResult<Self> {
        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:") {
            Self::ensure_sqlite_parent_dir(database_url).await?;
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };

        let pool = SqlitePool::connect(&connection_options).await?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Create the directory holding a file-backed SQLite database
    async fn ensure_sqlite_parent_dir(database_url: &str) -> AppResult<()> {
        let path = database_url.trim_start_matches("sqlite:");
        if path.is_empty() || path.starts_with(':') {
            return Ok(());
        }
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    crate::errors::AppError::database(format!(
                        "Failed to create database directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    pub async fn migrate(&self) -> AppResult<()> {
        self.migrate_usage().await
    }
}
