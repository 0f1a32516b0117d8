// ABOUTME: Main library entry point for the assistant-core routing platform
// ABOUTME: Provider routing, conversation state, rate limiting, and usage telemetry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

#![deny(unsafe_code)]

//! # assistant-core
//!
//! The provider-routing and session-state core of an AI chat assistant.
//! Routes a user's conversational turn to one of several interchangeable
//! text-generation backends, maintains a bounded per-user conversation
//! window, enforces a per-user request-rate ceiling, and persists usage
//! telemetry.
//!
//! ## Architecture
//!
//! - **Backends** (`llm`): uniform adapter trait over OpenAI-style and
//!   Claude-style APIs, with local credential validation and failure
//!   classification into user-facing notices
//! - **Conversation Store** (`history`): bounded, 24h-expiring per-user
//!   history behind a cache that degrades to "no history" on outage
//! - **Rate Limiter** (`rate_limiting`): in-process per-user sliding window
//! - **Preferences** (`preferences`): durable per-user credentials and
//!   backend selection, write-through JSON document
//! - **Routing** (`routing`): backend resolution precedence, bounded context
//!   building, and the outermost failure boundary
//! - **Usage** (`usage`, `database`): fire-and-forget telemetry into a
//!   relational sink
//!
//! The chat-platform transport (message delivery, command parsing) is an
//! external collaborator and not part of this crate.
//!
//! ## Example
//!
//! ```rust,no_run
//! use assistant_core::config::environment::ServerConfig;
//! use assistant_core::errors::AppResult;
//! use assistant_core::history::{ConversationStore, HistoryConfig};
//! use assistant_core::preferences::PreferenceStore;
//! use assistant_core::rate_limiting::RateLimiter;
//! use assistant_core::routing::{ChatRouter, ChatService};
//! use assistant_core::usage::UsageRecorder;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!
//!     let preferences = Arc::new(PreferenceStore::open(&config.preferences_path).await?);
//!     let history = ConversationStore::connect(&HistoryConfig {
//!         depth: config.history_depth,
//!         ttl: config.history_ttl,
//!         redis_url: config.redis_url.clone(),
//!         connection: config.redis_connection.clone(),
//!     })
//!     .await;
//!
//!     let database = assistant_core::database::Database::new(&config.database_url).await?;
//!     let usage = UsageRecorder::new(Arc::new(database));
//!
//!     let router = ChatRouter::from_config(&config, preferences, history)?;
//!     let service = ChatService::new(RateLimiter::from_config(&config.rate_limit), router, usage);
//!
//!     let reply = service.handle_message(42, 42, "hello").await;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```

/// Configuration management from environment variables
pub mod config;

/// Application constants and default configuration values
pub mod constants;

/// Durable usage telemetry sink
pub mod database;

/// Unified error handling system with standard error codes
pub mod errors;

/// Bounded, expiring per-user conversation store
pub mod history;

/// Provider adapter abstraction for text-generation backends
pub mod llm;

/// Production logging and structured output
pub mod logging;

/// Durable per-user preference and credential store
pub mod preferences;

/// In-process sliding-window rate limiting
pub mod rate_limiting;

/// Routing service and the inbound-message facade
pub mod routing;

/// Fire-and-forget usage recording
pub mod usage;
