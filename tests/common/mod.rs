// ABOUTME: Shared test fixtures for integration tests
// ABOUTME: Static backend stub, store builders, and preference helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

#![allow(dead_code)]

use assistant_core::config::environment::RedisConnectionConfig;
use assistant_core::errors::{AppError, AppResult, ErrorCode};
use assistant_core::history::{ConversationStore, HistoryConfig};
use assistant_core::llm::{ChatBackend, ChatMessage, ModelInfo, ProviderRegistry};
use assistant_core::preferences::PreferenceStore;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// History configuration over the in-memory backend
pub fn history_config(depth: usize) -> HistoryConfig {
    HistoryConfig {
        depth,
        ttl: Duration::from_secs(60),
        redis_url: None,
        connection: RedisConnectionConfig::default(),
    }
}

/// In-memory conversation store with the given depth
pub fn memory_store(depth: usize) -> ConversationStore {
    ConversationStore::in_memory(&history_config(depth))
}

/// Preference store rooted in a temp directory
pub async fn open_preferences(dir: &TempDir) -> Arc<PreferenceStore> {
    Arc::new(
        PreferenceStore::open(dir.path().join("user_settings.json"))
            .await
            .unwrap(),
    )
}

/// Registry holding the given stub backends, in order
pub fn registry_with(backends: Vec<Arc<StaticBackend>>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for backend in backends {
        registry.register(backend);
    }
    registry
}

const STATIC_MODELS: &[ModelInfo] = &[ModelInfo {
    id: "static-1",
    display_name: "Static 1",
    description: "Canned test model",
}];

/// Backend stub returning a fixed reply and counting invocations
pub struct StaticBackend {
    name: &'static str,
    reply: String,
    valid: bool,
    calls: AtomicUsize,
}

impl StaticBackend {
    /// Stub with a valid credential format
    pub fn new(name: &'static str, reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply: reply.into(),
            valid: true,
            calls: AtomicUsize::new(0),
        })
    }

    /// Stub whose credential format validation fails
    pub fn invalid(name: &'static str, reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply: reply.into(),
            valid: false,
            calls: AtomicUsize::new(0),
        })
    }

    /// Completed generation calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for StaticBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn display_name(&self) -> &'static str {
        "Static"
    }

    fn model(&self) -> &str {
        "static-1"
    }

    fn list_models(&self) -> &'static [ModelInfo] {
        STATIC_MODELS
    }

    fn validate(&self) -> bool {
        self.valid
    }

    async fn complete(&self, _messages: &[ChatMessage]) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.valid {
            Ok(self.reply.clone())
        } else {
            Err(AppError::new(
                ErrorCode::ExternalAuthFailed,
                "stub credential rejected",
            ))
        }
    }
}
