// ABOUTME: Provider adapter abstraction for pluggable AI text-generation backends
// ABOUTME: Defines the backend contract, adapter factory, registry, and failure notices
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

//! # Provider Adapter Interface
//!
//! This module defines the contract that text-generation backends implement
//! to plug into the routing service.
//!
//! ## Key Concepts
//!
//! - **`ChatBackend`**: async trait for chat completion with local credential
//!   validation and a static model catalog
//! - **`ChatMessage`**: role-based message structure for conversations
//! - **`AdapterFactory`**: stateless construction of per-call adapter
//!   instances from a provider kind plus a credential
//! - **Failure notices**: every backend failure is classified at this
//!   boundary and converted into a user-facing notice; callers above the
//!   adapter never see raw provider errors
//!
//! ## Example: Using a Backend
//!
//! ```rust,no_run
//! use assistant_core::llm::{ChatBackend, ChatMessage};
//!
//! async fn example(backend: &dyn ChatBackend) {
//!     let messages = vec![
//!         ChatMessage::system("You are a helpful assistant."),
//!         ChatMessage::user("Hello!"),
//!     ];
//!     let reply = backend.generate(&messages).await;
//!     println!("{reply}");
//! }
//! ```

mod claude;
mod openai;

pub use claude::ClaudeBackend;
pub use openai::OpenAiBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

use crate::constants::providers;
use crate::errors::{AppError, AppResult, ErrorCode};

// ============================================================================
// Message Types
// ============================================================================

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction message, synthesized by routing and never stored
    System,
    /// User input message
    User,
    /// Assistant response message
    Assistant,
}

impl MessageRole {
    /// Convert to string representation for API calls
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a new chat message
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

// ============================================================================
// Generation Parameters and Model Catalog
// ============================================================================

/// Fixed generation parameters applied to every call through an adapter
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Cap on generated output length
    pub max_tokens: u32,
    /// Sampling randomness (0.0 - 2.0)
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: providers::DEFAULT_MAX_TOKENS,
            temperature: providers::DEFAULT_TEMPERATURE,
        }
    }
}

/// Catalog entry describing one selectable model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    /// Model identifier sent on the wire
    pub id: &'static str,
    /// Human-readable model name
    pub display_name: &'static str,
    /// Short description for selection menus
    pub description: &'static str,
}

// ============================================================================
// Failure Notices
// ============================================================================

/// User-facing notices returned in place of raw backend failures.
///
/// The generic set is chosen pseudo-randomly for cosmetic variety. It is an
/// enumerated, known set on purpose: `test_provider` uses exact
/// non-membership as its success signal. That heuristic can misclassify a
/// genuine reply that reproduces a notice verbatim, so nothing
/// safety-critical may depend on it.
pub mod notices {
    use rand::seq::SliceRandom;

    /// Returned when the backend reports an exhausted quota
    pub const QUOTA_EXHAUSTED: &str =
        "The provider quota is exhausted. Top up your balance to continue.";

    /// Returned when the backend rejects the credential
    pub const INVALID_CREDENTIAL: &str =
        "The API key was rejected by the provider. Check it in your settings.";

    /// Returned when the backend rate-limits the request
    pub const RATE_LIMITED: &str =
        "The provider request limit was exceeded. Try again in a few minutes.";

    /// Returned when the conversation exceeds the model context window
    pub const CONTEXT_TOO_LONG: &str =
        "The message is too long for the model. Try shortening the text.";

    /// Generic notices for unclassified failures
    pub const FALLBACK: &[&str] = &[
        "Sorry, I am having temporary technical difficulties. Please try again in a few minutes.",
        "Unfortunately I cannot process your request right now. Please try again later.",
        "An error occurred while handling your message. Please try once more.",
        "The service is temporarily unavailable. Please try again in a little while.",
    ];

    /// Pick one generic notice at random
    #[must_use]
    pub fn fallback() -> &'static str {
        FALLBACK
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(FALLBACK[0])
    }

    /// Whether `text` is a member of the fixed notice set
    #[must_use]
    pub fn is_notice(text: &str) -> bool {
        text == QUOTA_EXHAUSTED
            || text == INVALID_CREDENTIAL
            || text == RATE_LIMITED
            || text == CONTEXT_TOO_LONG
            || FALLBACK.contains(&text)
    }
}

/// Map a classified adapter failure to its user-facing notice
#[must_use]
pub fn notice_for_error(error: &AppError) -> String {
    match error.code {
        ErrorCode::QuotaExceeded => notices::QUOTA_EXHAUSTED.to_owned(),
        ErrorCode::ExternalAuthFailed => notices::INVALID_CREDENTIAL.to_owned(),
        ErrorCode::ExternalRateLimited => notices::RATE_LIMITED.to_owned(),
        ErrorCode::ContextLengthExceeded => notices::CONTEXT_TOO_LONG.to_owned(),
        _ => notices::fallback().to_owned(),
    }
}

// ============================================================================
// Backend Trait
// ============================================================================

/// Text-generation backend adapter
///
/// Implement this trait to add a new provider. Adapters are cheap to
/// construct: the routing service builds a fresh instance per call when a
/// user-scoped credential is in play.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Unique provider identifier (e.g., "openai", "claude")
    fn name(&self) -> &'static str;

    /// Human-readable display name for the provider
    fn display_name(&self) -> &'static str;

    /// Model this adapter instance generates with
    fn model(&self) -> &str;

    /// Static model catalog for this provider; no network call
    fn list_models(&self) -> &'static [ModelInfo];

    /// Fast local credential-format check; never a network round trip
    fn validate(&self) -> bool;

    /// Perform a chat completion, classifying backend failures into
    /// `AppError` codes
    ///
    /// # Errors
    ///
    /// Returns an error when the credential format is invalid, the transport
    /// fails, or the backend reports a failure. Error codes carry the
    /// classification (`QuotaExceeded`, `ExternalAuthFailed`,
    /// `ExternalRateLimited`, `ContextLengthExceeded`, or a generic external
    /// code).
    async fn complete(&self, messages: &[ChatMessage]) -> AppResult<String>;

    /// Perform a chat completion, converting any failure into a user-facing
    /// notice. Failures never propagate past this method.
    async fn generate(&self, messages: &[ChatMessage]) -> String {
        match self.complete(messages).await {
            Ok(text) => text,
            Err(error) => {
                warn!(
                    provider = self.name(),
                    code = ?error.code,
                    "generation failed: {error}"
                );
                notice_for_error(&error)
            }
        }
    }
}

// ============================================================================
// Provider Kinds and Adapter Factory
// ============================================================================

/// Supported backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-style chat-completions backend
    OpenAi,
    /// Claude-style messages backend
    Claude,
}

impl ProviderKind {
    /// Stable identifier used in preferences and registries
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Claude => "claude",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::OpenAi),
            "claude" => Ok(Self::Claude),
            other => Err(AppError::invalid_input(format!(
                "unknown provider: {other}"
            ))),
        }
    }
}

/// Stateless factory constructing adapter instances per call
///
/// Base URLs default to the real provider endpoints and are overridable so
/// tests can point adapters at stub servers.
#[derive(Debug, Clone)]
pub struct AdapterFactory {
    openai_base_url: String,
    claude_base_url: String,
    openai_options: GenerationOptions,
    claude_options: GenerationOptions,
}

impl Default for AdapterFactory {
    fn default() -> Self {
        Self {
            openai_base_url: providers::OPENAI_API_BASE.to_owned(),
            claude_base_url: providers::CLAUDE_API_BASE.to_owned(),
            openai_options: GenerationOptions::default(),
            claude_options: GenerationOptions::default(),
        }
    }
}

impl AdapterFactory {
    /// Override the OpenAI-style endpoint
    #[must_use]
    pub fn with_openai_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.openai_base_url = base_url.into();
        self
    }

    /// Override the Claude-style endpoint
    #[must_use]
    pub fn with_claude_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.claude_base_url = base_url.into();
        self
    }

    /// Set generation parameters for OpenAI-style adapters
    #[must_use]
    pub fn with_openai_options(mut self, options: GenerationOptions) -> Self {
        self.openai_options = options;
        self
    }

    /// Set generation parameters for Claude-style adapters
    #[must_use]
    pub fn with_claude_options(mut self, options: GenerationOptions) -> Self {
        self.claude_options = options;
        self
    }

    /// Construct an adapter for `kind` scoped to one credential
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn make(
        &self,
        kind: ProviderKind,
        credential: impl Into<String>,
        model: Option<String>,
    ) -> AppResult<Arc<dyn ChatBackend>> {
        match kind {
            ProviderKind::OpenAi => {
                let mut backend = OpenAiBackend::new(credential)?
                    .with_base_url(&self.openai_base_url)
                    .with_options(self.openai_options.clone());
                if let Some(model) = model {
                    backend = backend.with_model(model);
                }
                Ok(Arc::new(backend))
            }
            ProviderKind::Claude => {
                let mut backend = ClaudeBackend::new(credential)?
                    .with_base_url(&self.claude_base_url)
                    .with_options(self.claude_options.clone());
                if let Some(model) = model {
                    backend = backend.with_model(model);
                }
                Ok(Arc::new(backend))
            }
        }
    }
}

// ============================================================================
// Provider Registry
// ============================================================================

/// Registry of process-wide backend adapters
///
/// Holds the adapters registered at startup with process-level credentials.
/// The default backend is explicit: it is either set by name or falls back
/// to the first registered adapter, and registration order is itself fixed
/// by configuration rather than environment-probing timing.
pub struct ProviderRegistry {
    backends: Vec<Arc<dyn ChatBackend>>,
    default: Option<String>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            default: None,
        }
    }

    /// Register a backend
    pub fn register(&mut self, backend: Arc<dyn ChatBackend>) {
        self.backends.push(backend);
    }

    /// Get a backend by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ChatBackend>> {
        self.backends.iter().find(|b| b.name() == name).cloned()
    }

    /// Names of all registered backends, in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Designate the default backend by name
    ///
    /// # Errors
    ///
    /// Returns an error if no backend with that name is registered.
    pub fn set_default(&mut self, name: &str) -> AppResult<()> {
        if self.get(name).is_none() {
            return Err(AppError::invalid_input(format!(
                "cannot set default: provider {name} is not registered"
            )));
        }
        self.default = Some(name.to_owned());
        Ok(())
    }

    /// The default backend: the explicitly designated one, else the first
    /// registered
    #[must_use]
    pub fn default_backend(&self) -> Option<Arc<dyn ChatBackend>> {
        match &self.default {
            Some(name) => self.get(name),
            None => self.backends.first().cloned(),
        }
    }

    /// Credential-format validity per registered backend
    #[must_use]
    pub fn status(&self) -> BTreeMap<String, bool> {
        self.backends
            .iter()
            .map(|b| (b.name().to_owned(), b.validate()))
            .collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_round_trip() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("claude".parse::<ProviderKind>().unwrap(), ProviderKind::Claude);
        assert!("cohere".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_fallback_notice_membership() {
        let notice = notices::fallback();
        assert!(notices::is_notice(notice));
        assert!(!notices::is_notice("a genuine model reply"));
    }

    #[test]
    fn test_notice_for_error_classification() {
        let quota = AppError::new(ErrorCode::QuotaExceeded, "quota");
        assert_eq!(notice_for_error(&quota), notices::QUOTA_EXHAUSTED);

        let auth = AppError::new(ErrorCode::ExternalAuthFailed, "bad key");
        assert_eq!(notice_for_error(&auth), notices::INVALID_CREDENTIAL);

        let unknown = AppError::internal("boom");
        assert!(notices::is_notice(&notice_for_error(&unknown)));
    }
}
