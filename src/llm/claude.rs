// ABOUTME: Claude-style backend adapter speaking the messages wire format
// ABOUTME: Lifts the system message out-of-band and merges user content in order
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

//! # Claude-Style Backend
//!
//! Adapter for the `v1/messages` API. This backend has no system role on the
//! wire: the system message travels in a dedicated top-level field, and the
//! remaining conversation content is concatenated, in order, into a single
//! user turn.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use super::{ChatBackend, ChatMessage, GenerationOptions, MessageRole, ModelInfo};
use crate::constants::providers;
use crate::errors::{AppError, AppResult, ErrorCode};

/// Static model catalog for the Claude-style backend
const MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "claude-3-5-sonnet-20241022",
        display_name: "Claude 3.5 Sonnet",
        description: "Latest and most capable",
    },
    ModelInfo {
        id: "claude-3-sonnet-20240229",
        display_name: "Claude 3 Sonnet",
        description: "Balanced performance",
    },
    ModelInfo {
        id: "claude-3-opus-20240229",
        display_name: "Claude 3 Opus",
        description: "Most powerful model",
    },
    ModelInfo {
        id: "claude-3-haiku-20240307",
        display_name: "Claude 3 Haiku",
        description: "Fast and efficient",
    },
];

// ============================================================================
// API Request/Response Types
// ============================================================================

/// Messages API request structure
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

/// Messages API response structure
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

/// Error response structure
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// Backend Implementation
// ============================================================================

/// Claude-style backend adapter
pub struct ClaudeBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    options: GenerationOptions,
}

impl ClaudeBackend {
    /// Create a new adapter scoped to one credential
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(providers::CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(providers::REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: providers::DEFAULT_CLAUDE_MODEL.to_owned(),
            base_url: providers::CLAUDE_API_BASE.to_owned(),
            options: GenerationOptions::default(),
        })
    }

    /// Set the model to generate with
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set generation parameters
    #[must_use]
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    /// Translate the uniform message sequence into the backend wire shape.
    ///
    /// The last system message (routing synthesizes exactly one, first)
    /// becomes the out-of-band `system` field; all remaining content is
    /// joined in order into one user turn.
    fn convert_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<WireMessage>) {
        let mut system = None;
        let mut contents = Vec::new();

        for message in messages {
            match message.role {
                MessageRole::System => system = Some(message.content.clone()),
                MessageRole::User | MessageRole::Assistant => {
                    contents.push(message.content.as_str());
                }
            }
        }

        let wire = vec![WireMessage {
            role: "user".to_owned(),
            content: contents.join("\n\n"),
        }];

        (system, wire)
    }

    /// Classify an error response into an `AppError` code
    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> AppError {
        let message = serde_json::from_str::<ApiErrorResponse>(body).map_or_else(
            |_| body.chars().take(200).collect::<String>(),
            |response| response.error.message,
        );
        let lowered = message.to_lowercase();

        if lowered.contains("insufficient_quota") || lowered.contains("quota") {
            return AppError::new(ErrorCode::QuotaExceeded, message);
        }
        if status.as_u16() == 401
            || status.as_u16() == 403
            || lowered.contains("invalid_api_key")
            || lowered.contains("authentication")
        {
            return AppError::new(ErrorCode::ExternalAuthFailed, message);
        }
        if status.as_u16() == 429 || lowered.contains("rate_limit") {
            return AppError::new(ErrorCode::ExternalRateLimited, message);
        }
        if lowered.contains("context_length") || lowered.contains("prompt is too long") {
            return AppError::new(ErrorCode::ContextLengthExceeded, message);
        }

        match status.as_u16() {
            404 => AppError::not_found(format!("Model or endpoint: {message}")),
            400 => AppError::invalid_input(format!("API validation error: {message}")),
            502..=504 => AppError::new(ErrorCode::ExternalServiceUnavailable, message),
            _ => AppError::external_service("claude", format!("API error ({status}): {message}")),
        }
    }
}

#[async_trait]
impl ChatBackend for ClaudeBackend {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn display_name(&self) -> &'static str {
        "Claude"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn list_models(&self) -> &'static [ModelInfo] {
        MODELS
    }

    fn validate(&self) -> bool {
        !self.api_key.is_empty()
            && providers::CLAUDE_KEY_PREFIXES
                .iter()
                .any(|prefix| self.api_key.starts_with(prefix))
    }

    async fn complete(&self, messages: &[ChatMessage]) -> AppResult<String> {
        if !self.validate() {
            return Err(AppError::new(
                ErrorCode::ExternalAuthFailed,
                "API key has an invalid format",
            ));
        }

        let (system, wire_messages) = Self::convert_messages(messages);

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
            system,
            messages: wire_messages,
        };

        debug!(
            model = %self.model,
            message_count = messages.len(),
            "sending messages request"
        );

        let response = self
            .client
            .post(self.api_url("v1/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", providers::ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("failed to send request to Claude backend: {e}");
                AppError::external_service("claude", format!("Failed to connect: {e}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("failed to read Claude response: {e}");
            AppError::external_service("claude", format!("Failed to read response: {e}"))
        })?;

        if !status.is_success() {
            return Err(Self::parse_error_response(status, &body));
        }

        let completion: MessagesResponse = serde_json::from_str(&body).map_err(|e| {
            error!("failed to parse Claude response: {e}");
            AppError::external_service("claude", format!("Failed to parse response: {e}"))
        })?;

        let content = completion
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or_else(|| AppError::external_service("claude", "API returned no content"))?;

        Ok(content.trim().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_known_prefixes() {
        for key in ["sk-ant-abc", "sk-ant_api03-abc", "sk-ant_api04-abc"] {
            let backend = ClaudeBackend::new(key).unwrap();
            assert!(backend.validate(), "expected {key} to validate");
        }

        let invalid = ClaudeBackend::new("sk-abc").unwrap();
        assert!(!invalid.validate());
    }

    #[test]
    fn test_system_message_lifted_out_of_band() {
        let messages = vec![
            ChatMessage::system("Be terse."),
            ChatMessage::user("First question"),
            ChatMessage::assistant("First answer"),
            ChatMessage::user("Second question"),
        ];

        let (system, wire) = ClaudeBackend::convert_messages(&messages);
        assert_eq!(system.as_deref(), Some("Be terse."));
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].role, "user");
        assert_eq!(
            wire[0].content,
            "First question\n\nFirst answer\n\nSecond question"
        );
    }

    #[test]
    fn test_no_system_field_without_system_message() {
        let messages = vec![ChatMessage::user("Hello")];
        let (system, wire) = ClaudeBackend::convert_messages(&messages);
        assert!(system.is_none());
        assert_eq!(wire[0].content, "Hello");
    }
}
