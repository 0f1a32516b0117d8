// ABOUTME: OpenAI-style backend adapter speaking the chat-completions wire format
// ABOUTME: Validates key prefixes locally and classifies API failures into error codes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

//! # OpenAI-Style Backend
//!
//! Adapter for any backend exposing the `chat/completions` API. The base URL
//! is overridable, which also lets tests point the adapter at a stub server.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use super::{ChatBackend, ChatMessage, GenerationOptions, ModelInfo};
use crate::constants::providers;
use crate::errors::{AppError, AppResult, ErrorCode};

/// Static model catalog for the OpenAI-style backend
const MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "gpt-4",
        display_name: "GPT-4",
        description: "Most capable model",
    },
    ModelInfo {
        id: "gpt-4-turbo",
        display_name: "GPT-4 Turbo",
        description: "Latest GPT-4 model",
    },
    ModelInfo {
        id: "gpt-3.5-turbo",
        display_name: "GPT-3.5 Turbo",
        description: "Fast and efficient",
    },
    ModelInfo {
        id: "gpt-3.5-turbo-16k",
        display_name: "GPT-3.5 Turbo 16K",
        description: "Extended context",
    },
];

// ============================================================================
// API Request/Response Types
// ============================================================================

/// Chat-completions request structure
#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

/// Message structure on the wire
#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        }
    }
}

/// Chat-completions response structure
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
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

/// OpenAI-style backend adapter
pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    options: GenerationOptions,
}

impl OpenAiBackend {
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
            model: providers::DEFAULT_OPENAI_MODEL.to_owned(),
            base_url: providers::OPENAI_API_BASE.to_owned(),
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
        if lowered.contains("context_length") || lowered.contains("maximum context") {
            return AppError::new(ErrorCode::ContextLengthExceeded, message);
        }

        match status.as_u16() {
            404 => AppError::not_found(format!("Model or endpoint: {message}")),
            400 => AppError::invalid_input(format!("API validation error: {message}")),
            502..=504 => AppError::new(ErrorCode::ExternalServiceUnavailable, message),
            _ => AppError::external_service("openai", format!("API error ({status}): {message}")),
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn display_name(&self) -> &'static str {
        "OpenAI"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn list_models(&self) -> &'static [ModelInfo] {
        MODELS
    }

    fn validate(&self) -> bool {
        !self.api_key.is_empty() && self.api_key.starts_with(providers::OPENAI_KEY_PREFIX)
    }

    async fn complete(&self, messages: &[ChatMessage]) -> AppResult<String> {
        if !self.validate() {
            return Err(AppError::new(
                ErrorCode::ExternalAuthFailed,
                "API key has an invalid format",
            ));
        }

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: messages.iter().map(WireMessage::from).collect(),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        };

        debug!(
            model = %self.model,
            message_count = messages.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(self.api_url("chat/completions"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("failed to send request to OpenAI backend: {e}");
                AppError::external_service("openai", format!("Failed to connect: {e}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("failed to read OpenAI response: {e}");
            AppError::external_service("openai", format!("Failed to read response: {e}"))
        })?;

        if !status.is_success() {
            return Err(Self::parse_error_response(status, &body));
        }

        let completion: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
            error!("failed to parse OpenAI response: {e}");
            AppError::external_service("openai", format!("Failed to parse response: {e}"))
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::external_service("openai", "API returned no choices"))?;

        Ok(content.trim().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_key_prefix() {
        let valid = OpenAiBackend::new("sk-test123").unwrap();
        assert!(valid.validate());

        let invalid = OpenAiBackend::new("pk-test123").unwrap();
        assert!(!invalid.validate());

        let empty = OpenAiBackend::new("").unwrap();
        assert!(!empty.validate());
    }

    #[test]
    fn test_model_catalog_is_static() {
        let backend = OpenAiBackend::new("sk-test123").unwrap();
        let models = backend.list_models();
        assert!(models.iter().any(|m| m.id == "gpt-3.5-turbo"));
        assert_eq!(models.len(), 4);
    }

    #[test]
    fn test_error_classification() {
        let quota = OpenAiBackend::parse_error_response(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"insufficient_quota: you ran out"}}"#,
        );
        assert_eq!(quota.code, ErrorCode::QuotaExceeded);

        let auth = OpenAiBackend::parse_error_response(
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Incorrect API key provided"}}"#,
        );
        assert_eq!(auth.code, ErrorCode::ExternalAuthFailed);

        let rate = OpenAiBackend::parse_error_response(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"rate_limit_exceeded"}}"#,
        );
        assert_eq!(rate.code, ErrorCode::ExternalRateLimited);

        let context = OpenAiBackend::parse_error_response(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"context_length_exceeded"}}"#,
        );
        assert_eq!(context.code, ErrorCode::ContextLengthExceeded);
    }
}
