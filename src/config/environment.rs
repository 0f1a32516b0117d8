// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses environment variables into typed configuration structures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

//! Environment-based configuration management
//!
//! Recognized variables:
//!
//! | Variable | Default | Purpose |
//! |----------|---------|---------|
//! | `DATABASE_URL` | `sqlite:data/assistant.db` | Usage telemetry sink |
//! | `REDIS_URL` | unset | Conversation cache; unset runs without history |
//! | `USER_SETTINGS_PATH` | `data/user_settings.json` | Preference document |
//! | `MAX_CONVERSATION_HISTORY` | `10` | Retained turns per user |
//! | `RATE_LIMIT_PER_MINUTE` | `30` | Sliding-window ceiling |
//! | `OPENAI_API_KEY` / `CLAUDE_API_KEY` | unset | Process-wide credentials |
//! | `OPENAI_MODEL` / `CLAUDE_MODEL` | provider default | Process-wide models |
//! | `OPENAI_MAX_TOKENS` / `CLAUDE_MAX_TOKENS` | `1000` | Output cap |
//! | `OPENAI_TEMPERATURE` / `CLAUDE_TEMPERATURE` | `0.7` | Sampling temperature |
//! | `DEFAULT_PROVIDER` | unset | Explicit process-wide default backend |

use crate::constants::{history, providers, rate_limit, storage};
use crate::errors::{AppError, AppResult};
use crate::llm::GenerationOptions;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Parse an environment variable, falling back to a default when unset.
///
/// Malformed values are a configuration error rather than a silent default,
/// so typos surface at startup instead of as surprising runtime behavior.
fn env_parse<T: FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::config(format!("invalid value for {name}: {raw:?}"))),
        Err(_) => Ok(default),
    }
}

/// Redis connection and retry configuration
#[derive(Debug, Clone)]
pub struct RedisConnectionConfig {
    /// TCP connect timeout in seconds
    pub connection_timeout_secs: u64,
    /// Per-command response timeout in seconds
    pub response_timeout_secs: u64,
    /// Retries attempted while establishing the initial connection
    pub initial_connection_retries: u64,
    /// Delay before the first initial-connection retry
    pub initial_retry_delay_ms: u64,
    /// Cap on the exponential backoff delay
    pub max_retry_delay_ms: u64,
}

impl Default for RedisConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout_secs: 5,
            response_timeout_secs: 5,
            initial_connection_retries: 3,
            initial_retry_delay_ms: 250,
            max_retry_delay_ms: 4000,
        }
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests admitted per user within the window
    pub per_minute: usize,
    /// Sliding window length
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: rate_limit::DEFAULT_PER_MINUTE,
            window: Duration::from_secs(rate_limit::WINDOW_SECS),
        }
    }
}

/// Credentials and generation settings for one process-wide provider
#[derive(Debug, Clone)]
pub struct ProviderCredentialConfig {
    /// API key registered for the whole process
    pub api_key: String,
    /// Model override; `None` uses the provider default
    pub model: Option<String>,
    /// Generation parameters applied to every call
    pub options: GenerationOptions,
}

/// Process-wide provider registrations
#[derive(Debug, Clone, Default)]
pub struct ProvidersConfig {
    /// OpenAI-style backend, registered when `OPENAI_API_KEY` is set
    pub openai: Option<ProviderCredentialConfig>,
    /// Claude-style backend, registered when `CLAUDE_API_KEY` is set
    pub claude: Option<ProviderCredentialConfig>,
    /// Explicit default backend name; `None` selects the first configured
    /// provider in the fixed order `openai`, `claude`
    pub default_provider: Option<String>,
}

/// Complete server configuration assembled from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Usage telemetry database URL
    pub database_url: String,
    /// Conversation cache URL; `None` disables durable history
    pub redis_url: Option<String>,
    /// Redis connection behavior
    pub redis_connection: RedisConnectionConfig,
    /// Path of the durable preference document
    pub preferences_path: PathBuf,
    /// Retained conversation turns per user
    pub history_depth: usize,
    /// Absolute history expiry, reset on every append
    pub history_ttl: Duration,
    /// Per-user request ceiling
    pub rate_limit: RateLimitConfig,
    /// Process-wide provider registrations
    pub providers: ProvidersConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a numeric variable holds an
    /// unparseable value.
    pub fn from_env() -> AppResult<Self> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| storage::DEFAULT_DATABASE_URL.to_owned());
        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.is_empty());
        let preferences_path = env::var("USER_SETTINGS_PATH")
            .map_or_else(|_| PathBuf::from(storage::DEFAULT_PREFERENCES_PATH), PathBuf::from);

        let history_depth = env_parse("MAX_CONVERSATION_HISTORY", history::DEFAULT_DEPTH)?;
        let per_minute = env_parse("RATE_LIMIT_PER_MINUTE", rate_limit::DEFAULT_PER_MINUTE)?;

        Ok(Self {
            database_url,
            redis_url,
            redis_connection: RedisConnectionConfig::default(),
            preferences_path,
            history_depth,
            history_ttl: Duration::from_secs(history::CONVERSATION_TTL_SECS),
            rate_limit: RateLimitConfig {
                per_minute,
                window: Duration::from_secs(rate_limit::WINDOW_SECS),
            },
            providers: ProvidersConfig::from_env()?,
        })
    }
}

impl ProvidersConfig {
    /// Load provider registrations from environment variables
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a generation parameter holds an
    /// unparseable value.
    pub fn from_env() -> AppResult<Self> {
        let openai = match env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()) {
            Some(api_key) => Some(ProviderCredentialConfig {
                api_key,
                model: env::var("OPENAI_MODEL").ok(),
                options: GenerationOptions {
                    max_tokens: env_parse("OPENAI_MAX_TOKENS", providers::DEFAULT_MAX_TOKENS)?,
                    temperature: env_parse("OPENAI_TEMPERATURE", providers::DEFAULT_TEMPERATURE)?,
                },
            }),
            None => None,
        };

        let claude = match env::var("CLAUDE_API_KEY").ok().filter(|k| !k.is_empty()) {
            Some(api_key) => Some(ProviderCredentialConfig {
                api_key,
                model: env::var("CLAUDE_MODEL").ok(),
                options: GenerationOptions {
                    max_tokens: env_parse("CLAUDE_MAX_TOKENS", providers::DEFAULT_MAX_TOKENS)?,
                    temperature: env_parse("CLAUDE_TEMPERATURE", providers::DEFAULT_TEMPERATURE)?,
                },
            }),
            None => None,
        };

        Ok(Self {
            openai,
            claude,
            default_provider: env::var("DEFAULT_PROVIDER").ok().filter(|p| !p.is_empty()),
        })
    }
}
