// ABOUTME: System-wide constants and default configuration values
// ABOUTME: Groups domain defaults for history, rate limiting, providers, and routing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

//! # Constants Module
//!
//! Application constants grouped by domain. Every tunable here has an
//! environment-variable override in
//! [`crate::config::environment::ServerConfig`]; the values below are the
//! process-wide defaults.

/// Conversation history defaults
pub mod history {
    /// Number of conversation turns retained per user
    pub const DEFAULT_DEPTH: usize = 10;

    /// Absolute expiry applied to a user's history on every append (24 hours)
    pub const CONVERSATION_TTL_SECS: u64 = 86_400;

    /// Cache key prefix for per-user conversation lists
    pub const KEY_PREFIX: &str = "conversation:";
}

/// Rate limiting defaults
pub mod rate_limit {
    /// Requests admitted per user within the trailing window
    pub const DEFAULT_PER_MINUTE: usize = 30;

    /// Length of the sliding window in seconds
    pub const WINDOW_SECS: u64 = 60;
}

/// Provider endpoints, credential formats, and generation defaults
pub mod providers {
    /// OpenAI-style API base URL
    pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

    /// Claude-style API base URL
    pub const CLAUDE_API_BASE: &str = "https://api.anthropic.com";

    /// API version header value required by the Claude-style backend
    pub const ANTHROPIC_VERSION: &str = "2023-06-01";

    /// OpenAI-style keys must carry this prefix
    pub const OPENAI_KEY_PREFIX: &str = "sk-";

    /// Claude-style keys must carry one of these prefixes
    pub const CLAUDE_KEY_PREFIXES: &[&str] = &["sk-ant-", "sk-ant_api03-", "sk-ant_api04-"];

    /// Default OpenAI-style model
    pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

    /// Default Claude-style model
    pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-haiku-20240307";

    /// Maximum tokens generated per completion unless overridden
    pub const DEFAULT_MAX_TOKENS: u32 = 1000;

    /// Sampling temperature unless overridden
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;

    /// Connection timeout for backend calls
    pub const CONNECT_TIMEOUT_SECS: u64 = 30;

    /// Request timeout for backend calls
    pub const REQUEST_TIMEOUT_SECS: u64 = 300;
}

/// Routing service fixed texts
pub mod routing {
    /// Returned when no backend can be resolved for a turn
    pub const SERVICE_UNAVAILABLE_NOTICE: &str =
        "Sorry, the AI service is temporarily unavailable.";

    /// Last-line-of-defense reply when an unexpected failure escapes the
    /// adapter layer
    pub const GENERIC_APOLOGY: &str =
        "Something went wrong while processing your message. Please try again later.";

    /// Returned by the service facade when the rate limiter rejects a turn
    pub const RATE_LIMITED_NOTICE: &str =
        "Too many requests! Please wait a moment before sending the next message.";

    /// System preamble synthesized at the head of every generation context;
    /// never persisted to the conversation store
    pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant in a chat \
        application. Keep answers concise but informative. Be friendly and ready to help. \
        If you do not know the answer, say so honestly.";
}

/// Persistence defaults
pub mod storage {
    /// Default SQLite database URL for the usage sink
    pub const DEFAULT_DATABASE_URL: &str = "sqlite:data/assistant.db";

    /// Default path of the durable user preference document
    pub const DEFAULT_PREFERENCES_PATH: &str = "data/user_settings.json";
}
