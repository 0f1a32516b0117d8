// ABOUTME: Configuration management module for centralized settings
// ABOUTME: Environment-variable driven configuration for all components
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

//! Configuration module for assistant-core
//!
//! All configuration is read from environment variables; there are no
//! configuration files. [`environment::ServerConfig::from_env`] is the single
//! entry point.

/// Environment and server configuration
pub mod environment;

pub use environment::{
    ProviderCredentialConfig, ProvidersConfig, RateLimitConfig, RedisConnectionConfig,
    ServerConfig,
};
