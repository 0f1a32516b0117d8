// ABOUTME: Configuration integration tests for environment parsing and router assembly
// ABOUTME: Verifies deterministic default-provider selection from configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

//! Environment configuration integration tests
//!
//! These tests mutate process environment variables and therefore run
//! serially.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use assistant_core::config::environment::ServerConfig;
use assistant_core::routing::ChatRouter;
use common::{memory_store, open_preferences};
use serial_test::serial;
use std::env;

const PROVIDER_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "OPENAI_MODEL",
    "CLAUDE_API_KEY",
    "CLAUDE_MODEL",
    "DEFAULT_PROVIDER",
    "MAX_CONVERSATION_HISTORY",
    "RATE_LIMIT_PER_MINUTE",
];

fn clear_provider_env() {
    for var in PROVIDER_VARS {
        env::remove_var(var);
    }
}

#[tokio::test]
#[serial]
async fn test_defaults_without_provider_env() {
    clear_provider_env();

    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.history_depth, 10);
    assert_eq!(config.rate_limit.per_minute, 30);
    assert!(config.providers.openai.is_none());
    assert!(config.providers.claude.is_none());

    clear_provider_env();
}

#[tokio::test]
#[serial]
async fn test_numeric_overrides_are_parsed() {
    clear_provider_env();
    env::set_var("MAX_CONVERSATION_HISTORY", "4");
    env::set_var("RATE_LIMIT_PER_MINUTE", "3");

    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.history_depth, 4);
    assert_eq!(config.rate_limit.per_minute, 3);

    clear_provider_env();
}

#[tokio::test]
#[serial]
async fn test_malformed_numeric_value_is_a_config_error() {
    clear_provider_env();
    env::set_var("RATE_LIMIT_PER_MINUTE", "lots");

    assert!(ServerConfig::from_env().is_err());

    clear_provider_env();
}

#[tokio::test]
#[serial]
async fn test_default_provider_is_deterministic_not_registration_timing() {
    clear_provider_env();
    // Both configured: the fixed order makes openai the implicit default
    env::set_var("OPENAI_API_KEY", "sk-process");
    env::set_var("CLAUDE_API_KEY", "sk-ant-process");

    let config = ServerConfig::from_env().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let router = ChatRouter::from_config(
        &config,
        open_preferences(&dir).await,
        memory_store(config.history_depth),
    )
    .unwrap();

    assert_eq!(router.provider_names(), vec!["openai", "claude"]);
    assert_eq!(router.default_provider(), Some("openai"));

    clear_provider_env();
}

#[tokio::test]
#[serial]
async fn test_explicit_default_provider_override() {
    clear_provider_env();
    env::set_var("OPENAI_API_KEY", "sk-process");
    env::set_var("CLAUDE_API_KEY", "sk-ant-process");
    env::set_var("DEFAULT_PROVIDER", "claude");

    let config = ServerConfig::from_env().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let router = ChatRouter::from_config(
        &config,
        open_preferences(&dir).await,
        memory_store(config.history_depth),
    )
    .unwrap();

    assert_eq!(router.default_provider(), Some("claude"));

    clear_provider_env();
}

#[tokio::test]
#[serial]
async fn test_explicit_default_naming_unregistered_provider_fails() {
    clear_provider_env();
    env::set_var("OPENAI_API_KEY", "sk-process");
    env::set_var("DEFAULT_PROVIDER", "claude");

    let config = ServerConfig::from_env().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let result = ChatRouter::from_config(
        &config,
        open_preferences(&dir).await,
        memory_store(config.history_depth),
    );

    assert!(result.is_err());

    clear_provider_env();
}
