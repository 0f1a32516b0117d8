// ABOUTME: Routing service integration tests for resolution precedence and end-to-end turns
// ABOUTME: Exercises preference, session-override, default, and rate-limited paths
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

//! Routing service and facade integration tests

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use assistant_core::constants::routing as routing_texts;
use assistant_core::database::Database;
use assistant_core::history::ConversationStore;
use assistant_core::llm::{notices, AdapterFactory, MessageRole};
use assistant_core::preferences::PreferenceStore;
use assistant_core::rate_limiting::RateLimiter;
use assistant_core::routing::{ChatRouter, ChatService, RoutingOptions};
use assistant_core::usage::UsageRecorder;
use common::{memory_store, open_preferences, registry_with, StaticBackend};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER: i64 = 90_210;
const CHAT: i64 = 90_210;

fn build_router(
    backends: Vec<Arc<StaticBackend>>,
    preferences: Arc<PreferenceStore>,
    history: ConversationStore,
) -> ChatRouter {
    ChatRouter::new(
        registry_with(backends),
        preferences,
        history,
        RoutingOptions::default(),
    )
}

async fn mount_openai_stub(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-3.5-turbo",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_end_to_end_turn_with_default_provider() {
    let dir = tempfile::tempdir().unwrap();
    let preferences = open_preferences(&dir).await;
    let history = memory_store(10);
    let backend = StaticBackend::new("alpha", "canned reply");

    let router = build_router(vec![backend.clone()], preferences, history.clone());

    let reply = router.respond(USER, "hello").await;
    assert_eq!(reply, "canned reply");
    assert_eq!(backend.calls(), 1);

    // The turn was appended: one user message followed by the reply
    let messages = history.read(USER).await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[0].content, "hello");
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[1].content, "canned reply");
}

#[tokio::test]
async fn test_user_preference_beats_process_default() {
    let server = MockServer::start().await;
    mount_openai_stub(&server, "from the user's own backend").await;

    let dir = tempfile::tempdir().unwrap();
    let preferences = open_preferences(&dir).await;
    preferences.set_credential(USER, "openai", "sk-user").await.unwrap();
    preferences.set_selected_provider(USER, "openai").await.unwrap();

    let default_backend = StaticBackend::new("alpha", "default reply");
    let options = RoutingOptions {
        factory: AdapterFactory::default().with_openai_base_url(server.uri()),
        ..RoutingOptions::default()
    };
    let router = ChatRouter::new(
        registry_with(vec![default_backend.clone()]),
        preferences,
        memory_store(10),
        options,
    );

    let reply = router.respond(USER, "hello").await;
    assert_eq!(reply, "from the user's own backend");
    // The process-wide default was never invoked
    assert_eq!(default_backend.calls(), 0);
}

#[tokio::test]
async fn test_invalid_stored_credential_fails_closed() {
    let dir = tempfile::tempdir().unwrap();
    let preferences = open_preferences(&dir).await;
    // Wrong prefix for an OpenAI-style key; format validation must reject it
    preferences.set_credential(USER, "openai", "pk-wrong").await.unwrap();
    preferences.set_selected_provider(USER, "openai").await.unwrap();

    let fallback = StaticBackend::new("alpha", "fallback reply");
    let router = build_router(vec![fallback.clone()], preferences, memory_store(10));

    let reply = router.respond(USER, "hello").await;
    assert_eq!(reply, "fallback reply");
    assert_eq!(fallback.calls(), 1);
}

#[tokio::test]
async fn test_selected_provider_without_credential_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let preferences = open_preferences(&dir).await;
    preferences.set_selected_provider(USER, "claude").await.unwrap();

    let fallback = StaticBackend::new("alpha", "fallback reply");
    let router = build_router(vec![fallback.clone()], preferences, memory_store(10));

    assert_eq!(router.respond(USER, "hello").await, "fallback reply");
}

#[tokio::test]
async fn test_session_override_selects_registered_backend() {
    let dir = tempfile::tempdir().unwrap();
    let preferences = open_preferences(&dir).await;
    let alpha = StaticBackend::new("alpha", "reply from alpha");
    let beta = StaticBackend::new("beta", "reply from beta");

    let router = build_router(vec![alpha, beta], preferences, memory_store(10));

    // First registered is the implicit default
    assert_eq!(router.respond(USER, "hi").await, "reply from alpha");

    router.set_session_provider(USER, "beta").unwrap();
    assert_eq!(router.respond(USER, "hi").await, "reply from beta");

    router.clear_session_provider(USER);
    assert_eq!(router.respond(USER, "hi").await, "reply from alpha");

    // Overrides are rejected for unregistered providers
    assert!(router.set_session_provider(USER, "gamma").is_err());
}

#[tokio::test]
async fn test_explicit_default_provider_designation() {
    let dir = tempfile::tempdir().unwrap();
    let preferences = open_preferences(&dir).await;
    let alpha = StaticBackend::new("alpha", "reply from alpha");
    let beta = StaticBackend::new("beta", "reply from beta");

    let router = build_router(vec![alpha, beta], preferences, memory_store(10));

    router.set_default_provider("beta").unwrap();
    assert_eq!(router.respond(USER, "hi").await, "reply from beta");

    assert!(router.set_default_provider("gamma").is_err());
}

#[tokio::test]
async fn test_no_resolvable_backend_is_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let preferences = open_preferences(&dir).await;
    let history = memory_store(10);

    let router = build_router(Vec::new(), preferences, history.clone());

    let reply = router.respond(USER, "hello").await;
    assert_eq!(reply, routing_texts::SERVICE_UNAVAILABLE_NOTICE);

    // No adapter call happened, so nothing was appended
    assert!(history.read(USER).await.is_empty());
}

#[tokio::test]
async fn test_failure_notice_is_still_appended_as_the_reply() {
    let dir = tempfile::tempdir().unwrap();
    let preferences = open_preferences(&dir).await;
    let history = memory_store(10);
    // Registered backend whose credential the provider rejects on every call
    let broken = StaticBackend::invalid("alpha", "unused");

    let router = build_router(vec![broken], preferences, history.clone());

    let reply = router.respond(USER, "hello").await;
    assert_eq!(reply, notices::INVALID_CREDENTIAL);

    // A classified failure still completes the turn
    let messages = history.read(USER).await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, notices::INVALID_CREDENTIAL);
}

#[tokio::test]
async fn test_context_includes_system_preamble_and_trailing_history() {
    let dir = tempfile::tempdir().unwrap();
    let preferences = open_preferences(&dir).await;
    let history = memory_store(10);

    for i in 0..4 {
        history
            .append(USER, &format!("question {i}"), &format!("answer {i}"))
            .await;
    }

    let backend = StaticBackend::new("alpha", "reply");
    let router = build_router(vec![backend], preferences, history.clone());

    // The turn itself appends, so afterwards the store holds five turns
    router.respond(USER, "question 4").await;
    let messages = history.read(USER).await;
    assert_eq!(messages.len(), 10);
    assert_eq!(messages[8].content, "question 4");
    assert_eq!(messages[9].content, "reply");
}

#[tokio::test]
async fn test_rate_limited_turn_stops_before_routing() {
    let dir = tempfile::tempdir().unwrap();
    let preferences = open_preferences(&dir).await;
    let history = memory_store(10);
    let backend = StaticBackend::new("alpha", "canned reply");
    let database = Arc::new(Database::new("sqlite::memory:").await.unwrap());

    let service = ChatService::new(
        RateLimiter::new(3, Duration::from_secs(60)),
        build_router(vec![backend.clone()], preferences, history.clone()),
        UsageRecorder::new(database.clone()),
    );

    // Ceiling is three; the fourth call within the window is rejected
    for _ in 0..3 {
        assert_eq!(service.handle_message(USER, CHAT, "hello").await, "canned reply");
    }
    let rejected = service.handle_message(USER, CHAT, "hello").await;
    assert_eq!(rejected, routing_texts::RATE_LIMITED_NOTICE);

    // No adapter invocation and no conversation-store append for the
    // rejected turn
    assert_eq!(backend.calls(), 3);
    assert_eq!(history.read(USER).await.len(), 6);

    // And no usage row either
    tokio::time::sleep(Duration::from_millis(100)).await;
    let stats = database.get_user_stats(USER).await.unwrap().unwrap();
    assert_eq!(stats.total_messages, 3);
}

#[tokio::test]
async fn test_end_to_end_turn_records_usage() {
    let dir = tempfile::tempdir().unwrap();
    let preferences = open_preferences(&dir).await;
    let database = Arc::new(Database::new("sqlite::memory:").await.unwrap());

    let service = ChatService::new(
        RateLimiter::default(),
        build_router(
            vec![StaticBackend::new("alpha", "canned reply")],
            preferences,
            memory_store(10),
        ),
        UsageRecorder::new(database.clone()),
    );

    let reply = service.handle_message(USER, CHAT, "hello").await;
    assert!(!reply.is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let stats = database.get_user_stats(USER).await.unwrap().unwrap();
    assert_eq!(stats.total_messages, 1);
    assert_eq!(stats.tokens_used, i64::try_from("hello".len() + reply.len()).unwrap());
}

#[tokio::test]
async fn test_provider_connectivity_check() {
    let dir = tempfile::tempdir().unwrap();
    let preferences = open_preferences(&dir).await;

    let healthy = StaticBackend::new("alpha", "a real answer");
    let degraded = StaticBackend::new("beta", notices::FALLBACK[0]);
    let router = build_router(vec![healthy, degraded], preferences, memory_store(10));

    assert!(router.test_provider("alpha", None).await);
    // A reply drawn from the fallback-notice set is not a success
    assert!(!router.test_provider("beta", None).await);
    assert!(!router.test_provider("gamma", None).await);
}

#[tokio::test]
async fn test_provider_connectivity_check_with_user_credential() {
    let server = MockServer::start().await;
    mount_openai_stub(&server, "pong").await;

    let dir = tempfile::tempdir().unwrap();
    let preferences = open_preferences(&dir).await;
    preferences.set_credential(USER, "openai", "sk-user").await.unwrap();

    let options = RoutingOptions {
        factory: AdapterFactory::default().with_openai_base_url(server.uri()),
        ..RoutingOptions::default()
    };
    let router = ChatRouter::new(
        registry_with(Vec::new()),
        preferences,
        memory_store(10),
        options,
    );

    assert!(router.test_provider("openai", Some(USER)).await);
    // Without the user's credential there is no registered fallback
    assert!(!router.test_provider("openai", None).await);
}

#[tokio::test]
async fn test_provider_status_reports_credential_validity() {
    let dir = tempfile::tempdir().unwrap();
    let preferences = open_preferences(&dir).await;

    let router = build_router(
        vec![
            StaticBackend::new("alpha", "x"),
            StaticBackend::invalid("beta", "y"),
        ],
        preferences,
        memory_store(10),
    );

    let status = router.provider_status();
    assert_eq!(status.get("alpha"), Some(&true));
    assert_eq!(status.get("beta"), Some(&false));

    assert_eq!(router.provider_names(), vec!["alpha", "beta"]);
    assert!(!router.provider_models("alpha").unwrap().is_empty());
}
