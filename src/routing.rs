// ABOUTME: Routing service resolving the effective backend for each conversational turn
// ABOUTME: Applies user preference > session override > process default precedence
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

//! # Routing Service
//!
//! Routes a user's turn to the effective backend, builds the bounded
//! generation context, and arranges the conversation-store append and usage
//! telemetry around the call.
//!
//! Resolution order for provider, credential, and model (first match wins):
//!
//! 1. The preference store holds a selected provider AND a credential for it
//!    whose format validates: a fresh adapter instance is constructed,
//!    scoped to this call. A selected provider without a usable credential
//!    fails closed to the next source; another user's credential is never
//!    substituted.
//! 2. An in-memory session override names a registered process-wide adapter
//!    (process credential, not the user's).
//! 3. The process-wide default adapter.
//! 4. Nothing resolvable: a fixed unavailable notice, terminal for the turn.
//!
//! Whatever the adapter returns, a real completion or a classified failure
//! notice, the turn counts as completed: the pair is appended to the
//! conversation store unconditionally. Anything that escapes the adapter
//! layer unconverted is caught at this boundary and becomes one generic
//! apology; raw failures never reach the end user.

use crate::config::environment::ServerConfig;
use crate::constants::routing;
use crate::errors::{AppError, AppResult};
use crate::history::ConversationStore;
use crate::llm::{
    notices, AdapterFactory, ChatBackend, ChatMessage, ModelInfo, ProviderKind, ProviderRegistry,
};
use crate::preferences::PreferenceStore;
use crate::rate_limiting::RateLimiter;
use crate::usage::UsageRecorder;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

/// Tunables for the routing service
#[derive(Debug, Clone)]
pub struct RoutingOptions {
    /// System preamble synthesized at the head of every context
    pub system_prompt: String,
    /// Trailing history messages included in the context
    pub context_depth: usize,
    /// Factory for per-call adapter construction
    pub factory: AdapterFactory,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            system_prompt: routing::DEFAULT_SYSTEM_PROMPT.to_owned(),
            context_depth: crate::constants::history::DEFAULT_DEPTH,
            factory: AdapterFactory::default(),
        }
    }
}

/// Routing service for conversational turns
pub struct ChatRouter {
    registry: RwLock<ProviderRegistry>,
    session_overrides: DashMap<i64, String>,
    preferences: Arc<PreferenceStore>,
    history: ConversationStore,
    options: RoutingOptions,
}

impl ChatRouter {
    /// Create a router over an already-built registry
    #[must_use]
    pub fn new(
        registry: ProviderRegistry,
        preferences: Arc<PreferenceStore>,
        history: ConversationStore,
        options: RoutingOptions,
    ) -> Self {
        Self {
            registry: RwLock::new(registry),
            session_overrides: DashMap::new(),
            preferences,
            history,
            options,
        }
    }

    /// Build a router from server configuration.
    ///
    /// Backends with process-wide credentials are registered in the fixed
    /// order `openai`, `claude`, so the implicit default (first registered)
    /// is deterministic rather than environment-probing-order dependent.
    /// `DEFAULT_PROVIDER` designates an explicit default; naming an
    /// unregistered provider is a configuration error.
    ///
    /// # Errors
    ///
    /// Returns an error if an adapter cannot be constructed or the explicit
    /// default names an unregistered provider.
    pub fn from_config(
        config: &ServerConfig,
        preferences: Arc<PreferenceStore>,
        history: ConversationStore,
    ) -> AppResult<Self> {
        let mut factory = AdapterFactory::default();
        let mut registry = ProviderRegistry::new();

        if let Some(openai) = &config.providers.openai {
            factory = factory.with_openai_options(openai.options.clone());
            let backend = factory.make(
                ProviderKind::OpenAi,
                openai.api_key.clone(),
                openai.model.clone(),
            )?;
            registry.register(backend);
            info!("registered process-wide openai backend");
        }

        if let Some(claude) = &config.providers.claude {
            factory = factory.with_claude_options(claude.options.clone());
            let backend = factory.make(
                ProviderKind::Claude,
                claude.api_key.clone(),
                claude.model.clone(),
            )?;
            registry.register(backend);
            info!("registered process-wide claude backend");
        }

        if let Some(default) = &config.providers.default_provider {
            registry.set_default(default)?;
            info!(provider = %default, "explicit default backend designated");
        }

        let options = RoutingOptions {
            context_depth: config.history_depth,
            factory,
            ..RoutingOptions::default()
        };

        Ok(Self::new(registry, preferences, history, options))
    }

    /// Handle one conversational turn and return the reply text.
    ///
    /// This method never fails: classified backend failures come back as
    /// notices from the adapter layer, an unresolvable backend yields the
    /// fixed unavailable notice, and anything unexpected is converted to a
    /// generic apology at this final boundary.
    pub async fn respond(&self, user_id: i64, text: &str) -> String {
        match self.respond_inner(user_id, text).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(user_id, "unexpected failure while routing turn: {e}");
                routing::GENERIC_APOLOGY.to_owned()
            }
        }
    }

    async fn respond_inner(&self, user_id: i64, text: &str) -> AppResult<String> {
        let Some(backend) = self.resolve_backend(user_id).await? else {
            warn!(user_id, "no backend resolvable for turn");
            return Ok(routing::SERVICE_UNAVAILABLE_NOTICE.to_owned());
        };

        let context = self.build_context(user_id, text).await;
        let reply = backend.generate(&context).await;

        // The turn is "completed" whether reply is a real completion or a
        // classified failure notice; both are appended.
        self.history.append(user_id, text, &reply).await;

        Ok(reply)
    }

    /// Resolve the effective backend for a user, applying the precedence
    /// order documented on the module
    async fn resolve_backend(&self, user_id: i64) -> AppResult<Option<Arc<dyn ChatBackend>>> {
        if let Some(provider) = self.preferences.selected_provider(user_id).await {
            match provider.parse::<ProviderKind>() {
                Ok(kind) => {
                    if let Some(credential) = self.preferences.credential(user_id, &provider).await
                    {
                        let model = self.preferences.selected_model(user_id).await;
                        let backend = self.options.factory.make(kind, credential, model)?;
                        if backend.validate() {
                            debug!(user_id, %provider, "using user-preferred backend");
                            return Ok(Some(backend));
                        }
                        warn!(
                            user_id,
                            %provider,
                            "stored credential failed format validation; falling back"
                        );
                    } else {
                        debug!(
                            user_id,
                            %provider,
                            "selected provider has no stored credential; falling back"
                        );
                    }
                }
                Err(_) => {
                    warn!(user_id, %provider, "selected provider is unknown; falling back");
                }
            }
        }

        if let Some(name) = self
            .session_overrides
            .get(&user_id)
            .map(|entry| entry.value().clone())
        {
            if let Some(backend) = self.registered(&name) {
                debug!(user_id, provider = %name, "using session-override backend");
                return Ok(Some(backend));
            }
            warn!(
                user_id,
                provider = %name,
                "session override names an unregistered provider; falling back"
            );
        }

        Ok(self.default_backend())
    }

    /// Build the bounded generation context: the synthesized system
    /// preamble, the trailing slice of stored history, and the new message
    async fn build_context(&self, user_id: i64, text: &str) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(self.options.system_prompt.clone())];

        let history = self.history.read(user_id).await;
        let start = history.len().saturating_sub(self.options.context_depth);
        messages.extend_from_slice(&history[start..]);

        messages.push(ChatMessage::user(text));
        messages
    }

    /// Issue one real generation call with a trivial prompt and report
    /// whether the provider answered.
    ///
    /// Success means the reply is non-empty and not a member of the fixed
    /// failure-notice set. The notice set is small and known, so exact
    /// non-membership is the signal; a genuine reply that reproduces a
    /// notice verbatim would be misclassified, which is why nothing
    /// safety-critical hangs off this check.
    pub async fn test_provider(&self, provider: &str, user_id: Option<i64>) -> bool {
        let Some(backend) = self.resolve_test_backend(provider, user_id).await else {
            return false;
        };

        let reply = backend.generate(&[ChatMessage::user("Hello")]).await;
        !reply.is_empty() && !notices::is_notice(&reply)
    }

    /// Resolve the backend `test_provider` should exercise: the user's own
    /// credential when one is stored and usable, else the registered adapter
    async fn resolve_test_backend(
        &self,
        provider: &str,
        user_id: Option<i64>,
    ) -> Option<Arc<dyn ChatBackend>> {
        if let Some(user_id) = user_id {
            if let Ok(kind) = provider.parse::<ProviderKind>() {
                if let Some(credential) = self.preferences.credential(user_id, provider).await {
                    let model = self.preferences.selected_model(user_id).await;
                    match self.options.factory.make(kind, credential, model) {
                        Ok(backend) if backend.validate() => return Some(backend),
                        Ok(_) => {
                            debug!(user_id, provider, "stored credential invalid for test");
                        }
                        Err(e) => {
                            warn!(user_id, provider, "failed to build test adapter: {e}");
                        }
                    }
                }
            }
        }

        self.registered(provider)
    }

    /// Pin this user's session to a registered provider
    ///
    /// # Errors
    ///
    /// Returns an error if no such provider is registered.
    pub fn set_session_provider(&self, user_id: i64, provider: &str) -> AppResult<()> {
        if self.registered(provider).is_none() {
            return Err(AppError::invalid_input(format!(
                "provider {provider} is not registered"
            )));
        }
        self.session_overrides.insert(user_id, provider.to_owned());
        Ok(())
    }

    /// Drop this user's session override
    pub fn clear_session_provider(&self, user_id: i64) {
        self.session_overrides.remove(&user_id);
    }

    /// Designate the process-wide default backend
    ///
    /// # Errors
    ///
    /// Returns an error if no such provider is registered.
    pub fn set_default_provider(&self, provider: &str) -> AppResult<()> {
        let mut registry = self
            .registry
            .write()
            .map_err(|_| AppError::internal("provider registry lock poisoned"))?;
        registry.set_default(provider)
    }

    /// Name of the backend a turn falls through to when neither a user
    /// preference nor a session override applies
    #[must_use]
    pub fn default_provider(&self) -> Option<&'static str> {
        self.default_backend().map(|backend| backend.name())
    }

    /// Credential-format validity per registered provider
    #[must_use]
    pub fn provider_status(&self) -> BTreeMap<String, bool> {
        self.registry
            .read()
            .map(|registry| registry.status())
            .unwrap_or_default()
    }

    /// Names of all registered providers
    #[must_use]
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.registry
            .read()
            .map(|registry| registry.names())
            .unwrap_or_default()
    }

    /// Static model catalog for a registered provider
    #[must_use]
    pub fn provider_models(&self, provider: &str) -> Option<&'static [ModelInfo]> {
        self.registered(provider).map(|backend| backend.list_models())
    }

    /// Delete a user's stored conversation history
    pub async fn clear_history(&self, user_id: i64) {
        self.history.clear(user_id).await;
    }

    fn registered(&self, name: &str) -> Option<Arc<dyn ChatBackend>> {
        self.registry
            .read()
            .ok()
            .and_then(|registry| registry.get(name))
    }

    fn default_backend(&self) -> Option<Arc<dyn ChatBackend>> {
        self.registry
            .read()
            .ok()
            .and_then(|registry| registry.default_backend())
    }
}

/// Thin facade composing the inbound control flow: rate limiter admits or
/// rejects, the router handles the turn, and the usage recorder logs it
pub struct ChatService {
    limiter: RateLimiter,
    router: ChatRouter,
    usage: UsageRecorder,
}

impl ChatService {
    /// Assemble the facade from its components
    #[must_use]
    pub const fn new(limiter: RateLimiter, router: ChatRouter, usage: UsageRecorder) -> Self {
        Self {
            limiter,
            router,
            usage,
        }
    }

    /// Handle one inbound message end to end.
    ///
    /// A rate-limited turn is rejected before routing: no adapter call, no
    /// conversation-store append, no usage record.
    pub async fn handle_message(&self, user_id: i64, chat_id: i64, text: &str) -> String {
        if !self.limiter.admit(user_id) {
            debug!(user_id, "rate ceiling reached; rejecting turn");
            return routing::RATE_LIMITED_NOTICE.to_owned();
        }

        let reply = self.router.respond(user_id, text).await;

        self.usage.record(
            user_id,
            chat_id,
            "message",
            text.chars().count(),
            reply.chars().count(),
        );

        reply
    }

    /// The routing service behind this facade
    #[must_use]
    pub const fn router(&self) -> &ChatRouter {
        &self.router
    }

    /// The usage recorder behind this facade
    #[must_use]
    pub const fn usage(&self) -> &UsageRecorder {
        &self.usage
    }
}
