// ABOUTME: In-process sliding-window rate limiter for per-user request throttling
// ABOUTME: Prunes expired instants lazily on each admission check
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

//! # Sliding-Window Rate Limiter
//!
//! Per-user request-rate ceiling over a trailing fixed window (default 30
//! requests per 60 seconds). The window is recomputed lazily on each check:
//! instants older than the window are pruned, then the count is compared to
//! the ceiling. State is process-local and in-memory; it is not shared
//! across instances and resets on restart, by design.

use crate::config::environment::RateLimitConfig;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Per-user sliding-window request counter
pub struct RateLimiter {
    windows: DashMap<i64, Vec<Instant>>,
    limit: usize,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter admitting `limit` requests per `window` per user
    #[must_use]
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            limit,
            window,
        }
    }

    /// Create a limiter from configuration
    #[must_use]
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.per_minute, config.window)
    }

    /// Check whether a request from `user_id` is admitted right now.
    ///
    /// Admitted requests are recorded against the window; rejected requests
    /// are not. An instant exactly at the window boundary counts as expired
    /// (strict greater-than against "now minus window").
    pub fn admit(&self, user_id: i64) -> bool {
        self.admit_at(user_id, Instant::now())
    }

    fn admit_at(&self, user_id: i64, now: Instant) -> bool {
        let mut window = self.windows.entry(user_id).or_default();

        window.retain(|instant| now.duration_since(*instant) < self.window);

        if window.len() >= self.limit {
            return false;
        }

        window.push(now);
        true
    }

    /// Requests still admissible for `user_id` in the current window
    #[must_use]
    pub fn remaining(&self, user_id: i64) -> usize {
        let now = Instant::now();
        self.windows.get(&user_id).map_or(self.limit, |window| {
            let current = window
                .iter()
                .filter(|instant| now.duration_since(**instant) < self.window)
                .count();
            self.limit.saturating_sub(current)
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}
