// @zen-component: AUTH-RateLimiter
//
//! Per-client sliding-window attempt counter for authentication.
//!
//! Process-local and best effort: state lives in memory and resets on
//! restart. Every call to [`RateLimiter::is_blocked`] counts as an attempt;
//! callers reset the client's record after a successful authentication.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, warn};

/// Default window: 15 minutes.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Default attempts allowed per window.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Rate limiter parameters.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_attempts: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitRecord {
    attempt_count: u32,
    window_started_at: Instant,
}

/// In-memory attempt counter keyed by client identifier.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    records: DashMap<String, RateLimitRecord>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            records: DashMap::new(),
        }
    }

    /// Count an attempt for `client_id` and report whether it is over the limit.
    pub fn is_blocked(&self, client_id: &str) -> bool {
        self.is_blocked_at(client_id, Instant::now())
    }

    fn is_blocked_at(&self, client_id: &str, now: Instant) -> bool {
        let mut record = self
            .records
            .entry(client_id.to_string())
            .or_insert(RateLimitRecord {
                attempt_count: 0,
                window_started_at: now,
            });

        if now.saturating_duration_since(record.window_started_at) > self.config.window {
            record.attempt_count = 0;
            record.window_started_at = now;
        }
        record.attempt_count += 1;

        let blocked = record.attempt_count > self.config.max_attempts;
        if blocked {
            warn!(client_id, attempts = record.attempt_count, "authentication rate limit exceeded");
        } else {
            debug!(client_id, attempts = record.attempt_count, "authentication attempt counted");
        }
        blocked
    }

    /// Forget the record for `client_id` (call after a successful login).
    pub fn reset(&self, client_id: &str) {
        self.records.remove(client_id);
    }

    /// Seconds until the client's current window rolls over.
    pub fn retry_after_secs(&self, client_id: &str) -> u64 {
        self.retry_after_at(client_id, Instant::now())
    }

    fn retry_after_at(&self, client_id: &str, now: Instant) -> u64 {
        self.records
            .get(client_id)
            .map(|record| {
                let elapsed = now.saturating_duration_since(record.window_started_at);
                self.config.window.saturating_sub(elapsed).as_secs().max(1)
            })
            .unwrap_or(0)
    }

    /// Drop records whose window has already elapsed.
    pub fn cleanup(&self) {
        let window = self.config.window;
        self.records
            .retain(|_, record| record.window_started_at.elapsed() <= window);
    }

    /// Spawn a periodic cleanup task.
    pub fn spawn_cleanup_task(self: &std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        let limiter = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                limiter.cleanup();
            }
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sixth_attempt_is_blocked() {
        let limiter = RateLimiter::default();
        let results: Vec<bool> = (0..6).map(|_| limiter.is_blocked("1.2.3.4")).collect();
        assert_eq!(results, vec![false, false, false, false, false, true]);
    }

    #[test]
    fn reset_unblocks_next_call() {
        let limiter = RateLimiter::default();
        for _ in 0..6 {
            limiter.is_blocked("1.2.3.4");
        }
        assert!(limiter.is_blocked("1.2.3.4"));
        limiter.reset("1.2.3.4");
        assert!(!limiter.is_blocked("1.2.3.4"));
    }

    #[test]
    fn clients_are_isolated() {
        let limiter = RateLimiter::default();
        for _ in 0..6 {
            limiter.is_blocked("a");
        }
        assert!(!limiter.is_blocked("b"));
    }

    #[test]
    fn window_rollover_restarts_count() {
        let limiter = RateLimiter::default();
        let start = Instant::now();
        for _ in 0..6 {
            limiter.is_blocked_at("c", start);
        }
        assert!(limiter.is_blocked_at("c", start + Duration::from_secs(60)));
        let later = start + DEFAULT_WINDOW + Duration::from_secs(1);
        assert!(!limiter.is_blocked_at("c", later));
    }

    #[test]
    fn retry_hint_counts_down_window() {
        let limiter = RateLimiter::default();
        let start = Instant::now();
        limiter.is_blocked_at("d", start);
        let hint = limiter.retry_after_at("d", start + Duration::from_secs(60));
        assert_eq!(hint, DEFAULT_WINDOW.as_secs() - 60);
        assert_eq!(limiter.retry_after_secs("unknown"), 0);
    }

    proptest! {
        #[test]
        fn blocks_exactly_after_max_attempts(max in 1u32..20, extra in 1u32..10) {
            let limiter = RateLimiter::new(RateLimitConfig {
                window: DEFAULT_WINDOW,
                max_attempts: max,
            });
            for _ in 0..max {
                prop_assert!(!limiter.is_blocked("p"));
            }
            for _ in 0..extra {
                prop_assert!(limiter.is_blocked("p"));
            }
        }
    }
}
