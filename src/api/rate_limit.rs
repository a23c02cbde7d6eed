//! Fixed-window rate limiting for authentication endpoints.
//!
//! Counters are process-local and non-persistent: horizontally scaled or
//! restarted instances each start a fresh window. Accepted at this system's
//! scale; the limiter is injected through `AppState` so a shared backend
//! could replace it without touching call sites.

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Rate limit tier for different endpoint types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitTier {
    /// Admin login attempts, keyed by client IP
    Auth,
    /// Magic-link requests, keyed by lowercased email
    MagicLink,
}

/// Entry in the rate limit tracker
#[derive(Debug, Clone)]
struct RateLimitEntry {
    /// Requests counted in the current window
    count: u32,
    /// Start of the current window
    window_start: Instant,
}

/// Thread-safe rate limiter using dashmap
#[derive(Debug)]
pub struct RateLimiter {
    /// Map of (key, tier) -> RateLimitEntry
    entries: DashMap<(String, RateLimitTier), RateLimitEntry>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Count a request against the given key and tier.
    /// Returns Ok(()) if allowed, Err(retry_after_seconds) if rate limited.
    pub fn check(&self, key: &str, tier: RateLimitTier) -> Result<(), u64> {
        if !self.config.enabled {
            return Ok(());
        }

        let limit = self.limit(tier);
        let window = self.window(tier);
        let now = Instant::now();

        let mut entry = self
            .entries
            .entry((key.to_string(), tier))
            .or_insert_with(|| RateLimitEntry {
                count: 0,
                window_start: now,
            });

        // Reset the window once it has elapsed
        let elapsed = now.duration_since(entry.window_start);
        if elapsed >= window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count < limit {
            entry.count += 1;
            Ok(())
        } else {
            let retry_after = window.saturating_sub(elapsed).as_secs().max(1);
            Err(retry_after)
        }
    }

    fn limit(&self, tier: RateLimitTier) -> u32 {
        match tier {
            RateLimitTier::Auth => self.config.login_attempts_per_window,
            RateLimitTier::MagicLink => self.config.magic_link_requests_per_window,
        }
    }

    fn window(&self, tier: RateLimitTier) -> Duration {
        match tier {
            RateLimitTier::Auth => Duration::from_secs(self.config.login_window_seconds),
            RateLimitTier::MagicLink => Duration::from_secs(self.config.magic_link_window_seconds),
        }
    }

    /// Clean up expired entries to prevent memory leaks
    pub fn cleanup_expired(&self) {
        let now = Instant::now();

        self.entries.retain(|(_, tier), entry| {
            let window = self.window(*tier);
            now.duration_since(entry.window_start) < window * 2
        });
    }

    /// Get the number of tracked entries (for monitoring)
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Spawn a background task to periodically clean up expired rate limit entries
pub fn spawn_cleanup_task(rate_limiter: std::sync::Arc<RateLimiter>, cleanup_interval_secs: u64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(cleanup_interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            rate_limiter.cleanup_expired();
            tracing::debug!(
                "Rate limiter cleanup complete, {} entries remaining",
                rate_limiter.entry_count()
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            login_attempts_per_window: 5,
            login_window_seconds: 60,
            magic_link_requests_per_window: 3,
            magic_link_window_seconds: 300,
            cleanup_interval: 300,
        }
    }

    #[test]
    fn test_fourth_magic_link_request_is_rejected() {
        let limiter = RateLimiter::new(test_config());

        for i in 0..3 {
            assert!(
                limiter.check("member@example.com", RateLimitTier::MagicLink).is_ok(),
                "request {} should be allowed",
                i
            );
        }

        assert!(limiter
            .check("member@example.com", RateLimitTier::MagicLink)
            .is_err());
    }

    #[test]
    fn test_different_keys_have_separate_limits() {
        let limiter = RateLimiter::new(test_config());

        for _ in 0..3 {
            let _ = limiter.check("a@example.com", RateLimitTier::MagicLink);
        }

        assert!(limiter.check("a@example.com", RateLimitTier::MagicLink).is_err());
        assert!(limiter.check("b@example.com", RateLimitTier::MagicLink).is_ok());
    }

    #[test]
    fn test_different_tiers_have_different_limits() {
        let limiter = RateLimiter::new(test_config());

        // Same key string, different tiers
        for _ in 0..3 {
            let _ = limiter.check("192.168.1.1", RateLimitTier::MagicLink);
        }
        assert!(limiter.check("192.168.1.1", RateLimitTier::MagicLink).is_err());

        // Auth tier allows 5
        for _ in 0..5 {
            assert!(limiter.check("192.168.1.1", RateLimitTier::Auth).is_ok());
        }
        assert!(limiter.check("192.168.1.1", RateLimitTier::Auth).is_err());
    }

    #[test]
    fn test_disabled_rate_limiting() {
        let mut config = test_config();
        config.enabled = false;
        let limiter = RateLimiter::new(config);

        for _ in 0..100 {
            assert!(limiter.check("x", RateLimitTier::MagicLink).is_ok());
        }
    }

    #[test]
    fn test_cleanup_keeps_recent_entries() {
        let limiter = RateLimiter::new(test_config());

        let _ = limiter.check("member@example.com", RateLimitTier::MagicLink);
        assert_eq!(limiter.entry_count(), 1);

        limiter.cleanup_expired();
        assert_eq!(limiter.entry_count(), 1);
    }
}
