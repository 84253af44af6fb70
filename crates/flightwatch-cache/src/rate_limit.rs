// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window request counters per ip or user.
//!
//! The counter key is created with the window as its TTL on first increment,
//! so the window starts at the first counted request and resets when the key
//! expires.

use std::time::Duration;

use chrono::TimeDelta;
use tracing::{debug, warn};

use flightwatch_core::{FlightwatchError, RateLimitKind, RateLimitStatus};

use crate::keys;
use crate::store::CacheStore;

impl CacheStore {
    fn window(&self) -> Duration {
        Duration::from_secs(self.rate_limit.window_secs)
    }

    /// Read-only check of the counter. Never mutates it.
    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        kind: RateLimitKind,
    ) -> Result<RateLimitStatus, FlightwatchError> {
        let now = self.clock.now();
        let limit = self.rate_limit.max_requests;
        let window = self.window();
        let window_delta = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);

        if !self.rate_limit.enabled {
            return Ok(RateLimitStatus {
                identifier: identifier.to_string(),
                kind,
                blocked: false,
                count: 0,
                limit,
                remaining: limit,
                window_start: now,
                reset_at: now + window_delta,
            });
        }

        let key = keys::rate_limit(kind, identifier);
        let count = self.read_counter(&key).await?;
        let remaining_window = match self.backend.ttl(&key).await? {
            Some(ttl) if count > 0 => TimeDelta::from_std(ttl).unwrap_or(window_delta),
            _ => window_delta,
        };
        let reset_at = now + remaining_window;
        let blocked = count >= limit;

        if blocked {
            warn!(kind = %kind, identifier, count, limit, %reset_at, "rate limit reached");
        } else if count * 5 >= limit * 4 {
            debug!(kind = %kind, identifier, count, limit, "approaching rate limit (80%+)");
        }

        Ok(RateLimitStatus {
            identifier: identifier.to_string(),
            kind,
            blocked,
            count,
            limit,
            remaining: limit.saturating_sub(count),
            window_start: reset_at - window_delta,
            reset_at,
        })
    }

    /// Counts one request. Call only after a check that was not blocked.
    pub async fn increment_rate_limit(
        &self,
        identifier: &str,
        kind: RateLimitKind,
    ) -> Result<u64, FlightwatchError> {
        if !self.rate_limit.enabled {
            return Ok(0);
        }
        self.backend
            .incr(&keys::rate_limit(kind, identifier), self.window())
            .await
    }

    /// Clears the counter. Returns whether one existed.
    pub async fn reset_rate_limit(
        &self,
        identifier: &str,
        kind: RateLimitKind,
    ) -> Result<bool, FlightwatchError> {
        self.backend
            .delete(&keys::rate_limit(kind, identifier))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use flightwatch_config::model::{CacheConfig, RateLimitConfig};
    use flightwatch_core::{Clock, ManualClock, RateLimitKind};
    use flightwatch_storage::MemoryBackend;

    use crate::store::CacheStore;
    use crate::store::tests::store;

    #[tokio::test]
    async fn blocks_after_limit_then_resets() {
        let (store, clock) = store();
        let start = clock.now();
        for i in 0..10 {
            let status = store.check_rate_limit("10.0.0.1", RateLimitKind::Ip).await.unwrap();
            assert!(!status.blocked, "call {i} should pass");
            assert_eq!(status.remaining, 10 - i);
            store.increment_rate_limit("10.0.0.1", RateLimitKind::Ip).await.unwrap();
        }
        let blocked = store.check_rate_limit("10.0.0.1", RateLimitKind::Ip).await.unwrap();
        assert!(blocked.blocked);
        assert_eq!(blocked.remaining, 0);
        assert!(blocked.reset_at > start);

        clock.advance(Duration::from_secs(60));
        let after = store.check_rate_limit("10.0.0.1", RateLimitKind::Ip).await.unwrap();
        assert!(!after.blocked);
        assert_eq!(after.count, 0);
    }

    #[tokio::test]
    async fn check_does_not_mutate() {
        let (store, _) = store();
        for _ in 0..20 {
            store.check_rate_limit("u-1", RateLimitKind::User).await.unwrap();
        }
        let status = store.check_rate_limit("u-1", RateLimitKind::User).await.unwrap();
        assert_eq!(status.count, 0);
        assert!(!status.blocked);
    }

    #[tokio::test]
    async fn kinds_and_identifiers_are_independent() {
        let (store, _) = store();
        for _ in 0..10 {
            store.increment_rate_limit("shared", RateLimitKind::Ip).await.unwrap();
        }
        assert!(store.check_rate_limit("shared", RateLimitKind::Ip).await.unwrap().blocked);
        assert!(!store.check_rate_limit("shared", RateLimitKind::User).await.unwrap().blocked);
        assert!(!store.check_rate_limit("other", RateLimitKind::Ip).await.unwrap().blocked);
    }

    #[tokio::test]
    async fn reset_clears_counter() {
        let (store, _) = store();
        for _ in 0..10 {
            store.increment_rate_limit("10.0.0.2", RateLimitKind::Ip).await.unwrap();
        }
        assert!(store.reset_rate_limit("10.0.0.2", RateLimitKind::Ip).await.unwrap());
        assert!(!store.check_rate_limit("10.0.0.2", RateLimitKind::Ip).await.unwrap().blocked);
    }

    #[tokio::test]
    async fn disabled_limit_never_blocks() {
        let clock = Arc::new(ManualClock::default());
        let backend = Arc::new(MemoryBackend::with_clock(clock.clone()));
        let config = RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        };
        let store = CacheStore::new(backend, clock, &CacheConfig::default(), &config);
        for _ in 0..50 {
            assert_eq!(store.increment_rate_limit("x", RateLimitKind::Ip).await.unwrap(), 0);
        }
        assert!(!store.check_rate_limit("x", RateLimitKind::Ip).await.unwrap().blocked);
    }
}
