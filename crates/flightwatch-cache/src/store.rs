// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result cache over a [`StoreBackend`].
//!
//! Entries are JSON-encoded [`CacheEntry`] values stored under `flight:<KEY>`
//! with a backend TTL. Reads re-check `cached_at + ttl_seconds` against the
//! clock as well, so a backend with coarse expiry never yields stale data.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use flightwatch_config::model::{CacheConfig, RateLimitConfig};
use flightwatch_core::{
    CacheEntry, CacheStats, Clock, FlightwatchError, ResolutionKey, ResolutionOutcome,
    StoreBackend,
};

use crate::{keys, recording};

/// Counters live as long as a month of history.
const STATS_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Cache, history, and rate-limit operations over one shared backend.
///
/// History lives in `history.rs`, counters in `rate_limit.rs`.
pub struct CacheStore {
    pub(crate) backend: Arc<dyn StoreBackend>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ttl: Duration,
    pub(crate) history_max_entries: usize,
    pub(crate) history_ttl: Duration,
    pub(crate) rate_limit: RateLimitConfig,
}

impl CacheStore {
    pub fn new(
        backend: Arc<dyn StoreBackend>,
        clock: Arc<dyn Clock>,
        cache: &CacheConfig,
        rate_limit: &RateLimitConfig,
    ) -> Self {
        Self {
            backend,
            clock,
            ttl: Duration::from_secs(cache.ttl_secs),
            history_max_entries: cache.history_max_entries,
            history_ttl: Duration::from_secs(cache.history_ttl_days * 24 * 60 * 60),
            rate_limit: rate_limit.clone(),
        }
    }

    /// Default lifetime of an entry written without an explicit TTL.
    pub fn default_ttl(&self) -> Duration {
        self.ttl
    }

    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    /// Returns the entry for `key` if present and not expired.
    pub async fn get(&self, key: &ResolutionKey) -> Result<Option<CacheEntry>, FlightwatchError> {
        let entry = self.peek(key).await?;
        match &entry {
            Some(_) => {
                debug!(key = %key, "cache hit");
                recording::record_cache_hit();
                self.bump_stat(keys::STATS_HITS).await;
            }
            None => {
                debug!(key = %key, "cache miss");
                recording::record_cache_miss();
                self.bump_stat(keys::STATS_MISSES).await;
            }
        }
        Ok(entry)
    }

    /// Reads the live entry without touching hit/miss statistics.
    pub async fn peek(
        &self,
        key: &ResolutionKey,
    ) -> Result<Option<CacheEntry>, FlightwatchError> {
        let Some(raw) = self.backend.get(&keys::cache(key)).await? else {
            return Ok(None);
        };
        let entry: CacheEntry = serde_json::from_str(&raw)?;
        if entry.is_expired(self.clock.now()) {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    /// Overwrites the entry for `key` with `attempt_count = 1`.
    pub async fn set(
        &self,
        key: &ResolutionKey,
        outcome: &ResolutionOutcome,
        ttl: Option<Duration>,
    ) -> Result<CacheEntry, FlightwatchError> {
        self.write(key, outcome, ttl.unwrap_or(self.ttl), 1).await
    }

    /// Overwrites the entry, incrementing `attempt_count` if a live entry exists.
    pub async fn confirm(
        &self,
        key: &ResolutionKey,
        outcome: &ResolutionOutcome,
    ) -> Result<CacheEntry, FlightwatchError> {
        let attempts = match self.peek(key).await? {
            Some(existing) => existing.attempt_count.saturating_add(1),
            None => 1,
        };
        self.write(key, outcome, self.ttl, attempts).await
    }

    async fn write(
        &self,
        key: &ResolutionKey,
        outcome: &ResolutionOutcome,
        ttl: Duration,
        attempt_count: u32,
    ) -> Result<CacheEntry, FlightwatchError> {
        let entry = CacheEntry {
            key: key.clone(),
            outcome: outcome.clone(),
            cached_at: self.clock.now(),
            ttl_seconds: ttl.as_secs(),
            attempt_count,
        };
        let raw = serde_json::to_string(&entry)?;
        self.backend
            .set(&keys::cache(key), &raw, Some(ttl))
            .await?;
        debug!(key = %key, ttl_secs = ttl.as_secs(), attempt_count, "cached resolution");
        Ok(entry)
    }

    /// Removes the entry. Returns whether one existed.
    pub async fn delete(&self, key: &ResolutionKey) -> Result<bool, FlightwatchError> {
        self.backend.delete(&keys::cache(key)).await
    }

    pub async fn exists(&self, key: &ResolutionKey) -> Result<bool, FlightwatchError> {
        Ok(self.peek(key).await?.is_some())
    }

    /// Extends a live entry so it expires `ttl` from now. Returns whether it existed.
    pub async fn refresh(&self, key: &ResolutionKey, ttl: Duration) -> Result<bool, FlightwatchError> {
        let Some(mut entry) = self.peek(key).await? else {
            return Ok(false);
        };
        let age = (self.clock.now() - entry.cached_at)
            .to_std()
            .unwrap_or_default();
        entry.ttl_seconds = (age + ttl).as_secs();
        let raw = serde_json::to_string(&entry)?;
        self.backend.set(&keys::cache(key), &raw, Some(ttl)).await?;
        Ok(true)
    }

    /// Preloads successful outcomes. Returns how many were written.
    pub async fn warm(&self, outcomes: &[ResolutionOutcome]) -> Result<usize, FlightwatchError> {
        let mut written = 0;
        for outcome in outcomes.iter().filter(|o| o.success) {
            self.set(&outcome.key, outcome, None).await?;
            written += 1;
        }
        debug!(written, "cache warmed");
        Ok(written)
    }

    /// Hit/miss totals recorded in the backing store.
    pub async fn stats(&self) -> Result<CacheStats, FlightwatchError> {
        let hits = self.read_counter(keys::STATS_HITS).await?;
        let misses = self.read_counter(keys::STATS_MISSES).await?;
        Ok(CacheStats::new(hits, misses))
    }

    pub(crate) async fn read_counter(&self, key: &str) -> Result<u64, FlightwatchError> {
        Ok(self
            .backend
            .get(key)
            .await?
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0))
    }

    async fn bump_stat(&self, key: &str) {
        if let Err(e) = self.backend.incr(key, STATS_TTL).await {
            warn!(error = %e, counter = key, "failed to update cache statistics");
            recording::record_storage_error("stats");
        }
    }
}
