// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate limit → cache → lock → double-check → cascade → write-through.

use std::sync::Arc;

use tracing::{debug, warn};

use flightwatch_cache::{CacheStore, DistributedLock};
use flightwatch_core::{
    AttemptLog, CacheEntry, Clock, FlightwatchError, RateLimitKind, ResolutionFailure,
    ResolutionKey, ResolutionOutcome, StatusCode,
};

use crate::cascade::CascadingResolver;

/// Per-call resolution options.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub airline: Option<String>,
    pub use_cache: bool,
    pub ip: Option<String>,
    pub user_id: Option<String>,
    /// Append a history record on success. Monitoring checks write their own.
    pub record_history: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            airline: None,
            use_cache: true,
            ip: None,
            user_id: None,
            record_history: true,
        }
    }
}

impl ResolveOptions {
    /// Options for a polling check: bypass the cache and skip history.
    pub fn polling(airline: Option<String>) -> Self {
        Self {
            airline,
            use_cache: false,
            record_history: false,
            ..Self::default()
        }
    }
}

/// Single entry point for resolving a key safely under concurrency.
pub struct ResolutionService {
    cache: Arc<CacheStore>,
    lock: Arc<DistributedLock>,
    resolver: Arc<CascadingResolver>,
    clock: Arc<dyn Clock>,
}

impl ResolutionService {
    pub fn new(
        cache: Arc<CacheStore>,
        lock: Arc<DistributedLock>,
        resolver: Arc<CascadingResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            lock,
            resolver,
            clock,
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn lock(&self) -> &Arc<DistributedLock> {
        &self.lock
    }

    pub fn resolver(&self) -> &Arc<CascadingResolver> {
        &self.resolver
    }

    /// Resolves `key`. "Not found", rate limiting and lock timeouts are all
    /// reported as outcomes; this never fails for those.
    pub async fn resolve(
        &self,
        key: &ResolutionKey,
        options: &ResolveOptions,
    ) -> Result<ResolutionOutcome, FlightwatchError> {
        if let Some(blocked) = self.enforce_rate_limits(key, options).await {
            return Ok(blocked);
        }

        if options.use_cache {
            match self.cache.get(key).await {
                Ok(Some(entry)) => return Ok(entry.outcome.from_cache()),
                Ok(None) => {}
                Err(e) => warn!(key = %key, error = %e, "cache read failed, resolving live"),
            }
        }

        let before = if options.use_cache {
            None
        } else {
            self.cache.peek(key).await.unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "cache read failed");
                None
            })
        };

        let guarded = self
            .lock
            .execute_with_lock(key, self.lock.default_options(), || {
                self.resolve_locked(key, options, before.as_ref())
            })
            .await;

        match guarded {
            Ok(outcome) => Ok(outcome),
            Err(FlightwatchError::LockTimeout { waited, .. }) => {
                let waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX);
                warn!(key = %key, waited_ms, "gave up waiting for resolution lock");
                Ok(ResolutionOutcome::failed(
                    key.clone(),
                    StatusCode::LockTimeout,
                    ResolutionFailure::LockTimeout { waited_ms },
                    AttemptLog::default(),
                    self.clock.now(),
                ))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "lock unavailable, resolving unguarded");
                Ok(self.resolve_locked(key, options, before.as_ref()).await)
            }
        }
    }

    async fn enforce_rate_limits(
        &self,
        key: &ResolutionKey,
        options: &ResolveOptions,
    ) -> Option<ResolutionOutcome> {
        let identities: Vec<(RateLimitKind, &str)> = [
            (RateLimitKind::Ip, options.ip.as_deref()),
            (RateLimitKind::User, options.user_id.as_deref()),
        ]
        .into_iter()
        .filter_map(|(kind, id)| id.filter(|id| !id.is_empty()).map(|id| (kind, id)))
        .collect();

        for (kind, identifier) in &identities {
            match self.cache.check_rate_limit(identifier, *kind).await {
                Ok(status) if status.blocked => {
                    flightwatch_cache::recording::record_rate_limited(*kind);
                    return Some(ResolutionOutcome::failed(
                        key.clone(),
                        StatusCode::RateLimited,
                        ResolutionFailure::RateLimited {
                            limit_kind: *kind,
                            identifier: identifier.to_string(),
                            reset_at: status.reset_at,
                        },
                        AttemptLog::default(),
                        self.clock.now(),
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(kind = %kind, identifier, error = %e, "rate limit check failed, allowing request");
                }
            }
        }

        for (kind, identifier) in &identities {
            if let Err(e) = self.cache.increment_rate_limit(identifier, *kind).await {
                warn!(kind = %kind, identifier, error = %e, "rate limit increment failed");
            }
        }
        None
    }

    async fn resolve_locked(
        &self,
        key: &ResolutionKey,
        options: &ResolveOptions,
        before: Option<&CacheEntry>,
    ) -> ResolutionOutcome {
        match self.cache.peek(key).await {
            Ok(Some(entry)) if options.use_cache || before != Some(&entry) => {
                debug!(key = %key, "cache populated while waiting for lock");
                return entry.outcome.from_cache();
            }
            Ok(_) => {}
            Err(e) => warn!(key = %key, error = %e, "cache re-check failed"),
        }

        let outcome = self.resolver.resolve(key, options.airline.as_deref()).await;
        if outcome.success {
            if let Err(e) = self.cache.set(key, &outcome, None).await {
                warn!(key = %key, error = %e, "failed to cache resolution");
            }
            if options.record_history {
                if let Err(e) = self.cache.append_history(key, &outcome, None).await {
                    warn!(key = %key, error = %e, "failed to append history");
                }
            }
        }
        outcome
    }
}
