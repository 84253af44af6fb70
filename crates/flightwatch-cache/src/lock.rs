// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lease-based mutual exclusion per resolution key.
//!
//! A lock is a `lock:flight:<KEY>` value holding a [`LockRecord`]. Acquisition
//! is `set_if_absent` with the lease as TTL, so a crashed holder's lock
//! disappears once the lease runs out. While `execute_with_lock` runs its
//! operation the lease is renewed every third of its length, so a slow
//! operation keeps the lock. Release deletes the value only if it still holds
//! this holder's record.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

use flightwatch_config::model::LockConfig;
use flightwatch_core::{Clock, FlightwatchError, ResolutionKey, StoreBackend};

use crate::{keys, recording};

/// Stored value of a held lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub key: ResolutionKey,
    pub holder_token: String,
    pub acquired_at: DateTime<Utc>,
    pub lease_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Lease after which an unreleased lock expires on its own.
    pub lease: Duration,
    /// Longest `acquire` keeps retrying before giving up.
    pub max_wait: Duration,
}

impl LockOptions {
    pub fn from_config(config: &LockConfig) -> Self {
        Self {
            lease: Duration::from_secs(config.lease_secs),
            max_wait: Duration::from_secs(config.max_wait_secs),
        }
    }
}

pub struct DistributedLock {
    backend: Arc<dyn StoreBackend>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    defaults: LockOptions,
}

impl DistributedLock {
    pub fn new(backend: Arc<dyn StoreBackend>, clock: Arc<dyn Clock>, config: &LockConfig) -> Self {
        Self {
            backend,
            clock,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            defaults: LockOptions::from_config(config),
        }
    }

    pub fn default_options(&self) -> LockOptions {
        self.defaults
    }

    /// One acquisition attempt.
    pub async fn try_acquire(
        &self,
        key: &ResolutionKey,
        lease: Duration,
    ) -> Result<Option<LockLease>, FlightwatchError> {
        let record = LockRecord {
            key: key.clone(),
            holder_token: Uuid::new_v4().to_string(),
            acquired_at: self.clock.now(),
            lease_seconds: lease.as_secs(),
        };
        let value = serde_json::to_string(&record)?;
        let storage_key = keys::lock(key);
        if self.backend.set_if_absent(&storage_key, &value, lease).await? {
            debug!(key = %key, token = %record.holder_token, "lock acquired");
            Ok(Some(LockLease {
                backend: Arc::clone(&self.backend),
                storage_key,
                value,
                record,
                released: false,
            }))
        } else {
            Ok(None)
        }
    }

    /// Retries at the poll interval until acquired or `max_wait` elapses.
    pub async fn acquire(
        &self,
        key: &ResolutionKey,
        options: LockOptions,
    ) -> Result<LockLease, FlightwatchError> {
        let started = Instant::now();
        loop {
            if let Some(lease) = self.try_acquire(key, options.lease).await? {
                return Ok(lease);
            }
            let waited = started.elapsed();
            if waited >= options.max_wait {
                warn!(key = %key, waited_ms = waited.as_millis() as u64, "lock wait exhausted");
                recording::record_lock_timeout();
                return Err(FlightwatchError::LockTimeout {
                    key: key.id(),
                    waited,
                });
            }
            tokio::time::sleep(self.poll_interval.min(options.max_wait - waited)).await;
        }
    }

    /// Runs `operation` while holding the lock for `key`, releasing it afterwards.
    ///
    /// The lease is renewed while `operation` runs. The lock is released
    /// whether `operation` returns, fails, or is dropped mid-flight.
    pub async fn execute_with_lock<F, Fut, T>(
        &self,
        key: &ResolutionKey,
        options: LockOptions,
        operation: F,
    ) -> Result<T, FlightwatchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lease = self.acquire(key, options).await?;
        let every = (options.lease / 3).max(Duration::from_millis(10));
        let mut renewal = tokio::time::interval_at(Instant::now() + every, every);
        renewal.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let op = operation();
        tokio::pin!(op);
        let output = loop {
            tokio::select! {
                biased;
                out = &mut op => break out,
                _ = renewal.tick() => match lease.renew(options.lease).await {
                    Ok(true) => {}
                    Ok(false) => warn!(key = %key, "lock lease lost while operation was running"),
                    Err(e) => {
                        warn!(key = %key, error = %e, "lock renewal failed");
                        recording::record_storage_error("lock_renew");
                    }
                },
            }
        };
        if let Err(e) = lease.release().await {
            warn!(key = %key, error = %e, "lock release failed, lease will expire");
            recording::record_storage_error("lock_release");
        }
        Ok(output)
    }

    /// Whether any holder currently owns the lock for `key`.
    pub async fn is_locked(&self, key: &ResolutionKey) -> Result<bool, FlightwatchError> {
        Ok(self.backend.get(&keys::lock(key)).await?.is_some())
    }

    /// The current holder's record, if locked.
    pub async fn holder(&self, key: &ResolutionKey) -> Result<Option<LockRecord>, FlightwatchError> {
        match self.backend.get(&keys::lock(key)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

/// A held lock. Dropping it without [`LockLease::release`] schedules a
/// background release on the current runtime.
pub struct LockLease {
    backend: Arc<dyn StoreBackend>,
    storage_key: String,
    value: String,
    record: LockRecord,
    released: bool,
}

impl LockLease {
    pub fn token(&self) -> &str {
        &self.record.holder_token
    }

    pub fn record(&self) -> &LockRecord {
        &self.record
    }

    /// Extends the lease to `lease` from now if this holder still owns the lock.
    pub async fn renew(&self, lease: Duration) -> Result<bool, FlightwatchError> {
        self.backend
            .compare_and_set(&self.storage_key, Some(&self.value), &self.value, Some(lease))
            .await
    }

    /// Releases the lock if this holder still owns it. Returns whether it did.
    pub async fn release(mut self) -> Result<bool, FlightwatchError> {
        self.released = true;
        let released = self
            .backend
            .delete_if_equals(&self.storage_key, &self.value)
            .await?;
        if released {
            debug!(key = %self.record.key, "lock released");
        } else {
            warn!(key = %self.record.key, "lock lease expired before release");
        }
        Ok(released)
    }
}

impl Drop for LockLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        let storage_key = std::mem::take(&mut self.storage_key);
        let value = std::mem::take(&mut self.value);
        handle.spawn(async move {
            if let Err(e) = backend.delete_if_equals(&storage_key, &value).await {
                warn!(key = %storage_key, error = %e, "background lock release failed");
            }
        });
    }
}
