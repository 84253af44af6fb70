// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process key-value backend built on `DashMap`.
//!
//! Compare-and-set operations go through the map's entry API, so they are
//! atomic across tasks of one process. Expired keys are evicted lazily on
//! access and in bulk by `purge_expired`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use flightwatch_core::{
    AdapterType, Clock, FlightwatchError, HealthStatus, PluginAdapter, StoreBackend, SystemClock,
};

use crate::expiry_after;

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Slot {
    fn live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

fn wrong_type(key: &str) -> FlightwatchError {
    FlightwatchError::storage(format!("value at `{key}` has the wrong type"))
}

/// Process-local [`StoreBackend`].
pub struct MemoryBackend {
    entries: DashMap<String, Slot>,
    clock: Arc<dyn Clock>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of stored keys, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live slot for `key`, evicting it if expired.
    fn read(&self, key: &str) -> Option<Slot> {
        let now = self.clock.now();
        let snapshot = self
            .entries
            .get(key)
            .map(|slot| slot.live(now).then(|| slot.value().clone()));
        match snapshot {
            Some(Some(slot)) => Some(slot),
            Some(None) => {
                self.entries.remove_if(key, |_, slot| !slot.live(now));
                None
            }
            None => None,
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, FlightwatchError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FlightwatchError> {
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, FlightwatchError> {
        match self.read(key) {
            Some(Slot {
                value: Value::Text(text),
                ..
            }) => Ok(Some(text)),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), FlightwatchError> {
        let now = self.clock.now();
        self.entries.insert(
            key.to_string(),
            Slot {
                value: Value::Text(value.to_string()),
                expires_at: ttl.map(|ttl| expiry_after(now, ttl)),
            },
        );
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, FlightwatchError> {
        let now = self.clock.now();
        let slot = Slot {
            value: Value::Text(value.to_string()),
            expires_at: Some(expiry_after(now, ttl)),
        };
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().live(now) {
                    Ok(false)
                } else {
                    occupied.insert(slot);
                    Ok(true)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
                Ok(true)
            }
        }
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, FlightwatchError> {
        let now = self.clock.now();
        let slot = Slot {
            value: Value::Text(value.to_string()),
            expires_at: ttl.map(|ttl| expiry_after(now, ttl)),
        };
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get();
                let matches = match (current.live(now), &current.value, expected) {
                    (false, _, None) => true,
                    (true, Value::Text(text), Some(expected)) => text == expected,
                    _ => false,
                };
                if matches {
                    occupied.insert(slot);
                }
                Ok(matches)
            }
            Entry::Vacant(vacant) => {
                if expected.is_some() {
                    return Ok(false);
                }
                vacant.insert(slot);
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, FlightwatchError> {
        let now = self.clock.now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, slot)| slot.live(now)))
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, FlightwatchError> {
        let now = self.clock.now();
        let removed = self.entries.remove_if(key, |_, slot| {
            slot.live(now) && matches!(&slot.value, Value::Text(current) if current == expected)
        });
        Ok(removed.is_some())
    }

    async fn incr(&self, key: &str, ttl_on_create: Duration) -> Result<u64, FlightwatchError> {
        let now = self.clock.now();
        let fresh = || Slot {
            value: Value::Text("1".to_string()),
            expires_at: Some(expiry_after(now, ttl_on_create)),
        };
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().live(now) {
                    occupied.insert(fresh());
                    return Ok(1);
                }
                let slot = occupied.get_mut();
                let Value::Text(text) = &mut slot.value else {
                    return Err(wrong_type(key));
                };
                let next = text
                    .parse::<u64>()
                    .map_err(|_| wrong_type(key))?
                    .saturating_add(1);
                *text = next.to_string();
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh());
                Ok(1)
            }
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, FlightwatchError> {
        let now = self.clock.now();
        Ok(self
            .read(key)
            .and_then(|slot| slot.expires_at)
            .and_then(|at| (at - now).to_std().ok()))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, FlightwatchError> {
        let now = self.clock.now();
        match self.entries.get_mut(key) {
            Some(mut slot) if slot.live(now) => {
                slot.expires_at = Some(expiry_after(now, ttl));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn push_front_trim(
        &self,
        key: &str,
        value: &str,
        max_len: usize,
        ttl: Duration,
    ) -> Result<(), FlightwatchError> {
        let now = self.clock.now();
        let expires_at = Some(expiry_after(now, ttl));
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) if occupied.get().live(now) => {
                let slot = occupied.get_mut();
                let Value::List(items) = &mut slot.value else {
                    return Err(wrong_type(key));
                };
                items.push_front(value.to_string());
                items.truncate(max_len);
                slot.expires_at = expires_at;
            }
            Entry::Occupied(mut occupied) => {
                occupied.insert(Slot {
                    value: Value::List(VecDeque::from([value.to_string()])),
                    expires_at,
                });
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    value: Value::List(VecDeque::from([value.to_string()])),
                    expires_at,
                });
            }
        }
        Ok(())
    }

    async fn list_range(&self, key: &str, limit: usize) -> Result<Vec<String>, FlightwatchError> {
        match self.read(key) {
            Some(Slot {
                value: Value::List(items),
                ..
            }) => Ok(items.into_iter().take(limit).collect()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, FlightwatchError> {
        let now = self.clock.now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && entry.value().live(now))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn purge_expired(&self) -> Result<usize, FlightwatchError> {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, slot| slot.live(now));
        Ok(before.saturating_sub(self.entries.len()))
    }
}
