// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value backend trait behind the cache, lock, history and rate limits.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FlightwatchError;
use crate::traits::adapter::PluginAdapter;

/// Shared key-value store with TTL and list operations.
///
/// Expired keys must never be returned. Conditional operations
/// (`set_if_absent`, `compare_and_set`, `delete_if_equals`, `incr`) are
/// atomic with respect to every other client of the same store.
#[async_trait]
pub trait StoreBackend: PluginAdapter {
    async fn get(&self, key: &str) -> Result<Option<String>, FlightwatchError>;

    /// Overwrites `key`; `None` means no expiry.
    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), FlightwatchError>;

    /// Stores `value` only if `key` is absent or expired. Returns whether it was stored.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, FlightwatchError>;

    /// Writes `value` only if `key` currently holds `expected`, where `None`
    /// means absent or expired. Returns whether the write happened.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, FlightwatchError>;

    /// Removes `key`. Returns whether a live value existed.
    async fn delete(&self, key: &str) -> Result<bool, FlightwatchError>;

    /// Removes `key` only if it currently holds `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, FlightwatchError>;

    /// Increments an integer counter, creating it with `ttl_on_create` when absent.
    async fn incr(&self, key: &str, ttl_on_create: Duration) -> Result<u64, FlightwatchError>;

    /// Remaining lifetime of `key`; `None` if absent or without expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, FlightwatchError>;

    /// Sets the expiry of an existing key. Returns whether the key existed.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, FlightwatchError>;

    /// Pushes onto the front of a list, trims it to `max_len`, and refreshes its TTL.
    async fn push_front_trim(
        &self,
        key: &str,
        value: &str,
        max_len: usize,
        ttl: Duration,
    ) -> Result<(), FlightwatchError>;

    /// Up to `limit` list items, front (newest) first.
    async fn list_range(&self, key: &str, limit: usize) -> Result<Vec<String>, FlightwatchError>;

    /// All live keys starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, FlightwatchError>;

    /// Drops every expired key. Returns how many entries were removed.
    async fn purge_expired(&self) -> Result<usize, FlightwatchError>;
}
