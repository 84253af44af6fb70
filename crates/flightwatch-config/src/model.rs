// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Flightwatch.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Flightwatch configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FlightwatchConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Result cache and history settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Resolution lock settings.
    #[serde(default)]
    pub lock: LockConfig,

    /// Per-ip and per-user request limits.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Source cascade settings.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Monitoring job settings.
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Backing store settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "flightwatch".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Result cache and history configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Lifetime of a cached resolution in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum history records kept per booking.
    #[serde(default = "default_history_max_entries")]
    pub history_max_entries: usize,

    /// Days a booking's history survives after its last append.
    #[serde(default = "default_history_ttl_days")]
    pub history_ttl_days: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            history_max_entries: default_history_max_entries(),
            history_ttl_days: default_history_ttl_days(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    900
}

fn default_history_max_entries() -> usize {
    100
}

fn default_history_ttl_days() -> u64 {
    30
}

/// Resolution lock configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    /// Lease after which an unreleased lock expires.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,

    /// Longest a caller waits to acquire a lock.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Retry cadence while waiting.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_secs: default_lease_secs(),
            max_wait_secs: default_max_wait_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_lease_secs() -> u64 {
    30
}

fn default_max_wait_secs() -> u64 {
    45
}

fn default_poll_interval_ms() -> u64 {
    100
}

/// Request rate limit configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Requests allowed per identifier per window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_requests() -> u64 {
    10
}

/// Source cascade configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// Upper bound on a single layer invocation.
    #[serde(default = "default_layer_timeout_secs")]
    pub layer_timeout_secs: u64,

    /// Retry hint returned when every layer fails.
    #[serde(default = "default_retry_after_secs")]
    pub retry_after_secs: u64,

    /// Suggestion text returned when every layer fails.
    #[serde(default = "default_suggestion")]
    pub suggestion: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            layer_timeout_secs: default_layer_timeout_secs(),
            retry_after_secs: default_retry_after_secs(),
            suggestion: default_suggestion(),
        }
    }
}

fn default_layer_timeout_secs() -> u64 {
    30
}

fn default_retry_after_secs() -> u64 {
    300
}

fn default_suggestion() -> String {
    "Check the booking reference and surname, or contact the airline directly.".to_string()
}

/// Monitoring job configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    #[serde(default = "default_interval_minutes")]
    pub default_interval_minutes: u32,

    #[serde(default = "default_min_interval_minutes")]
    pub min_interval_minutes: u32,

    #[serde(default = "default_max_interval_minutes")]
    pub max_interval_minutes: u32,

    /// Arm an in-process timer next to the external scheduler.
    #[serde(default = "default_true")]
    pub local_timer: bool,

    /// Capacity of the monitoring event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            default_interval_minutes: default_interval_minutes(),
            min_interval_minutes: default_min_interval_minutes(),
            max_interval_minutes: default_max_interval_minutes(),
            local_timer: default_true(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_interval_minutes() -> u32 {
    15
}

fn default_min_interval_minutes() -> u32 {
    1
}

fn default_max_interval_minutes() -> u32 {
    1440
}

fn default_event_buffer() -> usize {
    256
}

/// Which backing store to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// Process-local store; locks only exclude callers inside this process.
    #[default]
    Memory,
    /// SQLite file shared by every process pointing at it.
    Sqlite,
}

/// Backing store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,

    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// How often `serve` drops expired keys from the store.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            database_path: default_database_path(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

fn default_purge_interval_secs() -> u64 {
    300
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("flightwatch").join("flightwatch.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("flightwatch.db"))
        .to_string_lossy()
        .into_owned()
}
