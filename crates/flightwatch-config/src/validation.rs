// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::{FlightwatchConfig, StorageBackendKind};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation instead of stopping at the first.
pub fn validate_config(config: &FlightwatchConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        invalid(format!(
            "service.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.service.log_level
        ));
    }

    if config.cache.ttl_secs == 0 {
        invalid("cache.ttl_secs must be greater than 0".to_string());
    }
    if config.cache.history_max_entries == 0 {
        invalid("cache.history_max_entries must be greater than 0".to_string());
    }
    if config.cache.history_ttl_days == 0 {
        invalid("cache.history_ttl_days must be greater than 0".to_string());
    }

    if config.lock.lease_secs == 0 {
        invalid("lock.lease_secs must be greater than 0".to_string());
    }
    if config.lock.poll_interval_ms == 0 {
        invalid("lock.poll_interval_ms must be greater than 0".to_string());
    }
    if config.lock.max_wait_secs.saturating_mul(1000) < config.lock.poll_interval_ms {
        invalid(format!(
            "lock.max_wait_secs ({}s) must be at least lock.poll_interval_ms ({}ms)",
            config.lock.max_wait_secs, config.lock.poll_interval_ms
        ));
    }

    if config.rate_limit.enabled {
        if config.rate_limit.window_secs == 0 {
            invalid("rate_limit.window_secs must be greater than 0".to_string());
        }
        if config.rate_limit.max_requests == 0 {
            invalid("rate_limit.max_requests must be greater than 0".to_string());
        }
    }

    if config.resolver.layer_timeout_secs == 0 {
        invalid("resolver.layer_timeout_secs must be greater than 0".to_string());
    }

    let monitor = &config.monitor;
    if monitor.min_interval_minutes == 0 {
        invalid("monitor.min_interval_minutes must be greater than 0".to_string());
    }
    if monitor.min_interval_minutes > monitor.max_interval_minutes {
        invalid(format!(
            "monitor.min_interval_minutes ({}) must not exceed monitor.max_interval_minutes ({})",
            monitor.min_interval_minutes, monitor.max_interval_minutes
        ));
    } else if !(monitor.min_interval_minutes..=monitor.max_interval_minutes)
        .contains(&monitor.default_interval_minutes)
    {
        invalid(format!(
            "monitor.default_interval_minutes ({}) must lie within [{}, {}]",
            monitor.default_interval_minutes,
            monitor.min_interval_minutes,
            monitor.max_interval_minutes
        ));
    }
    if monitor.event_buffer == 0 {
        invalid("monitor.event_buffer must be greater than 0".to_string());
    }

    if config.storage.backend == StorageBackendKind::Sqlite
        && config.storage.database_path.trim().is_empty()
    {
        invalid("storage.database_path must not be empty for the sqlite backend".to_string());
    }
    if config.storage.purge_interval_secs == 0 {
        invalid("storage.purge_interval_secs must be greater than 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&FlightwatchConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = FlightwatchConfig::default();
        config.cache.ttl_secs = 0;
        config.lock.lease_secs = 0;
        config.rate_limit.max_requests = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn disabled_rate_limit_skips_its_checks() {
        let mut config = FlightwatchConfig::default();
        config.rate_limit.enabled = false;
        config.rate_limit.max_requests = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn default_interval_out_of_range() {
        let mut config = FlightwatchConfig::default();
        config.monitor.default_interval_minutes = 2000;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("default_interval_minutes"));
    }

    #[test]
    fn huge_max_wait_does_not_overflow() {
        let mut config = FlightwatchConfig::default();
        config.lock.max_wait_secs = u64::MAX;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn purge_interval_must_be_positive() {
        let mut config = FlightwatchConfig::default();
        config.storage.purge_interval_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("purge_interval_secs"));
    }

    #[test]
    fn sqlite_requires_path() {
        let mut config = FlightwatchConfig::default();
        config.storage.backend = StorageBackendKind::Sqlite;
        config.storage.database_path = "  ".into();
        assert!(validate_config(&config).is_err());
    }
}
