// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./flightwatch.toml` > `~/.config/flightwatch/flightwatch.toml` >
//! `/etc/flightwatch/flightwatch.toml` with environment variable overrides via `FLIGHTWATCH_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::FlightwatchConfig;

/// Config sections, longest first so `rate_limit_` wins over shorter prefixes.
const SECTIONS: &[&str] = &[
    "rate_limit",
    "resolver",
    "service",
    "storage",
    "monitor",
    "cache",
    "lock",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/flightwatch/flightwatch.toml` (system-wide)
/// 3. `~/.config/flightwatch/flightwatch.toml` (user XDG config)
/// 4. `./flightwatch.toml` (local directory)
/// 5. `FLIGHTWATCH_*` environment variables
pub fn load_config() -> Result<FlightwatchConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<FlightwatchConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FlightwatchConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<FlightwatchConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FlightwatchConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(FlightwatchConfig::default()))
        .merge(Toml::file("/etc/flightwatch/flightwatch.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("flightwatch/flightwatch.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("flightwatch.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `FLIGHTWATCH_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because both section and
/// key names contain underscores (`FLIGHTWATCH_RATE_LIMIT_MAX_REQUESTS`
/// must land on `rate_limit.max_requests`).
fn env_provider() -> Env {
    Env::prefixed("FLIGHTWATCH_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
