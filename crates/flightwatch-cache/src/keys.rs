// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage key layout.

use flightwatch_core::{RateLimitKind, ResolutionKey};

pub const CACHE_PREFIX: &str = "flight:";
pub const HISTORY_PREFIX: &str = "history:flight:";
pub const LOCK_PREFIX: &str = "lock:flight:";
pub const RATE_LIMIT_PREFIX: &str = "ratelimit:";
pub const MONITOR_PREFIX: &str = "monitor:";
pub const STATS_HITS: &str = "stats:cache:hits";
pub const STATS_MISSES: &str = "stats:cache:misses";

pub fn cache(key: &ResolutionKey) -> String {
    format!("{CACHE_PREFIX}{key}")
}

pub fn history(key: &ResolutionKey) -> String {
    format!("{HISTORY_PREFIX}{key}")
}

pub fn lock(key: &ResolutionKey) -> String {
    format!("{LOCK_PREFIX}{key}")
}

pub fn rate_limit(kind: RateLimitKind, identifier: &str) -> String {
    format!("{RATE_LIMIT_PREFIX}{kind}:{identifier}")
}

pub fn monitor(key: &ResolutionKey) -> String {
    format!("{MONITOR_PREFIX}{key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let key = ResolutionKey::new("abc123", "smith").unwrap();
        assert_eq!(cache(&key), "flight:ABC123:SMITH");
        assert_eq!(history(&key), "history:flight:ABC123:SMITH");
        assert_eq!(lock(&key), "lock:flight:ABC123:SMITH");
        assert_eq!(monitor(&key), "monitor:ABC123:SMITH");
        assert_eq!(rate_limit(RateLimitKind::Ip, "10.0.0.1"), "ratelimit:ip:10.0.0.1");
    }
}
