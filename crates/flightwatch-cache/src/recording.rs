// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers for the storage-facing layer.
//!
//! Uses the metrics-rs facade so any installed recorder can collect them.

use flightwatch_core::RateLimitKind;
use metrics::describe_counter;

pub fn register_metrics() {
    describe_counter!("flightwatch_cache_hits_total", "Resolutions served from cache");
    describe_counter!("flightwatch_cache_misses_total", "Cache lookups that missed");
    describe_counter!(
        "flightwatch_rate_limited_total",
        "Requests blocked by a rate limit"
    );
    describe_counter!(
        "flightwatch_lock_timeouts_total",
        "Callers that gave up waiting for a resolution lock"
    );
    describe_counter!(
        "flightwatch_storage_errors_total",
        "Backing store failures absorbed by a degraded path"
    );
}

pub fn record_cache_hit() {
    metrics::counter!("flightwatch_cache_hits_total").increment(1);
}

pub fn record_cache_miss() {
    metrics::counter!("flightwatch_cache_misses_total").increment(1);
}

pub fn record_rate_limited(kind: RateLimitKind) {
    metrics::counter!("flightwatch_rate_limited_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_lock_timeout() {
    metrics::counter!("flightwatch_lock_timeouts_total").increment(1);
}

pub fn record_storage_error(operation: &'static str) {
    metrics::counter!("flightwatch_storage_errors_total", "operation" => operation).increment(1);
}
