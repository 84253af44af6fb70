// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolver metrics.

use flightwatch_core::SourceLayer;
use metrics::{describe_counter, describe_histogram};

pub fn register_metrics() {
    describe_counter!(
        "flightwatch_resolutions_total",
        "Completed resolutions by the layer that answered"
    );
    describe_counter!(
        "flightwatch_layer_failures_total",
        "Failed source layer attempts"
    );
    describe_histogram!(
        "flightwatch_layer_latency_seconds",
        "Source layer latency in seconds"
    );
}

pub fn record_resolution(layer: SourceLayer) {
    metrics::counter!("flightwatch_resolutions_total", "layer" => layer.to_string()).increment(1);
}

pub fn record_layer_attempt(layer: SourceLayer, success: bool, duration_ms: u64) {
    metrics::histogram!("flightwatch_layer_latency_seconds", "layer" => layer.to_string())
        .record(duration_ms as f64 / 1000.0);
    if !success {
        metrics::counter!("flightwatch_layer_failures_total", "layer" => layer.to_string())
            .increment(1);
    }
}
