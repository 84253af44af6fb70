// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Flightwatch.
//!
//! This crate provides the collaborator traits, error taxonomy, and domain
//! types shared by the cache, resolver, and monitoring crates.

pub mod error;
pub mod events;
pub mod job;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{FlightwatchError, SourceError};
pub use events::{MonitorEvent, NotificationRequest, StopReason};
pub use job::{AutoStop, MonitoringJob, MonitoringOptions, MonitoringStatus, NotificationChannel};
pub use types::{
    AdapterType, AttemptLog, CacheEntry, CacheStats, FlightDetails, FlightEndpoint, FlightHint,
    FlightStatus, HealthStatus, HistoryRecord, LayerAttempt, Passenger, RateLimitKind,
    RateLimitStatus, ResolutionFailure, ResolutionKey, ResolutionOutcome, SourceLayer,
    SourceQuery, StatusCode,
};

pub use traits::{
    CheckPayload, Clock, EventSink, FlightSource, JobScheduler, ManualClock, PluginAdapter,
    StoreBackend, SystemClock,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flightwatch_error_has_all_variants() {
        let _rate = FlightwatchError::RateLimited {
            kind: RateLimitKind::Ip,
            identifier: "10.0.0.1".into(),
            reset_at: chrono::Utc::now(),
        };
        let _lock = FlightwatchError::LockTimeout {
            key: "ABC123:SMITH".into(),
            waited: std::time::Duration::from_secs(45),
        };
        let _all = FlightwatchError::AllLayersFailed {
            retry_after_secs: 300,
            suggestion: "later".into(),
        };
        let _storage = FlightwatchError::storage(std::io::Error::other("test"));
        let _already = FlightwatchError::AlreadyMonitoring {
            job_id: "ABC123:SMITH".into(),
        };
        let _missing = FlightwatchError::JobNotFound {
            job_id: "ABC123:SMITH".into(),
        };
        let _key = FlightwatchError::InvalidKey("test".into());
        let _options = FlightwatchError::InvalidOptions("test".into());
        let _serde = FlightwatchError::Serialization("test".into());
        let _sched = FlightwatchError::Scheduler {
            message: "test".into(),
        };
        let _config = FlightwatchError::Config("test".into());
        let _timeout = FlightwatchError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = FlightwatchError::Internal("test".into());
    }

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        let variants = [
            AdapterType::Source,
            AdapterType::Store,
            AdapterType::Scheduler,
            AdapterType::EventSink,
        ];
        for variant in &variants {
            let s = variant.to_string();
            let parsed = AdapterType::from_str(&s).expect("should parse back");
            assert_eq!(*variant, parsed);
        }
    }

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_source<T: FlightSource>() {}
        fn _assert_store<T: StoreBackend>() {}
        fn _assert_scheduler<T: JobScheduler>() {}
        fn _assert_sink<T: EventSink>() {}
        fn _assert_clock<T: Clock>() {}
    }
}
