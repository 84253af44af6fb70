// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the cache, resolver, and monitoring layers.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::FlightwatchError;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of collaborator behind an adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Source,
    Store,
    Scheduler,
    EventSink,
}

/// Canonical identity of a booking: upper-cased, trimmed reference and surname.
///
/// Construct through [`ResolutionKey::new`] at the boundary; every internal
/// lookup (cache, lock, history, jobs) uses the canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolutionKey {
    booking_reference: String,
    last_name: String,
}

impl ResolutionKey {
    /// Normalizes and validates a raw booking reference and surname.
    pub fn new(booking_reference: &str, last_name: &str) -> Result<Self, FlightwatchError> {
        let booking_reference = booking_reference.trim().to_uppercase();
        let last_name = last_name.trim().to_uppercase();
        if booking_reference.is_empty() {
            return Err(FlightwatchError::InvalidKey(
                "booking reference must not be empty".into(),
            ));
        }
        if last_name.is_empty() {
            return Err(FlightwatchError::InvalidKey("last name must not be empty".into()));
        }
        if booking_reference.contains(':') || last_name.contains(':') {
            return Err(FlightwatchError::InvalidKey(
                "booking reference and last name must not contain ':'".into(),
            ));
        }
        Ok(Self {
            booking_reference,
            last_name,
        })
    }

    /// Parses a stored `"<REF>:<NAME>"` identifier.
    pub fn from_id(id: &str) -> Result<Self, FlightwatchError> {
        let (reference, name) = id
            .split_once(':')
            .ok_or_else(|| FlightwatchError::InvalidKey(format!("malformed key id: {id}")))?;
        Self::new(reference, name)
    }

    pub fn booking_reference(&self) -> &str {
        &self.booking_reference
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    /// The `"<REF>:<NAME>"` form used as storage key suffix and job id.
    pub fn id(&self) -> String {
        format!("{}:{}", self.booking_reference, self.last_name)
    }
}

impl fmt::Display for ResolutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.booking_reference, self.last_name)
    }
}

/// Operational state of a flight.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatus {
    Scheduled,
    Delayed,
    Cancelled,
    Boarding,
    Departed,
    Arrived,
    Diverted,
}

/// Departure or arrival leg of a flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightEndpoint {
    pub airport: String,
    pub scheduled_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_minutes: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passenger {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat: Option<String>,
}

/// Live flight data returned by a source layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightDetails {
    pub flight_number: String,
    pub airline_code: String,
    pub airline_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aircraft: Option<String>,
    pub status: FlightStatus,
    pub departure: FlightEndpoint,
    pub arrival: FlightEndpoint,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passengers: Vec<Passenger>,
    pub last_updated: DateTime<Utc>,
}

/// Facts about a booking that one layer can pass to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightHint {
    pub flight_number: Option<String>,
    pub date: Option<NaiveDate>,
    pub airline: Option<String>,
}

impl FlightHint {
    /// Extracts the reusable facts from full flight details.
    pub fn from_details(flight: &FlightDetails) -> Self {
        Self {
            flight_number: Some(flight.flight_number.clone()),
            date: Some(flight.departure.scheduled_time.date_naive()),
            airline: Some(flight.airline_code.clone()),
        }
    }

    /// Fills missing fields from `other`, keeping what is already known.
    pub fn merge(&mut self, other: FlightHint) {
        if self.flight_number.is_none() {
            self.flight_number = other.flight_number;
        }
        if self.date.is_none() {
            self.date = other.date;
        }
        if self.airline.is_none() {
            self.airline = other.airline;
        }
    }
}

/// Query handed to a source layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceQuery {
    /// Look up by reservation.
    Booking {
        booking_reference: String,
        last_name: String,
        airline: Option<String>,
    },
    /// Look up by operating flight and date.
    Flight {
        flight_number: String,
        date: NaiveDate,
        airline: Option<String>,
    },
}

/// The layer an outcome came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceLayer {
    Gds,
    ExternalApi,
    WebScraping,
    Cache,
    None,
}

impl SourceLayer {
    /// The three layers that query upstream data.
    pub const LIVE: [SourceLayer; 3] = [Self::Gds, Self::ExternalApi, Self::WebScraping];

    pub fn is_live(self) -> bool {
        Self::LIVE.contains(&self)
    }
}

/// Summary code of a resolution outcome.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Found,
    RateLimited,
    LockTimeout,
    FlightStatusUnavailable,
}

/// Result of invoking one layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerAttempt {
    pub tried: bool,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl LayerAttempt {
    pub fn succeeded(duration_ms: u64) -> Self {
        Self {
            tried: true,
            success: true,
            error: None,
            duration_ms,
        }
    }

    pub fn failed(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            tried: true,
            success: false,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

/// Per-layer record of one cascade run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptLog {
    pub gds: LayerAttempt,
    pub external_api: LayerAttempt,
    pub scraping: LayerAttempt,
    pub total_duration_ms: u64,
}

impl AttemptLog {
    pub fn layer(&self, layer: SourceLayer) -> Option<&LayerAttempt> {
        match layer {
            SourceLayer::Gds => Some(&self.gds),
            SourceLayer::ExternalApi => Some(&self.external_api),
            SourceLayer::WebScraping => Some(&self.scraping),
            SourceLayer::Cache | SourceLayer::None => None,
        }
    }

    pub fn layer_mut(&mut self, layer: SourceLayer) -> Option<&mut LayerAttempt> {
        match layer {
            SourceLayer::Gds => Some(&mut self.gds),
            SourceLayer::ExternalApi => Some(&mut self.external_api),
            SourceLayer::WebScraping => Some(&mut self.scraping),
            SourceLayer::Cache | SourceLayer::None => None,
        }
    }

    /// The live layer whose attempt succeeded, if any.
    pub fn successful_layer(&self) -> Option<SourceLayer> {
        SourceLayer::LIVE
            .into_iter()
            .find(|layer| self.layer(*layer).is_some_and(|a| a.success))
    }
}

/// Typed reason a resolution did not produce flight data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionFailure {
    RateLimited {
        limit_kind: RateLimitKind,
        identifier: String,
        reset_at: DateTime<Utc>,
    },
    LockTimeout {
        waited_ms: u64,
    },
    AllLayersFailed {
        retry_after_secs: u64,
        suggestion: String,
    },
}

/// Structured result of a resolution. Never absent, even on total failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub success: bool,
    pub key: ResolutionKey,
    pub flight: Option<FlightDetails>,
    pub status_code: StatusCode,
    pub source_layer: SourceLayer,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
    pub attempts: AttemptLog,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ResolutionFailure>,
}

impl ResolutionOutcome {
    /// A successful outcome from a live layer.
    pub fn found(
        key: ResolutionKey,
        flight: FlightDetails,
        layer: SourceLayer,
        attempts: AttemptLog,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            success: true,
            key,
            flight: Some(flight),
            status_code: StatusCode::Found,
            source_layer: layer,
            timestamp,
            error: None,
            attempts,
            failure: None,
        }
    }

    /// A failed outcome; no layer data is attached.
    pub fn failed(
        key: ResolutionKey,
        status_code: StatusCode,
        failure: ResolutionFailure,
        attempts: AttemptLog,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let error = match &failure {
            ResolutionFailure::RateLimited { reset_at, .. } => {
                format!("rate limit exceeded, resets at {reset_at}")
            }
            ResolutionFailure::LockTimeout { waited_ms } => {
                format!("another resolution for this booking is in progress (waited {waited_ms}ms)")
            }
            ResolutionFailure::AllLayersFailed { .. } => {
                "flight status unavailable from all sources".to_string()
            }
        };
        Self {
            success: false,
            key,
            flight: None,
            status_code,
            source_layer: SourceLayer::None,
            timestamp,
            error: Some(error),
            attempts,
            failure: Some(failure),
        }
    }

    /// Marks an outcome as served from the cache.
    pub fn from_cache(mut self) -> Self {
        self.source_layer = SourceLayer::Cache;
        self
    }

    /// Seconds the caller should wait before retrying, for total source failure.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match &self.failure {
            Some(ResolutionFailure::AllLayersFailed {
                retry_after_secs, ..
            }) => Some(*retry_after_secs),
            _ => None,
        }
    }
}

/// Cached successful outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: ResolutionKey,
    pub outcome: ResolutionOutcome,
    pub cached_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    pub attempt_count: u32,
}

impl CacheEntry {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.cached_at + chrono::Duration::seconds(self.ttl_seconds as i64)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// One entry of a key's resolution history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub outcome: ResolutionOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes_detected: Option<Vec<String>>,
}

/// What a rate-limit counter is keyed on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RateLimitKind {
    Ip,
    User,
}

/// Read-only view of a rate-limit counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub identifier: String,
    pub kind: RateLimitKind,
    pub blocked: bool,
    pub count: u64,
    pub limit: u64,
    pub remaining: u64,
    pub window_start: DateTime<Utc>,
    pub reset_at: DateTime<Utc>,
}

/// Aggregate hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn new(hits: u64, misses: u64) -> Self {
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };
        Self {
            hits,
            misses,
            hit_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn key_is_normalized() {
        let key = ResolutionKey::new("  abc123 ", "smith\t").unwrap();
        assert_eq!(key.booking_reference(), "ABC123");
        assert_eq!(key.last_name(), "SMITH");
        assert_eq!(key.id(), "ABC123:SMITH");
        assert_eq!(key, ResolutionKey::new("ABC123", "Smith").unwrap());
    }

    #[test]
    fn key_rejects_empty_and_separator() {
        assert!(matches!(
            ResolutionKey::new("  ", "smith"),
            Err(FlightwatchError::InvalidKey(_))
        ));
        assert!(matches!(
            ResolutionKey::new("ABC123", ""),
            Err(FlightwatchError::InvalidKey(_))
        ));
        assert!(ResolutionKey::new("AB:C", "SMITH").is_err());
    }

    #[test]
    fn key_id_parses_back() {
        let key = ResolutionKey::new("xy9", "o'neil").unwrap();
        assert_eq!(ResolutionKey::from_id(&key.id()).unwrap(), key);
        assert!(ResolutionKey::from_id("no-separator").is_err());
    }

    #[test]
    fn flight_status_wire_format() {
        assert_eq!(FlightStatus::Departed.to_string(), "DEPARTED");
        assert_eq!(
            FlightStatus::from_str("DIVERTED").unwrap(),
            FlightStatus::Diverted
        );
        let json = serde_json::to_string(&FlightStatus::Scheduled).unwrap();
        assert_eq!(json, "\"SCHEDULED\"");
    }

    #[test]
    fn source_layer_liveness() {
        assert!(SourceLayer::Gds.is_live());
        assert!(SourceLayer::WebScraping.is_live());
        assert!(!SourceLayer::Cache.is_live());
        assert!(!SourceLayer::None.is_live());
        assert_eq!(SourceLayer::ExternalApi.to_string(), "EXTERNAL_API");
    }

    #[test]
    fn failed_outcome_has_no_layer() {
        let key = ResolutionKey::new("ABC123", "SMITH").unwrap();
        let outcome = ResolutionOutcome::failed(
            key,
            StatusCode::FlightStatusUnavailable,
            ResolutionFailure::AllLayersFailed {
                retry_after_secs: 300,
                suggestion: "try later".into(),
            },
            AttemptLog::default(),
            Utc::now(),
        );
        assert!(!outcome.success);
        assert_eq!(outcome.source_layer, SourceLayer::None);
        assert_eq!(outcome.retry_after_secs(), Some(300));
        assert!(outcome.flight.is_none());
    }

    #[test]
    fn attempt_log_reports_successful_layer() {
        let mut log = AttemptLog::default();
        log.gds = LayerAttempt::failed("timeout", 12);
        log.external_api = LayerAttempt::succeeded(40);
        assert_eq!(log.successful_layer(), Some(SourceLayer::ExternalApi));
        assert!(log.layer(SourceLayer::Cache).is_none());
    }

    #[test]
    fn hint_merge_keeps_known_fields() {
        let mut hint = FlightHint {
            flight_number: Some("LH400".into()),
            date: None,
            airline: None,
        };
        hint.merge(FlightHint {
            flight_number: Some("XX1".into()),
            date: NaiveDate::from_ymd_opt(2026, 3, 1),
            airline: Some("LH".into()),
        });
        assert_eq!(hint.flight_number.as_deref(), Some("LH400"));
        assert_eq!(hint.airline.as_deref(), Some("LH"));
        assert!(hint.date.is_some());
    }

    #[test]
    fn cache_stats_hit_rate() {
        assert_eq!(CacheStats::new(0, 0).hit_rate, 0.0);
        assert_eq!(CacheStats::new(3, 1).hit_rate, 0.75);
    }

    #[test]
    fn rate_limit_kind_display() {
        assert_eq!(RateLimitKind::Ip.to_string(), "ip");
        assert_eq!(RateLimitKind::from_str("user").unwrap(), RateLimitKind::User);
    }

    proptest::proptest! {
        #[test]
        fn key_normalization_is_idempotent(reference in "[a-zA-Z0-9 ]{1,8}", name in "[a-zA-Z' -]{1,12}") {
            if let Ok(key) = ResolutionKey::new(&reference, &name) {
                let again = ResolutionKey::new(key.booking_reference(), key.last_name()).unwrap();
                proptest::prop_assert_eq!(&again, &key);
                proptest::prop_assert_eq!(ResolutionKey::from_id(&key.id()).unwrap(), key);
            }
        }
    }
}
