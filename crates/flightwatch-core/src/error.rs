// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for flight status resolution and monitoring.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{FlightHint, RateLimitKind};

/// The primary error type used across all Flightwatch traits and core operations.
#[derive(Debug, Error)]
pub enum FlightwatchError {
    /// The caller exceeded its request quota and must wait until `reset_at`.
    #[error("rate limited ({kind} {identifier}) until {reset_at}")]
    RateLimited {
        kind: RateLimitKind,
        identifier: String,
        reset_at: DateTime<Utc>,
    },

    /// The resolution lock for a key could not be acquired within the wait budget.
    #[error("timed out waiting {waited:?} for lock on {key}")]
    LockTimeout {
        key: String,
        waited: std::time::Duration,
    },

    /// Every configured source layer failed.
    #[error("all source layers failed, retry after {retry_after_secs}s")]
    AllLayersFailed {
        retry_after_secs: u64,
        suggestion: String,
    },

    /// The backing key-value store failed or could not be reached.
    #[error("storage unavailable: {source}")]
    StorageUnavailable {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A monitoring job for this key is already active.
    #[error("already monitoring {job_id}")]
    AlreadyMonitoring { job_id: String },

    /// No monitoring job exists for this key.
    #[error("monitoring job not found: {job_id}")]
    JobNotFound { job_id: String },

    /// Booking reference or surname is empty or malformed.
    #[error("invalid resolution key: {0}")]
    InvalidKey(String),

    /// Monitoring options are outside the accepted range.
    #[error("invalid monitoring options: {0}")]
    InvalidOptions(String),

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The external recurring-job facility rejected a request.
    #[error("scheduler error: {message}")]
    Scheduler { message: String },

    /// Configuration errors detected while wiring components.
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FlightwatchError {
    /// Wraps any backend error as [`FlightwatchError::StorageUnavailable`].
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::StorageUnavailable {
            source: source.into(),
        }
    }

    /// Returns true for failures that are safe to retry unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout { .. } | Self::StorageUnavailable { .. } | Self::Timeout { .. }
        )
    }

    /// Returns true if the error came from the backing store.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }
}

impl From<serde_json::Error> for FlightwatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Failure reported by a single source layer.
///
/// A layer may have learned something useful before failing (for example a
/// reservation system that knows the flight number but has no live status).
/// Such facts travel in `partial` and feed the next layer's query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SourceError {
    pub message: String,
    pub partial: Option<FlightHint>,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            partial: None,
        }
    }

    /// Attaches facts extracted before the failure.
    pub fn with_partial(mut self, hint: FlightHint) -> Self {
        self.partial = Some(hint);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(
            FlightwatchError::LockTimeout {
                key: "ABC123:SMITH".into(),
                waited: std::time::Duration::from_secs(45),
            }
            .is_transient()
        );
        assert!(FlightwatchError::storage(std::io::Error::other("down")).is_transient());
        assert!(!FlightwatchError::InvalidKey("empty".into()).is_transient());
        assert!(
            !FlightwatchError::AlreadyMonitoring {
                job_id: "ABC123:SMITH".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn storage_errors_are_flagged() {
        let err = FlightwatchError::storage(std::io::Error::other("connection refused"));
        assert!(err.is_storage());
        assert_eq!(err.to_string(), "storage unavailable: connection refused");
    }

    #[test]
    fn source_error_carries_partial_hint() {
        let err = SourceError::new("no live status").with_partial(FlightHint {
            flight_number: Some("BA117".into()),
            date: None,
            airline: Some("BA".into()),
        });
        assert_eq!(err.to_string(), "no live status");
        assert_eq!(
            err.partial.and_then(|h| h.flight_number).as_deref(),
            Some("BA117")
        );
    }
}
