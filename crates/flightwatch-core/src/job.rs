// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Monitoring job model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::{ResolutionKey, ResolutionOutcome};

/// Lifecycle state of a monitoring job.
///
/// `Paused` is reserved; nothing transitions into or out of it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitoringStatus {
    Active,
    Paused,
    Stopped,
    Error,
}

/// Delivery channel requested for change notifications.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
    Webhook,
}

/// Conditions that end a job without an explicit stop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoStop {
    #[serde(default)]
    pub after_departure: bool,
    #[serde(default)]
    pub after_minutes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringOptions {
    /// Minutes between checks; the configured default when absent.
    #[serde(default)]
    pub interval_minutes: Option<u32>,
    #[serde(default = "default_true")]
    pub notify_on_change: bool,
    #[serde(default = "default_true")]
    pub notify_on_delay: bool,
    #[serde(default = "default_true")]
    pub notify_on_gate_change: bool,
    #[serde(default = "default_channels")]
    pub channels: Vec<NotificationChannel>,
    #[serde(default)]
    pub auto_stop: Option<AutoStop>,
}

fn default_true() -> bool {
    true
}

fn default_channels() -> Vec<NotificationChannel> {
    vec![NotificationChannel::Email]
}

impl Default for MonitoringOptions {
    fn default() -> Self {
        Self {
            interval_minutes: None,
            notify_on_change: default_true(),
            notify_on_delay: default_true(),
            notify_on_gate_change: default_true(),
            channels: default_channels(),
            auto_stop: None,
        }
    }
}

/// A supervised, recurring resolution task for one booking key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringJob {
    pub id: String,
    pub key: ResolutionKey,
    pub status: MonitoringStatus,
    pub interval_minutes: u32,
    pub started_at: DateTime<Utc>,
    pub last_check_at: Option<DateTime<Utc>>,
    pub next_check_at: Option<DateTime<Utc>>,
    pub checks_performed: u64,
    pub changes_detected: u64,
    pub current_snapshot: Option<ResolutionOutcome>,
    pub options: MonitoringOptions,
}

impl MonitoringJob {
    pub fn new(
        key: ResolutionKey,
        interval_minutes: u32,
        options: MonitoringOptions,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: key.id(),
            key,
            status: MonitoringStatus::Active,
            interval_minutes,
            started_at,
            last_check_at: None,
            next_check_at: Some(started_at + interval(interval_minutes)),
            checks_performed: 0,
            changes_detected: 0,
            current_snapshot: None,
            options,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MonitoringStatus::Active
    }

    /// Records a completed check at `now`.
    pub fn record_check(&mut self, now: DateTime<Utc>) {
        self.checks_performed += 1;
        self.last_check_at = Some(now);
        self.next_check_at = Some(now + interval(self.interval_minutes));
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.interval_minutes) * 60)
    }
}

fn interval(minutes: u32) -> chrono::Duration {
    chrono::Duration::minutes(i64::from(minutes))
}
