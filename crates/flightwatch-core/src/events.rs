// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events raised by the monitoring engine for downstream delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::{MonitoringJob, NotificationChannel};
use crate::types::ResolutionOutcome;

/// Why a job stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Requested,
    Departed,
    TimeLimit,
    Failed,
}

/// Payload of a `notification:send` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub job: MonitoringJob,
    pub outcome: ResolutionOutcome,
    pub changes: Vec<String>,
    pub channels: Vec<NotificationChannel>,
    pub raised_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    MonitoringStarted {
        job: MonitoringJob,
    },
    MonitoringStopped {
        job_id: String,
        reason: StopReason,
    },
    FlightChanged {
        job_id: String,
        previous: Option<ResolutionOutcome>,
        current: ResolutionOutcome,
        changes: Vec<String>,
    },
    NotificationSend(NotificationRequest),
}

impl MonitorEvent {
    /// Topic name used by downstream subscribers.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MonitoringStarted { .. } => "monitoring:started",
            Self::MonitoringStopped { .. } => "monitoring:stopped",
            Self::FlightChanged { .. } => "flight:changed",
            Self::NotificationSend(_) => "notification:send",
        }
    }

    /// The job this event concerns.
    pub fn job_id(&self) -> &str {
        match self {
            Self::MonitoringStarted { job } => &job.id,
            Self::MonitoringStopped { job_id, .. } | Self::FlightChanged { job_id, .. } => job_id,
            Self::NotificationSend(request) => &request.job.id,
        }
    }
}
