// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Snapshot comparison.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use strum::Display as StrumDisplay;

use flightwatch_core::{FlightDetails, ResolutionOutcome};

/// What a change is about. Notification filtering keys off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
    Status,
    Delay,
    Gate,
    Terminal,
    EstimatedDeparture,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightChange {
    pub kind: ChangeKind,
    pub description: String,
}

impl FlightChange {
    fn new(kind: ChangeKind, description: String) -> Self {
        Self { kind, description }
    }
}

pub fn descriptions(changes: &[FlightChange]) -> Vec<String> {
    changes.iter().map(|c| c.description.clone()).collect()
}

/// Differences between two snapshots. Empty unless both carry flight data.
pub fn detect_changes(
    previous: Option<&ResolutionOutcome>,
    current: &ResolutionOutcome,
) -> Vec<FlightChange> {
    match (previous.and_then(|p| p.flight.as_ref()), current.flight.as_ref()) {
        (Some(before), Some(after)) => compare_flights(before, after),
        _ => Vec::new(),
    }
}

fn compare_flights(before: &FlightDetails, after: &FlightDetails) -> Vec<FlightChange> {
    let mut changes = Vec::new();

    if before.status != after.status {
        changes.push(FlightChange::new(
            ChangeKind::Status,
            format!("Status changed from {} to {}", before.status, after.status),
        ));
    }

    let (was, now) = (&before.departure, &after.departure);
    let (delay_was, delay_now) = (was.delay_minutes.unwrap_or(0), now.delay_minutes.unwrap_or(0));
    if delay_was != delay_now {
        changes.push(FlightChange::new(
            ChangeKind::Delay,
            format!("Departure delay changed from {delay_was} to {delay_now} minutes"),
        ));
    }
    if was.gate != now.gate {
        changes.push(FlightChange::new(
            ChangeKind::Gate,
            format!(
                "Departure gate changed from {} to {}",
                or_na(was.gate.as_ref()),
                or_na(now.gate.as_ref())
            ),
        ));
    }
    if was.terminal != now.terminal {
        changes.push(FlightChange::new(
            ChangeKind::Terminal,
            format!(
                "Departure terminal changed from {} to {}",
                or_na(was.terminal.as_ref()),
                or_na(now.terminal.as_ref())
            ),
        ));
    }
    if was.estimated_time != now.estimated_time {
        changes.push(FlightChange::new(
            ChangeKind::EstimatedDeparture,
            format!(
                "Estimated departure changed from {} to {}",
                or_na(was.estimated_time.map(format_time).as_ref()),
                or_na(now.estimated_time.map(format_time).as_ref())
            ),
        ));
    }

    changes
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn or_na<T: Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "N/A".to_string(), ToString::to_string)
}
