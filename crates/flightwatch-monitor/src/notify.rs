// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use flightwatch_core::MonitoringOptions;

use crate::changes::{ChangeKind, FlightChange};

/// Change descriptions the job's options ask to be notified about.
///
/// Delay changes need `notify_on_delay` and gate changes need
/// `notify_on_gate_change`; nothing passes without `notify_on_change`.
pub fn notifiable_changes(options: &MonitoringOptions, changes: &[FlightChange]) -> Vec<String> {
    if !options.notify_on_change {
        return Vec::new();
    }
    changes
        .iter()
        .filter(|change| match change.kind {
            ChangeKind::Delay => options.notify_on_delay,
            ChangeKind::Gate => options.notify_on_gate_change,
            ChangeKind::Status | ChangeKind::Terminal | ChangeKind::EstimatedDeparture => true,
        })
        .map(|change| change.description.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(kind: ChangeKind) -> FlightChange {
        FlightChange {
            kind,
            description: kind.to_string(),
        }
    }

    #[test]
    fn filters_by_sub_reason() {
        let changes = [change(ChangeKind::Delay), change(ChangeKind::Gate), change(ChangeKind::Status)];
        let options = MonitoringOptions {
            notify_on_delay: false,
            ..MonitoringOptions::default()
        };
        assert_eq!(notifiable_changes(&options, &changes), vec!["gate", "status"]);

        let options = MonitoringOptions {
            notify_on_gate_change: false,
            ..MonitoringOptions::default()
        };
        assert_eq!(notifiable_changes(&options, &changes), vec!["delay", "status"]);
    }

    #[test]
    fn master_switch_silences_everything() {
        let options = MonitoringOptions {
            notify_on_change: false,
            ..MonitoringOptions::default()
        };
        assert!(notifiable_changes(&options, &[change(ChangeKind::Status)]).is_empty());
    }
}
