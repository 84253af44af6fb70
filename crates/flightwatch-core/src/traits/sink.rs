// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event sink trait for monitoring events.

use crate::events::MonitorEvent;

/// Destination for monitoring events. Publishing never blocks the caller.
pub trait EventSink: Send + Sync + 'static {
    fn publish(&self, event: MonitorEvent);
}
