// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Monitoring event fan-out.
//!
//! [`EventBus`] is the [`EventSink`] the monitoring engine publishes into.
//! Downstream consumers (notification delivery, audit, UIs) each hold their
//! own receiver; a slow receiver loses the oldest events rather than
//! blocking the publisher.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use flightwatch_core::{EventSink, MonitorEvent};

pub const DEFAULT_CAPACITY: usize = 256;

/// Broadcast bus for [`MonitorEvent`]s. Cheap to clone; clones share the channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A zero capacity is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends to every current subscriber and returns how many received it.
    pub fn send(&self, event: MonitorEvent) -> usize {
        self.sender.send(event).unwrap_or_default()
    }

    /// Receives events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Spawns a task that logs every event until `cancel` fires or the bus closes.
    pub fn spawn_logger(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) => log_event(&event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "event logger lagged, events dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!("event logger stopped");
        })
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: MonitorEvent) {
        let name = event.name();
        let job_id = event.job_id().to_string();
        let delivered = self.send(event);
        debug!(event = name, job_id = %job_id, delivered, "event published");
    }
}

fn log_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::FlightChanged { job_id, changes, .. } => {
            info!(event = event.name(), job_id = %job_id, changes = ?changes, "flight changed");
        }
        MonitorEvent::NotificationSend(request) => {
            info!(
                event = event.name(),
                job_id = %request.job.id,
                channels = ?request.channels,
                changes = request.changes.len(),
                "notification requested"
            );
        }
        other => info!(event = other.name(), job_id = %other.job_id(), "monitoring event"),
    }
}
