// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording scheduler and event sink.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use flightwatch_core::{
    AdapterType, CheckPayload, EventSink, FlightwatchError, HealthStatus, JobScheduler,
    MonitorEvent, PluginAdapter,
};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps registrations in memory and never fires them; tests deliver
/// triggers by calling the engine directly.
#[derive(Default)]
pub struct MockScheduler {
    active: Mutex<HashMap<String, (CheckPayload, Duration)>>,
    cancelled: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `schedule`/`cancel` call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// The registration for `job_id`, if still scheduled.
    pub fn registration(&self, job_id: &str) -> Option<(CheckPayload, Duration)> {
        lock(&self.active).get(job_id).cloned()
    }

    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }

    pub fn cancelled(&self) -> Vec<String> {
        lock(&self.cancelled).clone()
    }

    fn check_failing(&self) -> Result<(), FlightwatchError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FlightwatchError::Scheduler {
                message: "mock scheduler unavailable".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for MockScheduler {
    fn name(&self) -> &str {
        "mock-scheduler"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Scheduler
    }

    async fn health_check(&self) -> Result<HealthStatus, FlightwatchError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FlightwatchError> {
        Ok(())
    }
}

#[async_trait]
impl JobScheduler for MockScheduler {
    async fn schedule(
        &self,
        job_id: &str,
        payload: CheckPayload,
        every: Duration,
    ) -> Result<(), FlightwatchError> {
        self.check_failing()?;
        lock(&self.active).insert(job_id.to_string(), (payload, every));
        Ok(())
    }

    async fn cancel(&self, job_id: &str) -> Result<(), FlightwatchError> {
        self.check_failing()?;
        if lock(&self.active).remove(job_id).is_some() {
            lock(&self.cancelled).push(job_id.to_string());
        }
        Ok(())
    }
}

/// Event sink that keeps everything it receives.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MonitorEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MonitorEvent> {
        lock(&self.events).clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        lock(&self.events).iter().map(MonitorEvent::name).collect()
    }

    /// Change lists of every `notification:send` event, in order.
    pub fn notifications(&self) -> Vec<Vec<String>> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                MonitorEvent::NotificationSend(request) => Some(request.changes.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: MonitorEvent) {
        lock(&self.events).push(event);
    }
}
