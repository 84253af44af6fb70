// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock source layer for deterministic cascade tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use flightwatch_core::{
    AdapterType, FlightDetails, FlightSource, FlightwatchError, HealthStatus, PluginAdapter,
    SourceError, SourceQuery,
};

type Answer = Result<FlightDetails, SourceError>;

/// A source that pops queued answers and falls back to a default answer.
///
/// Every call is counted and its query recorded.
pub struct MockSource {
    name: String,
    queue: Mutex<VecDeque<Answer>>,
    fallback: Mutex<Answer>,
    delay: Option<Duration>,
    panics: bool,
    calls: AtomicUsize,
    queries: Mutex<Vec<SourceQuery>>,
}

impl MockSource {
    fn with_fallback(name: &str, fallback: Answer) -> Self {
        Self {
            name: name.to_string(),
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            delay: None,
            panics: false,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with `flight` unless something is queued.
    pub fn succeeding(name: &str, flight: FlightDetails) -> Self {
        Self::with_fallback(name, Ok(flight))
    }

    /// Always fails with `message` unless something is queued.
    pub fn failing(name: &str, message: &str) -> Self {
        Self::with_fallback(name, Err(SourceError::new(message)))
    }

    /// Always fails with `error` unless something is queued. Use this for
    /// errors carrying a partial hint.
    pub fn rejecting(name: &str, error: SourceError) -> Self {
        Self::with_fallback(name, Err(error))
    }

    /// Panics on every call, after recording it.
    pub fn panicking(name: &str) -> Self {
        let mut source = Self::failing(name, "unreachable");
        source.panics = true;
        source
    }

    /// Sleeps before answering, on the tokio clock.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues a one-shot answer ahead of the fallback.
    pub fn push(&self, answer: Answer) {
        lock(&self.queue).push_back(answer);
    }

    /// Replaces the fallback answer.
    pub fn set_fallback(&self, answer: Answer) {
        *lock(&self.fallback) = answer;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<SourceQuery> {
        lock(&self.queries).clone()
    }

    pub fn last_query(&self) -> Option<SourceQuery> {
        lock(&self.queries).last().cloned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl PluginAdapter for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Source
    }

    async fn health_check(&self) -> Result<HealthStatus, FlightwatchError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FlightwatchError> {
        Ok(())
    }
}

#[async_trait]
impl FlightSource for MockSource {
    async fn attempt_resolve(&self, query: &SourceQuery) -> Result<FlightDetails, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.queries).push(query.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics {
            panic!("{} exploded", self.name);
        }
        let queued = lock(&self.queue).pop_front();
        queued.unwrap_or_else(|| lock(&self.fallback).clone())
    }
}
