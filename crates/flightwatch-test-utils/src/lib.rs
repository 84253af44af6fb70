// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Flightwatch integration tests.
//!
//! Provides mock collaborators and a harness for fast, deterministic tests
//! without real flight data providers.
//!
//! # Components
//!
//! - [`MockSource`] - source layer with queued answers and call counting
//! - [`MockScheduler`] - recurring-job facility that records registrations
//! - [`RecordingSink`] - event sink that keeps every event
//! - [`fixtures`] - flight data builders

pub mod fixtures;
pub mod harness;
pub mod mock_scheduler;
pub mod mock_source;

pub use flightwatch_core::ManualClock;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_scheduler::{MockScheduler, RecordingSink};
pub use mock_source::MockSource;
