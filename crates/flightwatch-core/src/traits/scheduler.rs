// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recurring-job facility trait.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FlightwatchError;
use crate::traits::adapter::PluginAdapter;
use crate::types::ResolutionKey;

/// Payload delivered back to the monitoring engine on each trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPayload {
    pub job_id: String,
    pub key: ResolutionKey,
}

/// An at-least-once delayed/recurring job facility.
///
/// Triggers are delivered by calling `MonitoringEngine::check` with the
/// payload's key; delivery wiring belongs to the facility.
#[async_trait]
pub trait JobScheduler: PluginAdapter {
    async fn schedule(
        &self,
        job_id: &str,
        payload: CheckPayload,
        every: Duration,
    ) -> Result<(), FlightwatchError>;

    async fn cancel(&self, job_id: &str) -> Result<(), FlightwatchError>;
}
