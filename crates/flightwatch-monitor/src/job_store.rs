// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Monitoring job persistence under the `monitor:` namespace, without TTL.
//!
//! Writes are conditional on the record last read, so a start, a stop and a
//! check racing on one key cannot overwrite each other's transitions.

use std::sync::Arc;

use tracing::warn;

use flightwatch_cache::keys;
use flightwatch_core::{FlightwatchError, MonitoringJob, ResolutionKey, StoreBackend};

#[derive(Clone)]
pub struct JobStore {
    backend: Arc<dyn StoreBackend>,
}

impl JobStore {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    pub async fn load(&self, key: &ResolutionKey) -> Result<Option<MonitoringJob>, FlightwatchError> {
        match self.backend.get(&keys::monitor(key)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// The job together with its stored text, which later writes compare against.
    pub async fn load_versioned(
        &self,
        key: &ResolutionKey,
    ) -> Result<Option<(MonitoringJob, String)>, FlightwatchError> {
        match self.backend.get(&keys::monitor(key)).await? {
            Some(raw) => Ok(Some((serde_json::from_str(&raw)?, raw))),
            None => Ok(None),
        }
    }

    /// Writes `job` if the stored record is still `expected` (`None`: no record).
    /// Returns the new stored text, or `None` when another writer got there first.
    pub async fn replace(
        &self,
        job: &MonitoringJob,
        expected: Option<&str>,
    ) -> Result<Option<String>, FlightwatchError> {
        let raw = serde_json::to_string(job)?;
        let written = self
            .backend
            .compare_and_set(&keys::monitor(&job.key), expected, &raw, None)
            .await?;
        Ok(written.then_some(raw))
    }

    /// Puts back `previous` (or removes the record) if it still holds `current`.
    pub async fn restore(
        &self,
        key: &ResolutionKey,
        current: &str,
        previous: Option<&str>,
    ) -> Result<bool, FlightwatchError> {
        let storage_key = keys::monitor(key);
        match previous {
            Some(previous) => {
                self.backend
                    .compare_and_set(&storage_key, Some(current), previous, None)
                    .await
            }
            None => self.backend.delete_if_equals(&storage_key, current).await,
        }
    }

    /// Every stored job, sorted by id. Undecodable records are skipped.
    pub async fn list(&self) -> Result<Vec<MonitoringJob>, FlightwatchError> {
        let mut jobs = Vec::new();
        for storage_key in self.backend.keys_with_prefix(keys::MONITOR_PREFIX).await? {
            let Some(raw) = self.backend.get(&storage_key).await? else {
                continue;
            };
            match serde_json::from_str::<MonitoringJob>(&raw) {
                Ok(job) => jobs.push(job),
                Err(e) => warn!(key = %storage_key, error = %e, "skipping undecodable job"),
            }
        }
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(jobs)
    }
}
