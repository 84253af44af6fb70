// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded, newest-first resolution history per key.

use tracing::warn;

use flightwatch_core::{FlightwatchError, HistoryRecord, ResolutionKey, ResolutionOutcome};

use crate::keys;
use crate::store::CacheStore;

impl CacheStore {
    /// Pushes a record newest-first, trims to the configured maximum, and
    /// refreshes the list's TTL.
    pub async fn append_history(
        &self,
        key: &ResolutionKey,
        outcome: &ResolutionOutcome,
        changes: Option<Vec<String>>,
    ) -> Result<(), FlightwatchError> {
        let record = HistoryRecord {
            timestamp: self.clock.now(),
            outcome: outcome.clone(),
            changes_detected: changes.filter(|c| !c.is_empty()),
        };
        let raw = serde_json::to_string(&record)?;
        self.backend
            .push_front_trim(
                &keys::history(key),
                &raw,
                self.history_max_entries,
                self.history_ttl,
            )
            .await
    }

    /// Up to `limit` records, newest first. Undecodable records are skipped.
    pub async fn get_history(
        &self,
        key: &ResolutionKey,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, FlightwatchError> {
        let raw = self.backend.list_range(&keys::history(key), limit).await?;
        Ok(raw
            .iter()
            .filter_map(|item| match serde_json::from_str::<HistoryRecord>(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping undecodable history record");
                    None
                }
            })
            .collect())
    }

    /// Drops all history for `key`. Returns whether any existed.
    pub async fn clear_history(&self, key: &ResolutionKey) -> Result<bool, FlightwatchError> {
        self.backend.delete(&keys::history(key)).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::store::tests::{outcome, store};
    use flightwatch_core::ResolutionKey;

    #[tokio::test]
    async fn trims_to_most_recent_hundred() {
        let (store, clock) = store();
        let key = ResolutionKey::new("ABC123", "SMITH").unwrap();
        for i in 0..150 {
            clock.advance(Duration::from_secs(1));
            store
                .append_history(&key, &outcome(&key, &format!("G{i}")), None)
                .await
                .unwrap();
        }
        let records = store.get_history(&key, 1000).await.unwrap();
        assert_eq!(records.len(), 100);
        let gate = |idx: usize| {
            records[idx]
                .outcome
                .flight
                .as_ref()
                .and_then(|f| f.departure.gate.clone())
        };
        assert_eq!(gate(0).as_deref(), Some("G149"));
        assert_eq!(gate(99).as_deref(), Some("G50"));
        assert!(records.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[tokio::test]
    async fn records_changes_and_honours_limit() {
        let (store, _) = store();
        let key = ResolutionKey::new("ABC123", "SMITH").unwrap();
        store.append_history(&key, &outcome(&key, "A1"), None).await.unwrap();
        store
            .append_history(
                &key,
                &outcome(&key, "A2"),
                Some(vec!["Departure gate changed from A1 to A2".into()]),
            )
            .await
            .unwrap();
        let latest = store.get_history(&key, 1).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(
            latest[0].changes_detected.as_deref(),
            Some(&["Departure gate changed from A1 to A2".to_string()][..])
        );
    }

    #[tokio::test]
    async fn history_expires_after_ttl() {
        let (store, clock) = store();
        let key = ResolutionKey::new("ABC123", "SMITH").unwrap();
        store.append_history(&key, &outcome(&key, "A1"), Some(Vec::new())).await.unwrap();
        let first = store.get_history(&key, 10).await.unwrap();
        assert!(first[0].changes_detected.is_none(), "empty change list is not stored");
        clock.advance(Duration::from_secs(31 * 24 * 60 * 60));
        assert!(store.get_history(&key, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_history_removes_everything() {
        let (store, _) = store();
        let key = ResolutionKey::new("ABC123", "SMITH").unwrap();
        store.append_history(&key, &outcome(&key, "A1"), None).await.unwrap();
        assert!(store.clear_history(&key).await.unwrap());
        assert!(store.get_history(&key, 10).await.unwrap().is_empty());
        assert!(!store.clear_history(&key).await.unwrap());
    }
}
