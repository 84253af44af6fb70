// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`StoreBackend`].
//!
//! Every compare-and-set is a single statement or an immediate transaction,
//! so processes sharing one database file see one consistent lock table.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use tracing::debug;

use flightwatch_core::{
    AdapterType, Clock, FlightwatchError, HealthStatus, PluginAdapter, StoreBackend,
};

use crate::database::{Database, map_tr_err};
use crate::expiry_after;

/// Shared-file [`StoreBackend`].
pub struct SqliteBackend {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl SqliteBackend {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    fn now_ms(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    fn expiry_ms(&self, ttl: Duration) -> i64 {
        expiry_after(self.clock.now(), ttl).timestamp_millis()
    }
}

/// Removes an expired list (items and meta) for `key`.
fn drop_expired_list(
    tx: &rusqlite::Transaction<'_>,
    key: &str,
    now: i64,
) -> Result<(), rusqlite::Error> {
    let expired = tx.execute(
        "DELETE FROM kv_list_meta WHERE key = ?1 AND expires_at IS NOT NULL AND expires_at <= ?2",
        params![key, now],
    )?;
    if expired > 0 {
        tx.execute("DELETE FROM kv_list_items WHERE key = ?1", params![key])?;
    }
    Ok(())
}

#[async_trait]
impl PluginAdapter for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, FlightwatchError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FlightwatchError> {
        self.db.checkpoint().await
    }
}

#[async_trait]
impl StoreBackend for SqliteBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, FlightwatchError> {
        let key = key.to_string();
        let now = self.now_ms();
        self.db
            .connection()
            .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
                conn.query_row(
                    "SELECT value FROM kv_entries
                     WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                    params![key, now],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), FlightwatchError> {
        let key = key.to_string();
        let value = value.to_string();
        let expires_at = ttl.map(|ttl| self.expiry_ms(ttl));
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO kv_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        expires_at = excluded.expires_at",
                    params![key, value, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, FlightwatchError> {
        let key = key.to_string();
        let value = value.to_string();
        let now = self.now_ms();
        let expires_at = self.expiry_ms(ttl);
        self.db
            .connection()
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                // Upsert only replaces a row whose lease already ran out.
                let changed = conn.execute(
                    "INSERT INTO kv_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        expires_at = excluded.expires_at
                     WHERE kv_entries.expires_at IS NOT NULL AND kv_entries.expires_at <= ?4",
                    params![key, value, expires_at, now],
                )?;
                Ok(changed == 1)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, FlightwatchError> {
        let key = key.to_string();
        let expected = expected.map(str::to_string);
        let value = value.to_string();
        let now = self.now_ms();
        let expires_at = ttl.map(|ttl| self.expiry_ms(ttl));
        self.db
            .connection()
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let current: Option<String> = tx
                    .query_row(
                        "SELECT value FROM kv_entries
                         WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                        params![key, now],
                        |row| row.get(0),
                    )
                    .optional()?;
                if current != expected {
                    return Ok(false);
                }
                tx.execute(
                    "INSERT INTO kv_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        expires_at = excluded.expires_at",
                    params![key, value, expires_at],
                )?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn delete(&self, key: &str) -> Result<bool, FlightwatchError> {
        let key = key.to_string();
        let now = self.now_ms();
        self.db
            .connection()
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let live: i64 = tx.query_row(
                    "SELECT
                        (SELECT COUNT(*) FROM kv_entries
                         WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2))
                      + (SELECT COUNT(*) FROM kv_list_meta
                         WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2))",
                    params![key, now],
                    |row| row.get(0),
                )?;
                tx.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
                tx.execute("DELETE FROM kv_list_items WHERE key = ?1", params![key])?;
                tx.execute("DELETE FROM kv_list_meta WHERE key = ?1", params![key])?;
                tx.commit()?;
                Ok(live > 0)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, FlightwatchError> {
        let key = key.to_string();
        let expected = expected.to_string();
        let now = self.now_ms();
        self.db
            .connection()
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let removed = conn.execute(
                    "DELETE FROM kv_entries
                     WHERE key = ?1 AND value = ?2 AND (expires_at IS NULL OR expires_at > ?3)",
                    params![key, expected, now],
                )?;
                Ok(removed > 0)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn incr(&self, key: &str, ttl_on_create: Duration) -> Result<u64, FlightwatchError> {
        let key = key.to_string();
        let now = self.now_ms();
        let expires_at = self.expiry_ms(ttl_on_create);
        let raw = self
            .db
            .connection()
            .call(move |conn| -> Result<String, rusqlite::Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                tx.execute(
                    "DELETE FROM kv_entries
                     WHERE key = ?1 AND expires_at IS NOT NULL AND expires_at <= ?2",
                    params![key, now],
                )?;
                tx.execute(
                    "INSERT INTO kv_entries (key, value, expires_at) VALUES (?1, '1', ?2)
                     ON CONFLICT(key) DO UPDATE SET
                        value = CAST(CAST(kv_entries.value AS INTEGER) + 1 AS TEXT)",
                    params![key, expires_at],
                )?;
                let value: String = tx.query_row(
                    "SELECT value FROM kv_entries WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )?;
                tx.commit()?;
                Ok(value)
            })
            .await
            .map_err(map_tr_err)?;
        raw.parse::<u64>()
            .map_err(|_| FlightwatchError::storage(format!("counter holds non-integer `{raw}`")))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, FlightwatchError> {
        let key = key.to_string();
        let now = self.now_ms();
        let expires_at = self
            .db
            .connection()
            .call(move |conn| -> Result<Option<i64>, rusqlite::Error> {
                let scalar: Option<Option<i64>> = conn
                    .query_row(
                        "SELECT expires_at FROM kv_entries
                         WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                        params![key, now],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(at) = scalar {
                    return Ok(at);
                }
                let list: Option<Option<i64>> = conn
                    .query_row(
                        "SELECT expires_at FROM kv_list_meta
                         WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                        params![key, now],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(list.flatten())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(expires_at
            .and_then(|at| u64::try_from(at - now).ok())
            .map(Duration::from_millis))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, FlightwatchError> {
        let key = key.to_string();
        let now = self.now_ms();
        let expires_at = self.expiry_ms(ttl);
        self.db
            .connection()
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let mut changed = conn.execute(
                    "UPDATE kv_entries SET expires_at = ?2
                     WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?3)",
                    params![key, expires_at, now],
                )?;
                changed += conn.execute(
                    "UPDATE kv_list_meta SET expires_at = ?2
                     WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?3)",
                    params![key, expires_at, now],
                )?;
                Ok(changed > 0)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn push_front_trim(
        &self,
        key: &str,
        value: &str,
        max_len: usize,
        ttl: Duration,
    ) -> Result<(), FlightwatchError> {
        let key = key.to_string();
        let value = value.to_string();
        let now = self.now_ms();
        let expires_at = self.expiry_ms(ttl);
        let max_len = i64::try_from(max_len).unwrap_or(i64::MAX);
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                drop_expired_list(&tx, &key, now)?;
                tx.execute(
                    "INSERT INTO kv_list_meta (key, expires_at, next_seq) VALUES (?1, ?2, 1)
                     ON CONFLICT(key) DO UPDATE SET
                        expires_at = excluded.expires_at,
                        next_seq = kv_list_meta.next_seq + 1",
                    params![key, expires_at],
                )?;
                let seq: i64 = tx.query_row(
                    "SELECT next_seq FROM kv_list_meta WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )?;
                tx.execute(
                    "INSERT INTO kv_list_items (key, seq, value) VALUES (?1, ?2, ?3)",
                    params![key, seq, value],
                )?;
                tx.execute(
                    "DELETE FROM kv_list_items WHERE key = ?1 AND seq <= ?2",
                    params![key, seq.saturating_sub(max_len)],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn list_range(&self, key: &str, limit: usize) -> Result<Vec<String>, FlightwatchError> {
        let key = key.to_string();
        let now = self.now_ms();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT i.value FROM kv_list_items i
                     JOIN kv_list_meta m ON m.key = i.key
                     WHERE i.key = ?1 AND (m.expires_at IS NULL OR m.expires_at > ?2)
                     ORDER BY i.seq DESC
                     LIMIT ?3",
                )?;
                let rows = stmt.query_map(params![key, now, limit], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, FlightwatchError> {
        let prefix = prefix.to_string();
        let now = self.now_ms();
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
                let len = i64::try_from(prefix.len()).unwrap_or(i64::MAX);
                let mut stmt = conn.prepare(
                    "SELECT key FROM kv_entries
                     WHERE substr(key, 1, ?2) = ?1 AND (expires_at IS NULL OR expires_at > ?3)
                     UNION
                     SELECT key FROM kv_list_meta
                     WHERE substr(key, 1, ?2) = ?1 AND (expires_at IS NULL OR expires_at > ?3)
                     ORDER BY key",
                )?;
                let rows = stmt.query_map(params![prefix, len, now], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn purge_expired(&self) -> Result<usize, FlightwatchError> {
        let now = self.now_ms();
        let removed = self
            .db
            .connection()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let mut removed = tx.execute(
                    "DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    params![now],
                )?;
                removed += tx.execute(
                    "DELETE FROM kv_list_items WHERE key IN (
                        SELECT key FROM kv_list_meta
                        WHERE expires_at IS NOT NULL AND expires_at <= ?1)",
                    params![now],
                )?;
                removed += tx.execute(
                    "DELETE FROM kv_list_meta WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    params![now],
                )?;
                tx.commit()?;
                Ok(removed)
            })
            .await
            .map_err(map_tr_err)?;
        debug!(removed, "purged expired rows");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightwatch_core::SystemClock;

    async fn open(dir: &tempfile::TempDir) -> SqliteBackend {
        let db = Database::open(dir.path().join("kv.db")).await.unwrap();
        SqliteBackend::new(db, Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn scalar_round_trip_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;
        store.set("flight:A:B", "payload", Some(Duration::from_secs(60))).await.unwrap();
        assert_eq!(store.get("flight:A:B").await.unwrap().as_deref(), Some("payload"));
        assert!(store.delete("flight:A:B").await.unwrap());
        assert!(!store.delete("flight:A:B").await.unwrap());
        assert_eq!(store.get("flight:A:B").await.unwrap(), None);
    }

    #[tokio::test]
    async fn lock_rows_are_exclusive_until_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;
        assert!(store.set_if_absent("lock:x", "t1", Duration::from_secs(30)).await.unwrap());
        assert!(!store.set_if_absent("lock:x", "t2", Duration::from_secs(30)).await.unwrap());
        assert!(!store.delete_if_equals("lock:x", "t2").await.unwrap());
        assert!(store.delete_if_equals("lock:x", "t1").await.unwrap());
        assert!(store.set_if_absent("lock:x", "t2", Duration::from_millis(1)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.set_if_absent("lock:x", "t3", Duration::from_secs(30)).await.unwrap());
    }

    #[tokio::test]
    async fn two_handles_share_one_lock_table() {
        let dir = tempfile::tempdir().unwrap();
        let a = open(&dir).await;
        let b = open(&dir).await;
        assert!(a.set_if_absent("lock:k", "a", Duration::from_secs(30)).await.unwrap());
        assert!(!b.set_if_absent("lock:k", "b", Duration::from_secs(30)).await.unwrap());
        assert_eq!(b.get("lock:k").await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn compare_and_set_guards_job_records() {
        let dir = tempfile::tempdir().unwrap();
        let a = open(&dir).await;
        let b = open(&dir).await;
        assert!(a.compare_and_set("monitor:A:B", None, "claimed", None).await.unwrap());
        assert!(!b.compare_and_set("monitor:A:B", None, "claimed-too", None).await.unwrap());
        assert!(b.compare_and_set("monitor:A:B", Some("claimed"), "active", None).await.unwrap());
        assert!(!a.compare_and_set("monitor:A:B", Some("claimed"), "stale", None).await.unwrap());
        assert_eq!(a.get("monitor:A:B").await.unwrap().as_deref(), Some("active"));
        assert_eq!(a.ttl("monitor:A:B").await.unwrap(), None);
    }

    #[tokio::test]
    async fn counters_increment() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;
        for expected in 1..=3 {
            assert_eq!(store.incr("ratelimit:ip:1", Duration::from_secs(60)).await.unwrap(), expected);
        }
        let ttl = store.ttl("ratelimit:ip:1").await.unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn lists_trim_and_order_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;
        for i in 0..150 {
            store
                .push_front_trim("history:flight:A:B", &i.to_string(), 100, Duration::from_secs(3600))
                .await
                .unwrap();
        }
        let items = store.list_range("history:flight:A:B", 500).await.unwrap();
        assert_eq!(items.len(), 100);
        assert_eq!(items.first().map(String::as_str), Some("149"));
        assert_eq!(items.last().map(String::as_str), Some("50"));
        assert_eq!(
            store.keys_with_prefix("history:").await.unwrap(),
            vec!["history:flight:A:B"]
        );
        assert!(store.delete("history:flight:A:B").await.unwrap());
        assert!(store.list_range("history:flight:A:B", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn health_check_and_purge() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
        store.set("gone", "x", Some(Duration::from_millis(1))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        store.shutdown().await.unwrap();
    }
}
