// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value backends for the Flightwatch cache, lock, history, and job store.
//!
//! [`MemoryBackend`] serves single-process deployments and tests.
//! [`SqliteBackend`] stores everything in one WAL-mode SQLite file with
//! embedded migrations, so several worker processes can share one lock table.

pub mod database;
pub mod memory;
pub mod migrations;
pub mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::info;

use flightwatch_config::model::{StorageBackendKind, StorageConfig};
use flightwatch_core::{Clock, FlightwatchError, StoreBackend};

pub use database::Database;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Build the backend selected by `config`.
pub async fn open_backend(
    config: &StorageConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn StoreBackend>, FlightwatchError> {
    match config.backend {
        StorageBackendKind::Memory => {
            info!("using in-memory store");
            Ok(Arc::new(MemoryBackend::with_clock(clock)))
        }
        StorageBackendKind::Sqlite => {
            let db = Database::open(&config.database_path).await?;
            Ok(Arc::new(SqliteBackend::new(db, clock)))
        }
    }
}

/// `now + ttl`, saturating at the maximum representable instant.
pub(crate) fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightwatch_core::{PluginAdapter, SystemClock};

    #[test]
    fn expiry_saturates() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, Duration::from_secs(5)), now + TimeDelta::seconds(5));
        assert_eq!(expiry_after(now, Duration::MAX), DateTime::<Utc>::MAX_UTC);
    }

    #[tokio::test]
    async fn opens_configured_backend() {
        let dir = tempfile::tempdir().unwrap();
        let memory = open_backend(&StorageConfig::default(), Arc::new(SystemClock))
            .await
            .unwrap();
        assert_eq!(memory.name(), "memory");

        let config = StorageConfig {
            backend: StorageBackendKind::Sqlite,
            database_path: dir.path().join("nested/fw.db").display().to_string(),
            ..StorageConfig::default()
        };
        let sqlite = open_backend(&config, Arc::new(SystemClock)).await.unwrap();
        assert_eq!(sqlite.name(), "sqlite");
    }
}
