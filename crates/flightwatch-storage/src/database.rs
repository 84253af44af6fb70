// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and migrations.
//!
//! Queries go through tokio-rusqlite's background thread. Several processes
//! may open the same file; SQLite's file locking serializes their writers.

use std::path::{Path, PathBuf};

use flightwatch_core::FlightwatchError;
use tracing::{debug, info};

use crate::migrations;

const PRAGMAS: &str = "PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA busy_timeout = 5000;";

/// Handle to an open, migrated SQLite database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the database at `path` and apply migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, FlightwatchError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(FlightwatchError::storage)?;
        }

        let setup_path = path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), FlightwatchError> {
            let mut conn =
                rusqlite::Connection::open(&setup_path).map_err(FlightwatchError::storage)?;
            conn.execute_batch(PRAGMAS)
                .map_err(FlightwatchError::storage)?;
            migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| FlightwatchError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(FlightwatchError::storage)?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        info!(path = %path.display(), "database opened");
        Ok(Self { conn, path })
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checkpoint the WAL so the main file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), FlightwatchError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!(path = %self.path.display(), "wal checkpoint complete");
        Ok(())
    }
}

/// Convert a tokio-rusqlite error into the storage error variant.
pub(crate) fn map_tr_err(err: tokio_rusqlite::Error) -> FlightwatchError {
    FlightwatchError::storage(err.to_string())
}
