// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. The [`Database`] struct IS the single writer: query modules
//! accept `&Database` and go through `connection().call()`. Do NOT create
//! additional Connection instances for writes.

use tokio_rusqlite::Connection;
use tracing::debug;

use loreline_core::LorelineError;

/// Helper to convert tokio_rusqlite errors into LorelineError::Storage.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> LorelineError {
    LorelineError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the WAL-mode SQLite database backing chunks and jobs.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply pragmas, and run
    /// all pending migrations.
    pub async fn open(path: &str) -> Result<Self, LorelineError> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| map_tr_err(e.into()))?;

        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        let migration_result = conn
            .call(|conn| -> Result<_, rusqlite::Error> {
                Ok(crate::migrations::run_migrations(conn))
            })
            .await
            .map_err(map_tr_err)?;
        migration_result.map_err(|e| LorelineError::Storage {
            source: Box::new(e),
        })?;

        debug!(path, "database opened, migrations applied");
        Ok(Self { conn })
    }

    /// The underlying serialized connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL before shutdown.
    pub async fn close(&self) -> Result<(), LorelineError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}
