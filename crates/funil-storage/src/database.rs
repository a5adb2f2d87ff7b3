// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread, which is what makes every multi-statement mutation in the query
//! modules an atomic unit: concurrent `get_or_create_conversation` calls for
//! the same phone cannot interleave. Do NOT create additional Connection
//! instances for writes.

use funil_core::FunilError;
use tracing::debug;

/// Handle to the Funil SQLite database.
///
/// Cheap to clone; all clones share the same single-writer connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (or creates) the database at `path`, applies PRAGMAs, and runs
    /// all pending migrations.
    pub async fn open(path: &str) -> Result<Self, FunilError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| FunilError::Storage {
                source: Box::new(e),
            })?;

        conn.call(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        let migration_result = conn
            .call(|conn| Ok(crate::migrations::run_migrations(conn)))
            .await
            .map_err(map_tr_err)?;
        migration_result?;

        debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// Returns the underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Closes the database, flushing pending writes.
    pub async fn close(self) -> Result<(), FunilError> {
        self.conn.close().await.map_err(map_tr_err)
    }
}

/// Maps a tokio-rusqlite error into the workspace error type.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> FunilError {
    FunilError::Storage {
        source: Box::new(e),
    }
}
