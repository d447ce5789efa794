//! Connection manager
//!
//! Owns the single SQLite connection to the shared tracker database. The
//! producer process writes to the same file, so the connection runs in WAL
//! mode with a busy timeout and is reopened if it goes stale.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;

use super::{Result, StorageError};
use crate::config::DEFAULT_BUSY_TIMEOUT;

/// A connection to the tracker database plus what is needed to reopen it.
pub struct Database {
    path: Option<PathBuf>,
    conn: Option<Connection>,
    busy_timeout: Duration,
}

impl Database {
    /// Open (creating if needed) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Self::connect(&path, busy_timeout)?;
        tracing::info!(path = %path.display(), "Opened tracker database");
        Ok(Self {
            path: Some(path),
            conn: Some(conn),
            busy_timeout,
        })
    }

    /// Private in-memory database. Cannot be reopened once closed.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::connection(":memory:", e))?;
        Self::configure_connection(&conn, DEFAULT_BUSY_TIMEOUT)
            .map_err(|e| StorageError::connection(":memory:", e))?;
        Ok(Self {
            path: None,
            conn: Some(conn),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        })
    }

    fn connect(path: &Path, busy_timeout: Duration) -> Result<Connection> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::connection(path, e))?;
        }
        let conn = Connection::open(path).map_err(|e| StorageError::connection(path, e))?;
        Self::configure_connection(&conn, busy_timeout)
            .map_err(|e| StorageError::connection(path, e))?;
        Ok(conn)
    }

    /// Apply PRAGMAs shared by every connection to the tracker database
    fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )?;
        conn.busy_timeout(busy_timeout)?;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Borrow the live connection.
    pub fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(StorageError::Unavailable)
    }

    /// True if the current connection answers a trivial query.
    pub fn probe(&self) -> bool {
        let Some(conn) = self.conn.as_ref() else {
            return false;
        };
        let result = conn
            .prepare_cached("SELECT 1")
            .and_then(|mut stmt| stmt.query_row([], |row| row.get::<_, i64>(0)));
        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Connection probe failed");
                false
            }
        }
    }

    /// Drop the current connection and open a fresh one on the same path.
    pub fn reconnect(&mut self) -> Result<()> {
        self.conn = None;
        let path = self.path.clone().ok_or(StorageError::Unavailable)?;
        let conn = Self::connect(&path, self.busy_timeout)?;
        tracing::info!(path = %path.display(), "Reconnected to tracker database");
        self.conn = Some(conn);
        Ok(())
    }

    /// Close the connection without reopening.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                tracing::warn!(error = %e, "Error closing connection");
            }
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("open", &self.conn.is_some())
            .field("busy_timeout", &self.busy_timeout)
            .finish()
    }
}
