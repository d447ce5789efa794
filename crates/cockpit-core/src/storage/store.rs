//! The store handle
//!
//! [`Store`] bundles the connection manager with the per-connection schema
//! introspector. Every operation checks the connection first and heals it if
//! it went stale; a reconnect always drops the cached entity tags.

use rusqlite::Connection;

use super::{Database, Result};
use crate::config::{DEFAULT_SCAN_CAP, StoreConfig};
use crate::schema::{EntityKind, SchemaIntrospector, SchemaReport};
use crate::search::index;

/// Handle to the shared tracker database
#[derive(Debug)]
pub struct Store {
    pub(crate) db: Database,
    pub(crate) introspector: SchemaIntrospector,
    pub(crate) scan_cap: usize,
}

impl Store {
    /// Open the store described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let db = Database::open_with_timeout(&config.path, config.busy_timeout)?;
        Ok(Self::from_database(db, config.scan_cap))
    }

    /// Open the store at the fixed per-user location.
    pub fn open_default() -> Result<Self> {
        Self::open(&StoreConfig::default_location()?)
    }

    /// Private in-memory store for tests
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory()?, DEFAULT_SCAN_CAP))
    }

    pub fn from_database(db: Database, scan_cap: usize) -> Self {
        let store = Self {
            db,
            introspector: SchemaIntrospector::new(),
            scan_cap: scan_cap.max(1),
        };
        if let Ok(conn) = store.db.conn() {
            index::create_shadow_tables(conn);
            SchemaIntrospector::validate(conn);
        }
        store
    }

    /// Make sure a usable connection exists, reopening it if needed.
    ///
    /// Returns `false` when no connection can be established; callers then
    /// answer with neutral results.
    pub fn ensure_connection(&mut self) -> bool {
        if self.db.probe() {
            return true;
        }

        tracing::warn!("Database connection is unusable, reconnecting");
        self.introspector.invalidate();
        match self.db.reconnect() {
            Ok(()) => {
                if let Ok(conn) = self.db.conn() {
                    index::create_shadow_tables(conn);
                }
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Reconnect failed");
                false
            }
        }
    }

    /// Entity tag of `kind` in the live schema.
    pub fn entity_type(&mut self, kind: EntityKind) -> Option<i64> {
        if !self.ensure_connection() {
            return None;
        }
        let conn = self.db.conn().ok()?;
        self.introspector.entity_type(conn, kind)
    }

    /// Compare the live schema with the static catalogue.
    pub fn schema_report(&mut self) -> Option<SchemaReport> {
        if !self.ensure_connection() {
            return None;
        }
        let conn = self.db.conn().ok()?;
        Some(SchemaIntrospector::validate(conn))
    }

    /// Rows examined per kind by the substring scan
    pub fn scan_cap(&self) -> usize {
        self.scan_cap
    }

    /// Borrow the underlying connection.
    pub fn connection(&self) -> Result<&Connection> {
        self.db.conn()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Close the connection; the next operation reopens it.
    pub fn disconnect(&mut self) {
        self.db.close();
    }
}
