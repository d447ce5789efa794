//! Test Database Manager
//!
//! Provides isolated tracker databases for testing:
//! - Temporary databases that are automatically cleaned up
//! - The producer-owned schema, built from the core's own catalogue
//! - A second "producer" connection that writes rows the way the tracker
//!   app does, bypassing the store and its shadow indexes

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cockpit_core::value::to_reference_seconds;
use cockpit_core::{EntityKind, Store, StoreConfig, fixture};
use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use tempfile::TempDir;

/// Manager for test databases
///
/// Creates isolated database instances for each test to prevent interference.
/// Automatically cleans up temporary databases when dropped.
///
/// # Example
///
/// ```rust,ignore
/// let mut db = TestDatabaseManager::new_temp();
///
/// // Write through the store
/// db.store.insert(EntityKind::Decision, fields);
///
/// // Write behind its back, like the tracker app
/// db.producer_insert(EntityKind::Insight, &[("ZTITLE", "Focus dips at 3pm".into())], None);
/// ```
pub struct TestDatabaseManager {
    /// The store under test
    pub store: Store,
    /// Temporary directory (kept alive to prevent premature deletion)
    _temp_dir: TempDir,
    /// Path to the database file
    db_path: PathBuf,
}

impl TestDatabaseManager {
    /// Create a tracker database with every producer table
    pub fn new_temp() -> Self {
        let manager = Self::new_without_schema();
        fixture::create_primary_schema(manager.store.connection().expect("connection"))
            .expect("Failed to create producer schema");
        manager
    }

    /// Create a tracker database whose store gives up on a locked write
    /// after `timeout` instead of the default five seconds
    pub fn new_temp_with_busy_timeout(timeout: Duration) -> Self {
        let manager = Self::open(|path| StoreConfig::new(path).with_busy_timeout(timeout));
        fixture::create_primary_schema(manager.store.connection().expect("connection"))
            .expect("Failed to create producer schema");
        manager
    }

    /// Create a database the producer has not initialized yet
    pub fn new_without_schema() -> Self {
        Self::open(|path| StoreConfig::new(path))
    }

    fn open(config: impl FnOnce(&std::path::Path) -> StoreConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("cockpit.sqlite");
        let store = Store::open(&config(&db_path)).expect("Failed to open test store");

        Self {
            store,
            _temp_dir: temp_dir,
            db_path,
        }
    }

    /// Get the database path
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Drop the store and open a fresh one on the same file
    pub fn reopen(&mut self) {
        self.store = Store::open(&StoreConfig::new(&self.db_path)).expect("Failed to reopen store");
    }

    // ========================================================================
    // PRODUCER SIDE
    // ========================================================================

    /// Open an independent connection, as the tracker app would
    pub fn producer(&self) -> Connection {
        let conn = Connection::open(&self.db_path).expect("Failed to open producer connection");
        conn.execute_batch("PRAGMA journal_mode = WAL;").expect("WAL");
        conn.busy_timeout(Duration::from_millis(5000)).expect("busy timeout");
        conn
    }

    /// Insert a row directly into a producer table. Returns the new `ZID`.
    ///
    /// `columns` are raw column names with their stored values; the
    /// housekeeping columns are filled in the way the tracker app fills them.
    pub fn producer_insert(
        &self,
        kind: EntityKind,
        columns: &[(&str, SqlValue)],
        timestamp: Option<DateTime<Utc>>,
    ) -> String {
        let conn = self.producer();
        let spec = kind.spec();
        let id = uuid::Uuid::new_v4().to_string().to_uppercase();
        let pk: i64 = conn
            .query_row(
                &format!("SELECT COALESCE(MAX(Z_PK), 0) + 1 FROM {}", spec.table),
                [],
                |row| row.get(0),
            )
            .expect("next primary key");

        let mut names = vec!["Z_PK", "Z_ENT", "Z_OPT", "ZID", "ZTIMESTAMP"];
        let mut values = vec![
            SqlValue::Integer(pk),
            SqlValue::Integer(fixture::entity_tag(kind)),
            SqlValue::Integer(1),
            SqlValue::Text(id.clone()),
            SqlValue::Real(to_reference_seconds(timestamp.unwrap_or_else(Utc::now))),
        ];
        for (name, value) in columns {
            names.push(*name);
            values.push(value.clone());
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({})",
                spec.table,
                names.join(", "),
                placeholders
            ),
            rusqlite::params_from_iter(values.iter()),
        )
        .expect("producer insert");
        id
    }

    /// Delete a row directly from a producer table
    pub fn producer_delete(&self, kind: EntityKind, id: &str) {
        self.producer()
            .execute(
                &format!("DELETE FROM {} WHERE ZID = ?1", kind.spec().table),
                [id],
            )
            .expect("producer delete");
    }

    /// Run arbitrary SQL on the producer connection
    pub fn producer_exec(&self, sql: &str) {
        self.producer().execute_batch(sql).expect("producer sql");
    }

    // ========================================================================
    // INSPECTION
    // ========================================================================

    /// Row count of one kind's shadow table, or `None` if it cannot be read
    pub fn shadow_count(&mut self, kind: EntityKind) -> Option<i64> {
        self.store
            .shadow_counts()
            .into_iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, count)| count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_database_has_schema() {
        let mut db = TestDatabaseManager::new_temp();
        assert!(db.path().exists());
        assert!(db.store.schema_report().unwrap().is_complete());
    }

    #[test]
    fn test_producer_rows_are_visible_to_store() {
        let mut db = TestDatabaseManager::new_temp();
        let id = db.producer_insert(
            EntityKind::Activity,
            &[("ZAPPNAME", SqlValue::Text("Xcode".into()))],
            None,
        );
        let record = db.store.get(EntityKind::Activity, &id).unwrap();
        assert_eq!(record["appName"].as_str(), Some("Xcode"));
        assert_eq!(db.shadow_count(EntityKind::Activity), Some(0));
    }
}
