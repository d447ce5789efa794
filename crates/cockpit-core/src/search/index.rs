//! Shadow index maintenance
//!
//! Each searchable kind has an FTS5 table (`id UNINDEXED` plus its searchable
//! fields) that mirrors the primary table. The producer never writes these
//! tables, so they drift whenever it writes without us; incremental sync
//! covers our own writes and [`Store::rebuild`] resynchronizes everything.

use rusqlite::{Connection, params};

use crate::schema::{EntityKind, ID_COLUMN, TableSpec};
use crate::storage::{Result, Store};

/// `CREATE VIRTUAL TABLE` for one kind's shadow table
pub fn shadow_ddl(spec: &TableSpec) -> Option<String> {
    let fts = spec.fts_table?;
    let columns: Vec<&str> = spec.searchable_columns().map(|c| c.field).collect();
    Some(format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS {} USING fts5(id UNINDEXED, {}, tokenize='porter unicode61')",
        fts,
        columns.join(", ")
    ))
}

/// `INSERT ... SELECT` copying eligible primary rows into the shadow table.
/// `extra` is appended to the WHERE clause.
fn copy_sql(spec: &TableSpec, fts: &str, extra: &str) -> String {
    let fields: Vec<&str> = spec.searchable_columns().map(|c| c.field).collect();
    let columns: Vec<&str> = spec.searchable_columns().map(|c| c.column).collect();
    format!(
        "INSERT INTO {fts} (id, {fields}) SELECT {id}, {columns} FROM {table} WHERE {id} IS NOT NULL{pred}{extra}",
        fts = fts,
        fields = fields.join(", "),
        id = ID_COLUMN,
        columns = columns.join(", "),
        table = spec.table,
        pred = spec.predicate_clause(),
        extra = extra,
    )
}

/// Create every shadow table that does not exist. Returns how many are
/// present afterwards; failures are logged.
pub fn create_shadow_tables(conn: &Connection) -> usize {
    let mut ready = 0;
    for kind in EntityKind::SEARCHABLE {
        let Some(ddl) = shadow_ddl(kind.spec()) else {
            continue;
        };
        match conn.execute_batch(&ddl) {
            Ok(()) => ready += 1,
            Err(e) => tracing::warn!(kind = %kind, error = %e, "Failed to create shadow table"),
        }
    }
    ready
}

/// Replace the shadow row for `id` with the stored primary row. A row that
/// fails the kind's index predicate (or no longer exists) is left unindexed.
pub fn sync_record(conn: &Connection, kind: EntityKind, id: &str) -> Result<()> {
    let spec = kind.spec();
    let Some(fts) = spec.fts_table else {
        return Ok(());
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute(&format!("DELETE FROM {} WHERE id = ?1", fts), params![id])?;
    let sql = copy_sql(spec, fts, &format!(" AND {} = ?1", ID_COLUMN));
    let indexed = tx.execute(&sql, params![id])?;
    tx.commit()?;

    tracing::debug!(kind = %kind, id, indexed, "Synced shadow row");
    Ok(())
}

/// Clear one shadow table and repopulate it from its primary table.
///
/// The clear is committed even when the copy fails, so a kind whose primary
/// table is missing ends up with an empty shadow rather than a stale one.
fn rebuild_kind(conn: &Connection, kind: EntityKind) -> Result<usize> {
    let spec = kind.spec();
    let Some(fts) = spec.fts_table else {
        return Ok(0);
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute(&format!("DELETE FROM {}", fts), [])?;
    match tx.execute(&copy_sql(spec, fts, ""), []) {
        Ok(rows) => {
            tx.commit()?;
            Ok(rows)
        }
        Err(e) => {
            tx.commit()?;
            Err(e.into())
        }
    }
}

/// Delete shadow rows whose id no longer names an eligible primary row.
fn reconcile_kind(conn: &Connection, kind: EntityKind) -> Result<usize> {
    let spec = kind.spec();
    let Some(fts) = spec.fts_table else {
        return Ok(0);
    };
    let sql = format!(
        "DELETE FROM {fts} WHERE id NOT IN (SELECT {id} FROM {table} WHERE {id} IS NOT NULL{pred})",
        fts = fts,
        id = ID_COLUMN,
        table = spec.table,
        pred = spec.predicate_clause(),
    );
    Ok(conn.execute(&sql, [])?)
}

impl Store {
    /// Rebuild every shadow table from its primary table.
    ///
    /// Returns the number of kinds rebuilt (0 to 5). Kinds fail independently.
    pub fn rebuild(&mut self) -> usize {
        if !self.ensure_connection() {
            return 0;
        }
        let Ok(conn) = self.db.conn() else {
            return 0;
        };
        create_shadow_tables(conn);

        let mut rebuilt = 0;
        for kind in EntityKind::SEARCHABLE {
            match rebuild_kind(conn, kind) {
                Ok(rows) => {
                    tracing::info!(kind = %kind, rows, "Rebuilt shadow table");
                    rebuilt += 1;
                }
                Err(e) => tracing::warn!(kind = %kind, error = %e, "Shadow rebuild failed"),
            }
        }
        rebuilt
    }

    /// Remove orphaned shadow rows. Returns the number of rows removed.
    pub fn reconcile(&mut self) -> usize {
        if !self.ensure_connection() {
            return 0;
        }
        let Ok(conn) = self.db.conn() else {
            return 0;
        };

        let mut removed = 0;
        for kind in EntityKind::SEARCHABLE {
            match reconcile_kind(conn, kind) {
                Ok(0) => {}
                Ok(rows) => {
                    tracing::info!(kind = %kind, rows, "Removed orphaned shadow rows");
                    removed += rows;
                }
                Err(e) => tracing::warn!(kind = %kind, error = %e, "Shadow reconcile failed"),
            }
        }
        removed
    }

    /// Row count of each shadow table that can be read.
    pub fn shadow_counts(&mut self) -> Vec<(EntityKind, i64)> {
        if !self.ensure_connection() {
            return Vec::new();
        }
        let Ok(conn) = self.db.conn() else {
            return Vec::new();
        };

        EntityKind::SEARCHABLE
            .into_iter()
            .filter_map(|kind| {
                let fts = kind.spec().fts_table?;
                let sql = format!("SELECT COUNT(*) FROM {}", fts);
                match conn.query_row(&sql, [], |row| row.get::<_, i64>(0)) {
                    Ok(count) => Some((kind, count)),
                    Err(e) => {
                        tracing::warn!(kind = %kind, error = %e, "Failed to count shadow rows");
                        None
                    }
                }
            })
            .collect()
    }

    /// Merge FTS5 index segments. Returns the number of tables optimized.
    pub fn optimize(&mut self) -> usize {
        if !self.ensure_connection() {
            return 0;
        }
        let Ok(conn) = self.db.conn() else {
            return 0;
        };

        let mut optimized = 0;
        for kind in EntityKind::SEARCHABLE {
            let Some(fts) = kind.spec().fts_table else {
                continue;
            };
            let sql = format!("INSERT INTO {fts}({fts}) VALUES('optimize')", fts = fts);
            match conn.execute(&sql, []) {
                Ok(_) => optimized += 1,
                Err(e) => tracing::warn!(kind = %kind, error = %e, "Shadow optimize failed"),
            }
        }
        optimized
    }
}
