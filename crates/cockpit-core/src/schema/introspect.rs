//! Schema introspection
//!
//! The producer's persistence framework stamps every row with an integer
//! entity tag (`Z_ENT`) whose value is assigned when the framework first
//! creates its store, so it cannot be compiled in. The introspector discovers
//! it at runtime and caches what it finds for the life of one connection.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, params};

use super::{ENT_COLUMN, EntityKind, PRIMARY_KEY_TABLE};

/// Per-connection entity-tag resolver.
///
/// Successful lookups are cached until [`invalidate`](Self::invalidate);
/// misses are never cached, so tables the producer creates later become
/// visible on the next call.
#[derive(Debug, Default)]
pub struct SchemaIntrospector {
    cache: HashMap<EntityKind, i64>,
}

impl SchemaIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the entity tag for `kind`, or `None` if the schema does not
    /// (yet) know it.
    pub fn entity_type(&mut self, conn: &Connection, kind: EntityKind) -> Option<i64> {
        if let Some(tag) = self.cache.get(&kind) {
            return Some(*tag);
        }

        let tag = Self::from_metadata(conn, kind).or_else(|| Self::from_existing_row(conn, kind));
        match tag {
            Some(tag) => {
                tracing::debug!(kind = %kind, tag, "Resolved entity type");
                self.cache.insert(kind, tag);
            }
            None => {
                tracing::warn!(kind = %kind, "Entity type not found in metadata or existing rows");
            }
        }
        tag
    }

    /// Forget every cached tag. Called whenever the connection is replaced.
    pub fn invalidate(&mut self) {
        if !self.cache.is_empty() {
            tracing::debug!(entries = self.cache.len(), "Invalidating entity type cache");
        }
        self.cache.clear();
    }

    pub fn cached(&self, kind: EntityKind) -> Option<i64> {
        self.cache.get(&kind).copied()
    }

    fn from_metadata(conn: &Connection, kind: EntityKind) -> Option<i64> {
        let sql = format!("SELECT Z_ENT FROM {} WHERE Z_NAME = ?1", PRIMARY_KEY_TABLE);
        match conn
            .query_row(&sql, params![kind.entity_name()], |row| row.get::<_, i64>(0))
            .optional()
        {
            Ok(tag) => tag,
            Err(e) => {
                tracing::debug!(kind = %kind, error = %e, "Metadata lookup failed");
                None
            }
        }
    }

    fn from_existing_row(conn: &Connection, kind: EntityKind) -> Option<i64> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} IS NOT NULL LIMIT 1",
            ENT_COLUMN,
            kind.spec().table,
            ENT_COLUMN
        );
        match conn.query_row(&sql, [], |row| row.get::<_, i64>(0)).optional() {
            Ok(tag) => tag,
            Err(e) => {
                tracing::debug!(kind = %kind, error = %e, "Row-based entity lookup failed");
                None
            }
        }
    }

    /// Check the static catalogue against the live schema.
    pub fn validate(conn: &Connection) -> SchemaReport {
        let tables = EntityKind::ALL
            .iter()
            .map(|&kind| {
                let spec = kind.spec();
                let live = live_columns(conn, spec.table);
                let status = if live.is_empty() {
                    TableStatus {
                        kind,
                        present: false,
                        missing_columns: Vec::new(),
                    }
                } else {
                    let missing_columns = [super::ID_COLUMN, super::TIMESTAMP_COLUMN]
                        .into_iter()
                        .chain(spec.columns.iter().map(|c| c.column))
                        .filter(|column| !live.iter().any(|l| l.eq_ignore_ascii_case(column)))
                        .collect();
                    TableStatus {
                        kind,
                        present: true,
                        missing_columns,
                    }
                };

                if !status.present {
                    tracing::warn!(kind = %kind, table = spec.table, "Producer table is missing");
                } else if !status.missing_columns.is_empty() {
                    tracing::warn!(
                        kind = %kind,
                        table = spec.table,
                        missing = ?status.missing_columns,
                        "Producer table lacks mapped columns"
                    );
                }
                status
            })
            .collect();

        SchemaReport { tables }
    }
}

fn live_columns(conn: &Connection, table: &str) -> Vec<String> {
    let result = conn.prepare("SELECT name FROM pragma_table_info(?1)").and_then(|mut stmt| {
        let names = stmt.query_map(params![table], |row| row.get::<_, String>(0))?;
        names.collect::<rusqlite::Result<Vec<_>>>()
    });
    match result {
        Ok(columns) => columns,
        Err(e) => {
            tracing::warn!(table, error = %e, "Could not read table info");
            Vec::new()
        }
    }
}

/// Outcome of validating one producer table
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStatus {
    pub kind: EntityKind,
    pub present: bool,
    pub missing_columns: Vec<&'static str>,
}

/// Snapshot of how well the live schema matches the catalogue
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaReport {
    pub tables: Vec<TableStatus>,
}

impl SchemaReport {
    pub fn is_complete(&self) -> bool {
        self.tables
            .iter()
            .all(|t| t.present && t.missing_columns.is_empty())
    }

    pub fn missing_tables(&self) -> Vec<EntityKind> {
        self.tables
            .iter()
            .filter(|t| !t.present)
            .map(|t| t.kind)
            .collect()
    }

    pub fn status(&self, kind: EntityKind) -> Option<&TableStatus> {
        self.tables.iter().find(|t| t.kind == kind)
    }
}
