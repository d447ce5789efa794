//! Record access layer
//!
//! Insert, get, list and update over field maps. Public methods absorb
//! failures (logging them) and answer with `None`, `false` or an empty list;
//! the `try_*` methods underneath propagate [`StorageError`].

use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{OptionalExtension, TransactionBehavior, params, params_from_iter};
use uuid::Uuid;

use super::decode::{DecodedRecord, decode_raw, decode_row};
use super::{Result, Store, StorageError};
use crate::schema::{
    ENT_COLUMN, EntityKind, ID_COLUMN, OPT_COLUMN, PK_COLUMN, PRIMARY_KEY_TABLE, TIMESTAMP_COLUMN,
    TableSpec,
};
use crate::search::index;
use crate::search::query::like_contains_pattern;
use crate::value::{FieldMap, Value, parse_timestamp, to_reference_seconds};

/// Filters for [`Store::list`]. All conditions must hold.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Inclusive lower bound on `timestamp`
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `timestamp`
    pub until: Option<DateTime<Utc>>,
    /// `(field, substring)` pairs; the substring matches literally
    pub contains: Vec<(String, String)>,
    /// `(field, value)` pairs; a null value matches SQL NULL
    pub equals: Vec<(String, Value)>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn contains(mut self, field: impl Into<String>, text: impl Into<String>) -> Self {
        self.contains.push((field.into(), text.into()));
        self
    }

    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }
}

/// Column holding `field`, including the housekeeping `id`/`timestamp` keys.
fn column_of(spec: &TableSpec, field: &str) -> Option<&'static str> {
    match field {
        "id" => Some(ID_COLUMN),
        "timestamp" => Some(TIMESTAMP_COLUMN),
        _ => spec.column_for_field(field).map(|c| c.column),
    }
}

/// Coerce a filter or update value for `field`.
fn sql_value_of(spec: &TableSpec, field: &str, value: &Value) -> Result<SqlValue> {
    match field {
        "id" => Ok(value
            .as_str()
            .map(|s| SqlValue::Text(s.to_string()))
            .unwrap_or(SqlValue::Null)),
        "timestamp" => parse_timestamp(value)
            .map(SqlValue::Real)
            .ok_or_else(|| StorageError::InvalidInput(format!("unreadable timestamp {:?}", value))),
        _ => {
            let column = spec
                .column_for_field(field)
                .ok_or_else(|| StorageError::InvalidInput(format!("unknown field '{}'", field)))?;
            column.to_sql(value).map_err(StorageError::InvalidInput)
        }
    }
}

impl Store {
    // ========================================================================
    // INSERT
    // ========================================================================

    /// Insert a record and return its id.
    ///
    /// Returns `None` when a required field is missing or blank, when the
    /// kind's entity tag cannot be discovered, or when the write fails.
    pub fn insert(&mut self, kind: EntityKind, fields: FieldMap) -> Option<String> {
        if !self.ensure_connection() {
            return None;
        }
        match self.try_insert(kind, &fields) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Insert failed");
                None
            }
        }
    }

    pub fn try_insert(&mut self, kind: EntityKind, fields: &FieldMap) -> Result<String> {
        let spec = kind.spec();

        if let Some(missing) = spec
            .required_columns()
            .find(|c| fields.get(c.field).is_none_or(Value::is_blank))
        {
            return Err(StorageError::InvalidInput(format!(
                "required field '{}' is missing",
                missing.field
            )));
        }

        let id = fields
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let timestamp = match fields.get("timestamp") {
            Some(value) if !value.is_null() => parse_timestamp(value).ok_or_else(|| {
                StorageError::InvalidInput(format!("unreadable timestamp {:?}", value))
            })?,
            _ => to_reference_seconds(Utc::now()),
        };

        let mut columns: Vec<&str> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();
        for (field, value) in fields {
            if field == "id" || field == "timestamp" {
                continue;
            }
            match spec.column_for_field(field) {
                Some(column) => {
                    columns.push(column.column);
                    values.push(column.to_sql(value).map_err(StorageError::InvalidInput)?);
                }
                None => tracing::warn!(kind = %kind, field = %field, "Ignoring unmapped field"),
            }
        }

        let conn = self.db.conn()?;
        let entity = self
            .introspector
            .entity_type(conn, kind)
            .ok_or_else(|| StorageError::SchemaResolutionFailure(kind.to_string()))?;

        let tx = rusqlite::Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
            .map_err(StorageError::WriteFailure)?;

        let taken: Option<i64> = tx
            .query_row(
                &format!("SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1", spec.table, ID_COLUMN),
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::StatementPrepareFailure)?;
        if taken.is_some() {
            return Err(StorageError::InvalidInput(format!("id '{}' already exists", id)));
        }

        // The producer framework hands out keys from Z_MAX; stay ahead of both
        let reserved: Option<i64> = match tx
            .query_row(
                &format!("SELECT Z_MAX FROM {} WHERE Z_NAME = ?1", PRIMARY_KEY_TABLE),
                params![spec.entity_name],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()
        {
            Ok(max) => max.flatten(),
            Err(e) => {
                tracing::debug!(kind = %kind, error = %e, "No key metadata");
                None
            }
        };
        let highest: Option<i64> = tx
            .query_row(
                &format!("SELECT MAX({}) FROM {}", PK_COLUMN, spec.table),
                [],
                |row| row.get(0),
            )
            .map_err(StorageError::StatementPrepareFailure)?;
        let pk = reserved.unwrap_or(0).max(highest.unwrap_or(0)) + 1;

        let mut all_columns = vec![PK_COLUMN, ENT_COLUMN, OPT_COLUMN, ID_COLUMN, TIMESTAMP_COLUMN];
        all_columns.extend(columns);
        let mut all_values = vec![
            SqlValue::Integer(pk),
            SqlValue::Integer(entity),
            SqlValue::Integer(1),
            SqlValue::Text(id.clone()),
            SqlValue::Real(timestamp),
        ];
        all_values.extend(values);

        let placeholders: Vec<String> = (1..=all_values.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            spec.table,
            all_columns.join(", "),
            placeholders.join(", ")
        );
        tx.execute(&sql, params_from_iter(all_values.iter()))
            .map_err(StorageError::WriteFailure)?;

        if let Err(e) = tx.execute(
            &format!(
                "UPDATE {} SET Z_MAX = ?1 WHERE Z_NAME = ?2 AND COALESCE(Z_MAX, 0) < ?1",
                PRIMARY_KEY_TABLE
            ),
            params![pk, spec.entity_name],
        ) {
            tracing::debug!(kind = %kind, error = %e, "Could not advance Z_MAX");
        }

        tx.commit().map_err(StorageError::WriteFailure)?;
        tracing::debug!(kind = %kind, id = %id, pk, "Inserted record");

        if let Err(e) = index::sync_record(conn, kind, &id) {
            tracing::warn!(kind = %kind, id = %id, error = %e, "Shadow sync failed after insert");
        }
        Ok(id)
    }

    // ========================================================================
    // READ
    // ========================================================================

    /// Fetch one record by id.
    pub fn get(&mut self, kind: EntityKind, id: &str) -> Option<FieldMap> {
        if !self.ensure_connection() {
            return None;
        }
        match self.try_get(kind, id) {
            Ok(record) => record.map(|r| r.fields),
            Err(e) => {
                tracing::warn!(kind = %kind, id, error = %e, "Get failed");
                None
            }
        }
    }

    pub fn try_get(&self, kind: EntityKind, id: &str) -> Result<Option<DecodedRecord>> {
        let spec = kind.spec();
        let conn = self.db.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT * FROM {} WHERE {} = ?1 LIMIT 1", spec.table, ID_COLUMN))
            .map_err(StorageError::StatementPrepareFailure)?;
        let record = stmt
            .query_row(params![id], |row| decode_row(spec, row))
            .optional()?;
        Ok(record)
    }

    /// Fetch one record through the column-driven decoder. Diagnostic only.
    pub fn get_raw(&mut self, kind: EntityKind, id: &str) -> Option<FieldMap> {
        if !self.ensure_connection() {
            return None;
        }
        let spec = kind.spec();
        let result = self.db.conn().and_then(|conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT * FROM {} WHERE {} = ?1 LIMIT 1", spec.table, ID_COLUMN))
                .map_err(StorageError::StatementPrepareFailure)?;
            Ok(stmt.query_row(params![id], |row| decode_raw(spec, row)).optional()?)
        });
        match result {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!(kind = %kind, id, error = %e, "Raw get failed");
                None
            }
        }
    }

    /// Records matching `filter`, newest first, at most `limit`.
    pub fn list(&mut self, kind: EntityKind, filter: &ListFilter, limit: usize) -> Vec<FieldMap> {
        if !self.ensure_connection() {
            return Vec::new();
        }
        match self.try_list(kind, filter, limit) {
            Ok(records) => records.into_iter().map(|r| r.fields).collect(),
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "List failed");
                Vec::new()
            }
        }
    }

    pub fn try_list(
        &self,
        kind: EntityKind,
        filter: &ListFilter,
        limit: usize,
    ) -> Result<Vec<DecodedRecord>> {
        let spec = kind.spec();
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        if let Some(since) = filter.since {
            clauses.push(format!("{} >= ?", TIMESTAMP_COLUMN));
            values.push(SqlValue::Real(to_reference_seconds(since)));
        }
        if let Some(until) = filter.until {
            clauses.push(format!("{} <= ?", TIMESTAMP_COLUMN));
            values.push(SqlValue::Real(to_reference_seconds(until)));
        }

        for (field, text) in &filter.contains {
            let Some(column) = column_of(spec, field) else {
                tracing::warn!(kind = %kind, field = %field, "Unknown filter field");
                return Ok(Vec::new());
            };
            clauses.push(format!("{} LIKE ? ESCAPE '\\'", column));
            values.push(SqlValue::Text(like_contains_pattern(text)));
        }

        for (field, value) in &filter.equals {
            let Some(column) = column_of(spec, field) else {
                tracing::warn!(kind = %kind, field = %field, "Unknown filter field");
                return Ok(Vec::new());
            };
            if value.is_null() {
                clauses.push(format!("{} IS NULL", column));
            } else {
                clauses.push(format!("{} = ?", column));
                values.push(sql_value_of(spec, field, value)?);
            }
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        values.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

        let sql = format!(
            "SELECT * FROM {}{} ORDER BY {} DESC, {} DESC LIMIT ?",
            spec.table, where_clause, TIMESTAMP_COLUMN, PK_COLUMN
        );
        let conn = self.db.conn()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(StorageError::StatementPrepareFailure)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| decode_row(spec, row))?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Number of rows in the kind's primary table, or 0 if it cannot be read.
    pub fn count(&mut self, kind: EntityKind) -> i64 {
        if !self.ensure_connection() {
            return 0;
        }
        let result = self.db.conn().and_then(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", kind.spec().table), [], |row| {
                row.get::<_, i64>(0)
            })?)
        });
        match result {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Count failed");
                0
            }
        }
    }

    // ========================================================================
    // UPDATE
    // ========================================================================

    /// Apply `fields` to the record with `id`. Returns `true` if a row changed.
    pub fn update(&mut self, kind: EntityKind, id: &str, fields: FieldMap) -> bool {
        if !self.ensure_connection() {
            return false;
        }
        match self.try_update(kind, id, &fields) {
            Ok(changed) => changed,
            Err(e) => {
                tracing::warn!(kind = %kind, id, error = %e, "Update failed");
                false
            }
        }
    }

    pub fn try_update(&mut self, kind: EntityKind, id: &str, fields: &FieldMap) -> Result<bool> {
        let spec = kind.spec();
        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        for (field, value) in fields {
            if field == "id" {
                tracing::warn!(kind = %kind, "Ignoring attempt to change a record id");
                continue;
            }
            let Some(column) = column_of(spec, field) else {
                tracing::warn!(kind = %kind, field = %field, "Ignoring unmapped field");
                continue;
            };
            values.push(sql_value_of(spec, field, value)?);
            sets.push(format!("{} = ?{}", column, values.len()));
        }

        if sets.is_empty() {
            return Ok(false);
        }

        values.push(SqlValue::Text(id.to_string()));
        let sql = format!(
            "UPDATE {} SET {}, {opt} = COALESCE({opt}, 0) + 1 WHERE {} = ?{}",
            spec.table,
            sets.join(", "),
            ID_COLUMN,
            values.len(),
            opt = OPT_COLUMN,
        );

        let conn = self.db.conn()?;
        let changed = conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(StorageError::WriteFailure)?;

        if changed > 0 {
            tracing::debug!(kind = %kind, id, "Updated record");
            if let Err(e) = index::sync_record(conn, kind, id) {
                tracing::warn!(kind = %kind, id, error = %e, "Shadow sync failed after update");
            }
        }
        Ok(changed > 0)
    }
}
