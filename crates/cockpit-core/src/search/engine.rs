//! Query engine
//!
//! Two strategies over the same record kinds:
//! - substring: a bounded newest-first scan of the primary tables, matched
//!   case-insensitively in Rust, which never depends on shadow freshness
//! - ranked: FTS5 `MATCH` on the shadow tables, ordered by `bm25()`, with a
//!   highlighted snippet per hit
//!
//! [`Store::search_unified`] prefers ranked hits and falls back to the scan.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use rusqlite::params_from_iter;
use serde::Serialize;

use super::query::sanitize_fts5_query;
use crate::schema::{EntityKind, PK_COLUMN, TIMESTAMP_COLUMN};
use crate::storage::decode::{DecodedRecord, decode_row};
use crate::storage::{Result, Store, StorageError};
use crate::value::{FieldMap, Value, to_reference_seconds};

/// Default number of hits returned
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Substring,
    Ranked,
    #[default]
    Unified,
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "substring" | "scan" => Ok(SearchMode::Substring),
            "ranked" | "fts" | "fulltext" => Ok(SearchMode::Ranked),
            "unified" | "auto" => Ok(SearchMode::Unified),
            _ => Err(format!("Unknown search mode: {}", s)),
        }
    }
}

/// Options shared by every search strategy
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Kinds to search; empty means every ranked-searchable kind
    pub kinds: Vec<EntityKind>,
    pub limit: usize,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Per-kind row budget for the substring scan; defaults to the store's
    pub scan_cap: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            kinds: Vec::new(),
            limit: DEFAULT_SEARCH_LIMIT,
            since: None,
            until: None,
            scan_cap: None,
        }
    }
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn scan_cap(mut self, cap: usize) -> Self {
        self.scan_cap = Some(cap.max(1));
        self
    }

    fn requested_kinds(&self) -> Vec<EntityKind> {
        if self.kinds.is_empty() {
            EntityKind::SEARCHABLE.to_vec()
        } else {
            let mut kinds = self.kinds.clone();
            kinds.sort();
            kinds.dedup();
            kinds
        }
    }

    /// `AND` clauses and bound values for the timestamp window
    fn date_bounds(&self, qualifier: &str) -> (String, Vec<SqlValue>) {
        let mut sql = String::new();
        let mut values = Vec::new();
        if let Some(since) = self.since {
            sql.push_str(&format!(" AND {}{} >= ?", qualifier, TIMESTAMP_COLUMN));
            values.push(SqlValue::Real(to_reference_seconds(since)));
        }
        if let Some(until) = self.until {
            sql.push_str(&format!(" AND {}{} <= ?", qualifier, TIMESTAMP_COLUMN));
            values.push(SqlValue::Real(to_reference_seconds(until)));
        }
        (sql, values)
    }
}

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub kind: EntityKind,
    pub id: String,
    /// ISO-8601 record timestamp
    pub timestamp: Option<String>,
    /// `bm25()` score, lower is better; absent for substring hits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Highlighted excerpt with `**` around matched terms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub record: FieldMap,
    #[serde(skip)]
    pub(crate) seconds: Option<f64>,
}

impl SearchHit {
    fn from_record(kind: EntityKind, record: DecodedRecord) -> Self {
        let timestamp = record
            .fields
            .get("timestamp")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            kind,
            id: record.id,
            timestamp,
            score: None,
            snippet: None,
            record: record.fields,
            seconds: record.timestamp,
        }
    }
}

fn newest_first(a: &SearchHit, b: &SearchHit) -> Ordering {
    let a_ts = a.seconds.unwrap_or(f64::NEG_INFINITY);
    let b_ts = b.seconds.unwrap_or(f64::NEG_INFINITY);
    b_ts.total_cmp(&a_ts)
        .then_with(|| a.kind.cmp(&b.kind))
        .then_with(|| a.id.cmp(&b.id))
}

fn best_score_first(a: &SearchHit, b: &SearchHit) -> Ordering {
    let a_score = a.score.unwrap_or(f64::INFINITY);
    let b_score = b.score.unwrap_or(f64::INFINITY);
    a_score
        .total_cmp(&b_score)
        .then_with(|| a.kind.cmp(&b.kind))
        .then_with(|| a.id.cmp(&b.id))
}

fn scan_kind(
    conn: &Connection,
    kind: EntityKind,
    options: &SearchOptions,
    cap: usize,
) -> Result<Vec<DecodedRecord>> {
    let spec = kind.spec();
    let (bounds, mut values) = options.date_bounds("");
    values.push(SqlValue::Integer(i64::try_from(cap).unwrap_or(i64::MAX)));

    let sql = format!(
        "SELECT * FROM {} WHERE 1 = 1{}{} ORDER BY {} DESC, {} DESC LIMIT ?",
        spec.table,
        bounds,
        spec.predicate_clause(),
        TIMESTAMP_COLUMN,
        PK_COLUMN
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(StorageError::StatementPrepareFailure)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |row| decode_row(spec, row))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn ranked_kind(
    conn: &Connection,
    kind: EntityKind,
    expression: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchHit>> {
    let spec = kind.spec();
    let Some(fts) = spec.fts_table else {
        return Ok(Vec::new());
    };

    let (bounds, bound_values) = options.date_bounds("p.");
    let mut values = vec![SqlValue::Text(expression.to_string())];
    values.extend(bound_values);
    values.push(SqlValue::Integer(i64::try_from(options.limit).unwrap_or(i64::MAX)));

    let sql = format!(
        "SELECT p.*, bm25({fts}) AS rank_score,
                snippet({fts}, -1, '**', '**', '…', 12) AS rank_snippet
         FROM {fts}
         JOIN {table} p ON p.ZID = {fts}.id
         WHERE {fts} MATCH ?{bounds}{pred}
         ORDER BY rank_score, {fts}.id
         LIMIT ?",
        fts = fts,
        table = spec.table,
        bounds = bounds,
        pred = spec.predicate_clause(),
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(StorageError::StatementPrepareFailure)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
        let record = decode_row(spec, row)?;
        let score: f64 = row.get("rank_score")?;
        let snippet: Option<String> = row.get("rank_snippet")?;
        let mut hit = SearchHit::from_record(kind, record);
        hit.score = Some(score);
        hit.snippet = snippet;
        Ok(hit)
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn matches_text(record: &DecodedRecord, kind: EntityKind, needle: &str) -> bool {
    kind.spec().text_columns().any(|column| {
        record
            .fields
            .get(column.field)
            .and_then(Value::as_str)
            .is_some_and(|text| text.to_lowercase().contains(needle))
    })
}

impl Store {
    /// Case-insensitive literal substring search over the primary tables.
    ///
    /// Each kind scans at most the scan cap of its newest rows; hits are
    /// merged newest first and truncated to the limit.
    pub fn search_substring(&mut self, query: &str, options: &SearchOptions) -> Vec<SearchHit> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() || options.limit == 0 {
            return Vec::new();
        }
        if !self.ensure_connection() {
            return Vec::new();
        }
        let cap = options.scan_cap.unwrap_or(self.scan_cap);
        let Ok(conn) = self.db.conn() else {
            return Vec::new();
        };

        let mut hits: Vec<SearchHit> = Vec::new();
        for kind in options.requested_kinds() {
            match scan_kind(conn, kind, options, cap) {
                Ok(records) => hits.extend(
                    records
                        .into_iter()
                        .filter(|record| matches_text(record, kind, &needle))
                        .map(|record| SearchHit::from_record(kind, record)),
                ),
                Err(e) => tracing::warn!(kind = %kind, error = %e, "Substring scan failed"),
            }
        }

        hits.sort_by(newest_first);
        hits.truncate(options.limit);
        hits
    }

    /// Relevance-ranked full-text search over the shadow tables.
    ///
    /// Kinds without a shadow table are skipped. Hits are merged by ascending
    /// `bm25()` score, ties broken by kind then id.
    pub fn search_ranked(&mut self, query: &str, options: &SearchOptions) -> Vec<SearchHit> {
        let expression = sanitize_fts5_query(query);
        if expression.is_empty() || options.limit == 0 {
            return Vec::new();
        }
        if !self.ensure_connection() {
            return Vec::new();
        }
        let Ok(conn) = self.db.conn() else {
            return Vec::new();
        };

        let mut hits: Vec<SearchHit> = Vec::new();
        for kind in options.requested_kinds() {
            if !kind.is_searchable() {
                continue;
            }
            match ranked_kind(conn, kind, &expression, options) {
                Ok(found) => hits.extend(found),
                Err(e) => tracing::warn!(kind = %kind, error = %e, "Ranked search failed"),
            }
        }

        hits.sort_by(best_score_first);
        hits.truncate(options.limit);
        hits
    }

    /// Ranked search, falling back to the substring scan when nothing ranks.
    pub fn search_unified(&mut self, query: &str, options: &SearchOptions) -> Vec<SearchHit> {
        let ranked = self.search_ranked(query, options);
        if !ranked.is_empty() {
            return ranked;
        }
        tracing::debug!("No ranked hits, falling back to substring scan");
        self.search_substring(query, options)
    }

    /// Dispatch on `mode`.
    pub fn search(&mut self, query: &str, mode: SearchMode, options: &SearchOptions) -> Vec<SearchHit> {
        match mode {
            SearchMode::Substring => self.search_substring(query, options),
            SearchMode::Ranked => self.search_ranked(query, options),
            SearchMode::Unified => self.search_unified(query, options),
        }
    }
}
