//! MCP Tools
//!
//! Tool implementations for the Cockpit MCP gateway:
//! - `record`: insert / get / list / update / inspect one record kind
//! - `search`: substring, ranked or unified search across kinds
//! - `activity_summary`: per-app time totals over a window
//! - `rebuild_index`, `reconcile_index`, `stats`: index maintenance and health

pub mod maintenance;
pub mod record;
pub mod search;
pub mod summary;

use chrono::{DateTime, NaiveDate, Utc};
use cockpit_core::EntityKind;

/// Wire names of every record kind, for schemas and error messages
pub(crate) fn kind_names(kinds: &[EntityKind]) -> Vec<&'static str> {
    kinds.iter().map(|k| k.as_str()).collect()
}

pub(crate) fn parse_kind(name: &str) -> Result<EntityKind, String> {
    name.parse::<EntityKind>().map_err(|_| {
        format!(
            "Invalid kind '{}'. Must be one of: {}",
            name,
            kind_names(&EntityKind::ALL).join(", ")
        )
    })
}

/// Accept RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub(crate) fn parse_instant(field: &str, text: &str) -> Result<DateTime<Utc>, String> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("Invalid '{}': expected RFC 3339 or YYYY-MM-DD, got '{}'", field, text))
}

pub(crate) fn parse_optional_instant(
    field: &str,
    text: Option<&str>,
) -> Result<Option<DateTime<Utc>>, String> {
    text.map(|t| parse_instant(field, t)).transpose()
}
