//! Search Tool
//!
//! Cross-kind search over the tracker database. `unified` (the default)
//! tries BM25-ranked full-text search first and falls back to a substring
//! scan when the index has nothing to offer.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use cockpit_core::search::DEFAULT_SEARCH_LIMIT;
use cockpit_core::{EntityKind, SearchMode, SearchOptions, Store};

use super::{kind_names, parse_kind, parse_optional_instant};

const MAX_SEARCH_LIMIT: usize = 100;

/// Input schema for the search tool
pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Search text. Bare words are prefix-matched in ranked mode; quoted phrases pass through."
            },
            "mode": {
                "type": "string",
                "enum": ["unified", "ranked", "substring"],
                "description": "Search strategy (default: unified = ranked with substring fallback)",
                "default": "unified"
            },
            "kinds": {
                "type": "array",
                "items": { "type": "string", "enum": kind_names(&EntityKind::ALL) },
                "description": "Record kinds to search (default: every kind with a full-text index)"
            },
            "limit": {
                "type": "integer",
                "description": "Maximum number of results (default: 20)",
                "default": DEFAULT_SEARCH_LIMIT,
                "minimum": 1,
                "maximum": MAX_SEARCH_LIMIT
            },
            "since": {
                "type": "string",
                "description": "Only records at or after this instant (RFC 3339 or YYYY-MM-DD)"
            },
            "until": {
                "type": "string",
                "description": "Only records at or before this instant (RFC 3339 or YYYY-MM-DD)"
            }
        },
        "required": ["query"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    query: String,
    mode: Option<String>,
    #[serde(default)]
    kinds: Vec<String>,
    limit: Option<usize>,
    since: Option<String>,
    until: Option<String>,
}

pub async fn execute(store: &Arc<Mutex<Store>>, args: Option<Value>) -> Result<Value, String> {
    let args: SearchArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {}", e))?,
        None => return Err("Missing arguments".to_string()),
    };

    if args.query.trim().is_empty() {
        return Err("Query cannot be empty".to_string());
    }

    let mode = match args.mode.as_deref() {
        Some(m) => m.parse::<SearchMode>()?,
        None => SearchMode::default(),
    };
    let kinds = args
        .kinds
        .iter()
        .map(|k| parse_kind(k))
        .collect::<Result<Vec<_>, _>>()?;

    let mut options = SearchOptions::new()
        .kinds(kinds)
        .limit(args.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT));
    if let Some(since) = parse_optional_instant("since", args.since.as_deref())? {
        options = options.since(since);
    }
    if let Some(until) = parse_optional_instant("until", args.until.as_deref())? {
        options = options.until(until);
    }

    let hits = store.lock().await.search(&args.query, mode, &options);

    let results: Vec<Value> = hits
        .iter()
        .map(|hit| serde_json::to_value(hit).unwrap_or(Value::Null))
        .collect();

    Ok(serde_json::json!({
        "query": args.query,
        "mode": mode,
        "total": results.len(),
        "results": results,
    }))
}
