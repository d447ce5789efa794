//! Record Tool
//!
//! Action-based access to one record kind: `insert`, `get`, `list`,
//! `update` and `inspect` (raw column-driven decode, for diagnostics).

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use cockpit_core::value::{field_map_from_json, field_map_to_json};
use cockpit_core::{EntityKind, FieldMap, ListFilter, Store};

use super::{kind_names, parse_kind, parse_optional_instant};

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 200;

/// Input schema for the record tool
pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": ["insert", "get", "list", "update", "inspect"],
                "description": "Action to perform: 'insert' creates a record from 'fields', 'get' fetches one by 'id', 'list' returns newest records matching 'filter', 'update' applies 'fields' to the record with 'id', 'inspect' dumps every stored column of one record"
            },
            "kind": {
                "type": "string",
                "enum": kind_names(&EntityKind::ALL),
                "description": "Record kind"
            },
            "id": {
                "type": "string",
                "description": "Record id (get, update, inspect)"
            },
            "fields": {
                "type": "object",
                "description": "Field map keyed by camelCase field name (insert, update). 'timestamp' accepts RFC 3339."
            },
            "filter": {
                "type": "object",
                "description": "List filter",
                "properties": {
                    "since": { "type": "string", "description": "Inclusive lower bound (RFC 3339 or YYYY-MM-DD)" },
                    "until": { "type": "string", "description": "Inclusive upper bound (RFC 3339 or YYYY-MM-DD)" },
                    "contains": { "type": "object", "description": "field -> literal substring" },
                    "equals": { "type": "object", "description": "field -> exact value" }
                }
            },
            "limit": {
                "type": "integer",
                "description": "Maximum records for list (default: 20)",
                "default": DEFAULT_LIST_LIMIT,
                "minimum": 1,
                "maximum": MAX_LIST_LIMIT
            }
        },
        "required": ["action", "kind"]
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterArgs {
    since: Option<String>,
    until: Option<String>,
    #[serde(default)]
    contains: serde_json::Map<String, Value>,
    #[serde(default)]
    equals: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordArgs {
    action: String,
    kind: String,
    id: Option<String>,
    fields: Option<Value>,
    filter: Option<FilterArgs>,
    limit: Option<usize>,
}

/// Execute the record tool
pub async fn execute(store: &Arc<Mutex<Store>>, args: Option<Value>) -> Result<Value, String> {
    let args: RecordArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {}", e))?,
        None => return Err("Missing arguments".to_string()),
    };
    let kind = parse_kind(&args.kind)?;

    match args.action.as_str() {
        "insert" => execute_insert(store, kind, args.fields).await,
        "get" => execute_get(store, kind, required_id(args.id)?).await,
        "inspect" => execute_inspect(store, kind, required_id(args.id)?).await,
        "list" => execute_list(store, kind, args.filter.unwrap_or_default(), args.limit).await,
        "update" => execute_update(store, kind, required_id(args.id)?, args.fields).await,
        _ => Err(format!(
            "Invalid action '{}'. Must be one of: insert, get, list, update, inspect",
            args.action
        )),
    }
}

fn required_id(id: Option<String>) -> Result<String, String> {
    id.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "Missing 'id'".to_string())
}

fn required_fields(fields: Option<Value>) -> Result<FieldMap, String> {
    let fields = fields.ok_or_else(|| "Missing 'fields'".to_string())?;
    field_map_from_json(fields).ok_or_else(|| "'fields' must be an object".to_string())
}

async fn execute_insert(
    store: &Arc<Mutex<Store>>,
    kind: EntityKind,
    fields: Option<Value>,
) -> Result<Value, String> {
    let fields = required_fields(fields)?;
    let id = store.lock().await.insert(kind, fields);

    match id {
        Some(id) => Ok(serde_json::json!({
            "action": "insert",
            "kind": kind,
            "success": true,
            "id": id,
        })),
        None => {
            let required: Vec<&str> = kind.spec().required_columns().map(|c| c.field).collect();
            Err(format!(
                "Could not insert {} record. Required fields: {}. The tracker database must already contain the {} table.",
                kind,
                required.join(", "),
                kind.spec().table
            ))
        }
    }
}

async fn execute_get(store: &Arc<Mutex<Store>>, kind: EntityKind, id: String) -> Result<Value, String> {
    let record = store.lock().await.get(kind, &id);
    Ok(match record {
        Some(fields) => serde_json::json!({
            "action": "get",
            "kind": kind,
            "found": true,
            "record": field_map_to_json(&fields),
        }),
        None => serde_json::json!({
            "action": "get",
            "kind": kind,
            "found": false,
            "id": id,
        }),
    })
}

async fn execute_inspect(
    store: &Arc<Mutex<Store>>,
    kind: EntityKind,
    id: String,
) -> Result<Value, String> {
    let record = store.lock().await.get_raw(kind, &id);
    Ok(serde_json::json!({
        "action": "inspect",
        "kind": kind,
        "found": record.is_some(),
        "columns": record.as_ref().map(field_map_to_json),
    }))
}

fn build_filter(args: FilterArgs) -> Result<ListFilter, String> {
    let mut filter = ListFilter::new();
    filter.since = parse_optional_instant("since", args.since.as_deref())?;
    filter.until = parse_optional_instant("until", args.until.as_deref())?;

    for (field, text) in args.contains {
        let text = match text {
            Value::String(s) => s,
            other => other.to_string(),
        };
        filter = filter.contains(field, text);
    }
    for (field, value) in args.equals {
        filter = filter.equals(field, cockpit_core::Value::from(value));
    }
    Ok(filter)
}

async fn execute_list(
    store: &Arc<Mutex<Store>>,
    kind: EntityKind,
    filter: FilterArgs,
    limit: Option<usize>,
) -> Result<Value, String> {
    let filter = build_filter(filter)?;
    let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let records = store.lock().await.list(kind, &filter, limit);

    let formatted: Vec<Value> = records.iter().map(field_map_to_json).collect();
    Ok(serde_json::json!({
        "action": "list",
        "kind": kind,
        "total": formatted.len(),
        "records": formatted,
    }))
}

async fn execute_update(
    store: &Arc<Mutex<Store>>,
    kind: EntityKind,
    id: String,
    fields: Option<Value>,
) -> Result<Value, String> {
    let fields = required_fields(fields)?;
    let updated = store.lock().await.update(kind, &id, fields);
    Ok(serde_json::json!({
        "action": "update",
        "kind": kind,
        "id": id,
        "updated": updated,
    }))
}
