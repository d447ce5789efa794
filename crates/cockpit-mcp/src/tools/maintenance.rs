//! Maintenance Tools
//!
//! Shadow index upkeep and database health: `rebuild_index`,
//! `reconcile_index` and `stats`.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use cockpit_core::{EntityKind, Store};

// ============================================================================
// SCHEMAS
// ============================================================================

pub fn rebuild_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "optimize": {
                "type": "boolean",
                "description": "Merge FTS5 index segments after rebuilding (default: false)",
                "default": false
            }
        }
    })
}

pub fn reconcile_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

pub fn stats_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

// ============================================================================
// EXECUTION
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RebuildArgs {
    #[serde(default)]
    optimize: bool,
}

/// Drop and refill every shadow table from its primary table
pub async fn execute_rebuild(store: &Arc<Mutex<Store>>, args: Option<Value>) -> Result<Value, String> {
    let args: RebuildArgs = match args {
        Some(v) if !v.is_null() => {
            serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {}", e))?
        }
        _ => RebuildArgs::default(),
    };

    let mut store = store.lock().await;
    let rebuilt = store.rebuild();
    let optimized = if args.optimize { store.optimize() } else { 0 };
    let shadow_rows: serde_json::Map<String, Value> = store
        .shadow_counts()
        .into_iter()
        .map(|(kind, count)| (kind.to_string(), Value::from(count)))
        .collect();

    Ok(serde_json::json!({
        "tool": "rebuild_index",
        "success": rebuilt == EntityKind::SEARCHABLE.len(),
        "kindsRebuilt": rebuilt,
        "kindsTotal": EntityKind::SEARCHABLE.len(),
        "tablesOptimized": optimized,
        "shadowRows": shadow_rows,
    }))
}

/// Delete shadow rows whose primary record no longer exists
pub async fn execute_reconcile(store: &Arc<Mutex<Store>>, _args: Option<Value>) -> Result<Value, String> {
    let removed = store.lock().await.reconcile();
    Ok(serde_json::json!({
        "tool": "reconcile_index",
        "success": true,
        "orphansRemoved": removed,
    }))
}

/// Record counts, shadow counts, entity tags and schema health
pub async fn execute_stats(store: &Arc<Mutex<Store>>, _args: Option<Value>) -> Result<Value, String> {
    let mut store = store.lock().await;

    let mut kinds = serde_json::Map::new();
    for kind in EntityKind::ALL {
        kinds.insert(
            kind.to_string(),
            serde_json::json!({
                "table": kind.spec().table,
                "entityType": store.entity_type(kind),
                "records": store.count(kind),
            }),
        );
    }

    let shadow_counts = store.shadow_counts();
    for (kind, count) in &shadow_counts {
        if let Some(Value::Object(entry)) = kinds.get_mut(kind.as_str()) {
            entry.insert("indexed".to_string(), Value::from(*count));
        }
    }

    let report = store.schema_report();
    let schema_complete = report.as_ref().is_some_and(|r| r.is_complete());
    let mut warnings: Vec<String> = Vec::new();
    match &report {
        Some(report) => {
            for missing in report.missing_tables() {
                warnings.push(format!("Table {} is missing", missing.spec().table));
            }
            for status in report.tables.iter().filter(|t| t.present) {
                if !status.missing_columns.is_empty() {
                    warnings.push(format!(
                        "Table {} lacks columns: {}",
                        status.kind.spec().table,
                        status.missing_columns.join(", ")
                    ));
                }
            }
        }
        None => warnings.push("Database is unreachable".to_string()),
    }
    if shadow_counts.len() < EntityKind::SEARCHABLE.len() {
        warnings.push("Some shadow tables could not be read; run rebuild_index".to_string());
    }

    let path = store
        .database()
        .path()
        .map(|p| p.display().to_string());

    Ok(serde_json::json!({
        "tool": "stats",
        "databasePath": path,
        "connected": report.is_some(),
        "busyTimeoutMs": store.database().busy_timeout().as_millis() as u64,
        "scanCap": store.scan_cap(),
        "schemaComplete": schema_complete,
        "kinds": kinds,
        "schema": report,
        "warnings": warnings,
    }))
}
