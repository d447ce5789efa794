//! Activity Summary Tool
//!
//! Per-app time totals over a window, defaulting to the last 24 hours.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use cockpit_core::Store;

use super::parse_optional_instant;

const DEFAULT_WINDOW_HOURS: i64 = 24;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "since": {
                "type": "string",
                "description": "Window start (RFC 3339 or YYYY-MM-DD). Default: 'hours' before 'until'"
            },
            "until": {
                "type": "string",
                "description": "Window end (RFC 3339 or YYYY-MM-DD). Default: now"
            },
            "hours": {
                "type": "integer",
                "description": "Window length when 'since' is omitted (default: 24)",
                "default": DEFAULT_WINDOW_HOURS,
                "minimum": 1
            }
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryArgs {
    since: Option<String>,
    until: Option<String>,
    hours: Option<i64>,
}

pub async fn execute(store: &Arc<Mutex<Store>>, args: Option<Value>) -> Result<Value, String> {
    let args: SummaryArgs = match args {
        Some(v) if !v.is_null() => {
            serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {}", e))?
        }
        _ => SummaryArgs::default(),
    };

    let until = parse_optional_instant("until", args.until.as_deref())?.unwrap_or_else(Utc::now);
    let since = match parse_optional_instant("since", args.since.as_deref())? {
        Some(since) => since,
        None => until - Duration::hours(args.hours.unwrap_or(DEFAULT_WINDOW_HOURS).max(1)),
    };
    if since > until {
        return Err("'since' must not be after 'until'".to_string());
    }

    let summary = store
        .lock()
        .await
        .activity_summary(since, until)
        .ok_or_else(|| "Activity data is unavailable".to_string())?;
    serde_json::to_value(summary).map_err(|e| e.to_string())
}
