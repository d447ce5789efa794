//! Activity summaries
//!
//! Per-app totals over a time window of captured activity.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;

use super::{Result, Store, StorageError};
use crate::schema::{EntityKind, TIMESTAMP_COLUMN, TableSpec};
use crate::value::to_reference_seconds;

/// Time spent in one app within a window
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUsage {
    pub app_name: String,
    pub activities: i64,
    /// Seconds of non-idle activity
    pub active_duration: f64,
}

/// Totals over `[since, until]`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub total_activities: i64,
    pub idle_activities: i64,
    pub active_duration: f64,
    /// App with the most non-idle time; ties go to the earlier name
    pub most_active_app: Option<String>,
    /// Most active first
    pub apps: Vec<AppUsage>,
}

fn column(spec: &TableSpec, field: &str) -> Result<&'static str> {
    spec.column_for_field(field)
        .map(|c| c.column)
        .ok_or_else(|| StorageError::InvalidInput(format!("no column for '{}'", field)))
}

impl Store {
    /// Summarize activity between `since` and `until`, both inclusive.
    ///
    /// `None` when the activity table cannot be read or the window is
    /// inverted; an empty window gives zero totals.
    pub fn activity_summary(
        &mut self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Option<ActivitySummary> {
        if !self.ensure_connection() {
            return None;
        }
        match self.try_activity_summary(since, until) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(error = %e, "Activity summary failed");
                None
            }
        }
    }

    pub fn try_activity_summary(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<ActivitySummary> {
        if since > until {
            return Err(StorageError::InvalidInput(format!(
                "window starts after it ends ({} > {})",
                since, until
            )));
        }
        let spec = EntityKind::Activity.spec();
        let app = column(spec, "appName")?;
        let duration = column(spec, "duration")?;
        let idle = column(spec, "isIdle")?;

        let sql = format!(
            "SELECT {app},
                    COUNT(*),
                    SUM(CASE WHEN COALESCE({idle}, 0) <> 0 THEN 1 ELSE 0 END),
                    COALESCE(SUM(CASE WHEN COALESCE({idle}, 0) <> 0 THEN 0
                                      ELSE COALESCE({duration}, 0) END), 0.0)
             FROM {table}
             WHERE {ts} >= ?1 AND {ts} <= ?2
             GROUP BY {app}",
            app = app,
            idle = idle,
            duration = duration,
            table = spec.table,
            ts = TIMESTAMP_COLUMN,
        );

        let conn = self.db.conn()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(StorageError::StatementPrepareFailure)?;
        let rows = stmt.query_map(
            params![to_reference_seconds(since), to_reference_seconds(until)],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            },
        )?;

        let mut summary = ActivitySummary {
            since,
            until,
            total_activities: 0,
            idle_activities: 0,
            active_duration: 0.0,
            most_active_app: None,
            apps: Vec::new(),
        };
        for row in rows {
            let (name, activities, idle_count, active) = row?;
            summary.total_activities += activities;
            summary.idle_activities += idle_count;
            summary.active_duration += active;
            if let Some(app_name) = name.filter(|n| !n.trim().is_empty()) {
                summary.apps.push(AppUsage {
                    app_name,
                    activities,
                    active_duration: active,
                });
            }
        }

        summary.apps.sort_by(|a, b| {
            b.active_duration
                .total_cmp(&a.active_duration)
                .then_with(|| a.app_name.cmp(&b.app_name))
        });
        summary.most_active_app = summary
            .apps
            .first()
            .filter(|usage| usage.active_duration > 0.0)
            .map(|usage| usage.app_name.clone());
        Ok(summary)
    }
}
