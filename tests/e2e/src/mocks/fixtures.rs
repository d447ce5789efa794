//! Test Data Factory
//!
//! Provides utilities for generating realistic tracker records:
//! - Field maps for each record kind
//! - Batch generation with spaced timestamps
//! - Pre-built scenarios for common test cases

use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use cockpit_core::{EntityKind, FieldMap, Store, Value};

/// Factory for creating test records
///
/// # Example
///
/// ```rust,ignore
/// let mut db = TestDatabaseManager::new_temp();
///
/// let id = TestDataFactory::create_decision(&mut db.store, "Adopt JWT", "Stateless auth");
/// let scenario = TestDataFactory::create_workday_scenario(&mut db.store);
/// ```
pub struct TestDataFactory;

/// Scenario containing related test data
#[derive(Debug)]
pub struct Scenario {
    /// Record ids keyed by a short label
    pub ids: HashMap<&'static str, String>,
    /// Description of the scenario
    pub description: String,
}

impl Scenario {
    pub fn id(&self, label: &str) -> &str {
        self.ids.get(label).map(String::as_str).unwrap_or_default()
    }
}

/// Build a field map from `(field, value)` pairs
pub fn fields<const N: usize>(pairs: [(&str, Value); N]) -> FieldMap {
    pairs
        .into_iter()
        .map(|(field, value)| (field.to_string(), value))
        .collect()
}

impl TestDataFactory {
    /// Fixed base instant so ordering assertions are stable
    pub fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn at(minutes: i64) -> Value {
        Value::from((Self::base_time() + Duration::minutes(minutes)).to_rfc3339())
    }

    // ========================================================================
    // SINGLE RECORD CREATION
    // ========================================================================

    pub fn create_snapshot(store: &mut Store, title: &str, doing: &str, project: &str) -> Option<String> {
        store.insert(
            EntityKind::ContextSnapshot,
            fields([
                ("title", title.into()),
                ("whatIWasDoing", doing.into()),
                ("projectPath", project.into()),
            ]),
        )
    }

    pub fn create_decision(store: &mut Store, title: &str, rationale: &str) -> Option<String> {
        store.insert(
            EntityKind::Decision,
            fields([("title", title.into()), ("rationale", rationale.into())]),
        )
    }

    pub fn create_activity(store: &mut Store, app: &str, window: &str, minutes: i64) -> Option<String> {
        store.insert(
            EntityKind::Activity,
            fields([
                ("appName", app.into()),
                ("windowTitle", window.into()),
                ("timestamp", Self::at(minutes)),
                ("duration", Value::Double(60.0)),
            ]),
        )
    }

    pub fn create_insight(store: &mut Store, title: &str, content: &str, dismissed: bool) -> Option<String> {
        store.insert(
            EntityKind::Insight,
            fields([
                ("title", title.into()),
                ("content", content.into()),
                ("isDismissed", Value::Bool(dismissed)),
            ]),
        )
    }

    pub fn create_interaction(store: &mut Store, prompt: &str, response: &str, status: &str) -> Option<String> {
        store.insert(
            EntityKind::AiInteraction,
            fields([
                ("prompt", prompt.into()),
                ("response", response.into()),
                ("status", status.into()),
                ("provider", "local".into()),
            ]),
        )
    }

    // ========================================================================
    // BATCH CREATION
    // ========================================================================

    /// Create `count` activities one minute apart; ids are returned oldest first.
    pub fn create_activity_batch(store: &mut Store, count: usize, app: &str) -> Vec<String> {
        (0..count)
            .filter_map(|i| {
                Self::create_activity(store, app, &format!("{} window {}", app, i), i as i64)
            })
            .collect()
    }

    // ========================================================================
    // SCENARIOS
    // ========================================================================

    /// One record of every searchable kind around an authentication theme
    pub fn create_workday_scenario(store: &mut Store) -> Scenario {
        let mut ids = HashMap::new();

        let entries = [
            (
                "snapshot",
                Self::create_snapshot(store, "Auth flow", "Implementing JWT middleware", "/Users/x/app"),
            ),
            (
                "decision",
                Self::create_decision(store, "Adopt JWT for sessions", "Stateless auth across services"),
            ),
            (
                "activity",
                Self::create_activity(store, "Safari", "OAuth 2.0 spec - RFC 6749", 5),
            ),
            (
                "insight",
                Self::create_insight(store, "Deep work peaks before noon", "Most auth commits land 9-12", false),
            ),
            (
                "dismissed_insight",
                Self::create_insight(store, "Auth meetings run long", "Dismissed by the user", true),
            ),
            (
                "interaction",
                Self::create_interaction(store, "Explain JWT refresh tokens", "Refresh tokens extend sessions", "completed"),
            ),
            (
                "failed_interaction",
                Self::create_interaction(store, "Summarize auth logs", "", "failed"),
            ),
        ];
        for (label, id) in entries {
            if let Some(id) = id {
                ids.insert(label, id);
            }
        }

        Scenario {
            ids,
            description: "Authentication work across every searchable kind".to_string(),
        }
    }
}
