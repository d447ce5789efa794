//! # Record and Search Journey Tests
//!
//! Writes through the store and reads back through every search strategy:
//!
//! 1. **Snapshot recall**: save a "where was I" snapshot, find it by text
//! 2. **Cross-kind search**: one theme spread over every searchable kind
//! 3. **Edit and re-find**: updates move a record between search results
//! 4. **Timeline**: newest-first listing with date bounds

use cockpit_core::{
    ContextSnapshot, Decision, EntityKind, ListFilter, SearchMode, SearchOptions, Value,
};
use cockpit_e2e_tests::{TestDataFactory, TestDatabaseManager};
use chrono::Duration;

// ============================================================================
// SNAPSHOT RECALL
// ============================================================================

/// Test the "where was I" flow: snapshot, rebuild, ranked and substring recall.
#[test]
fn test_snapshot_recall_by_ranked_and_substring_search() {
    let mut db = TestDatabaseManager::new_temp();

    let id = TestDataFactory::create_snapshot(
        &mut db.store,
        "Auth flow",
        "Implementing JWT middleware",
        "/Users/x/app",
    )
    .expect("snapshot insert");

    assert_eq!(db.store.rebuild(), 5);

    let ranked = db.store.search_ranked("jwt", &SearchOptions::new());
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].id, id);
    assert_eq!(ranked[0].kind, EntityKind::ContextSnapshot);
    let snippet = ranked[0].snippet.as_deref().expect("snippet");
    assert!(snippet.contains("**JWT**"), "snippet was {snippet}");
    assert!(ranked[0].score.is_some());

    let substring = db.store.search_substring("AUTH", &SearchOptions::new());
    assert!(substring.iter().any(|hit| hit.id == id));
    assert!(substring.iter().all(|hit| hit.score.is_none()));
}

#[test]
fn test_typed_snapshot_round_trip() {
    let mut db = TestDatabaseManager::new_temp();
    let snapshot = ContextSnapshot {
        title: "Billing bug".into(),
        what_i_was_doing: Some("Tracing rounding errors".into()),
        next_steps: Some("Write a failing test".into()),
        dirty_files: vec!["src/invoice.rs".into(), "src/tax.rs".into()],
        tags: vec!["billing".into()],
        ..Default::default()
    };

    let id = db.store.insert_entity(&snapshot).expect("insert");
    let loaded: ContextSnapshot = db.store.get_entity(&id).expect("get");

    assert_eq!(loaded.title, "Billing bug");
    assert_eq!(loaded.dirty_files, snapshot.dirty_files);
    assert_eq!(loaded.tags, snapshot.tags);
    assert!(loaded.timestamp.is_some());
}

// ============================================================================
// CROSS-KIND SEARCH
// ============================================================================

#[test]
fn test_substring_search_respects_index_predicates() {
    let mut db = TestDatabaseManager::new_temp();
    let scenario = TestDataFactory::create_workday_scenario(&mut db.store);
    assert_eq!(scenario.ids.len(), 7, "{}", scenario.description);

    let hits = db.store.search_substring("auth", &SearchOptions::new());
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();

    for label in ["snapshot", "decision", "activity", "insight"] {
        assert!(ids.contains(&scenario.id(label)), "missing {label}");
    }
    assert!(!ids.contains(&scenario.id("dismissed_insight")));
    assert!(!ids.contains(&scenario.id("failed_interaction")));
}

#[test]
fn test_substring_search_reaches_unindexed_text_fields() {
    let mut db = TestDatabaseManager::new_temp();
    let scenario = TestDataFactory::create_workday_scenario(&mut db.store);

    let hits = db.store.search_substring("/users/x", &SearchOptions::new());
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, scenario.id("snapshot"));
}

#[test]
fn test_ranked_search_across_kinds_is_deterministic() {
    let mut db = TestDatabaseManager::new_temp();
    let scenario = TestDataFactory::create_workday_scenario(&mut db.store);

    let first = db.store.search_ranked("jwt", &SearchOptions::new());
    let second = db.store.search_ranked("jwt", &SearchOptions::new());
    assert_eq!(first, second);

    let kinds: Vec<EntityKind> = first.iter().map(|h| h.kind).collect();
    assert!(kinds.contains(&EntityKind::ContextSnapshot));
    assert!(kinds.contains(&EntityKind::Decision));
    assert!(kinds.contains(&EntityKind::AiInteraction));
    assert!(first.iter().all(|h| h.id != scenario.id("failed_interaction")));

    // Lower bm25 is better
    let scores: Vec<f64> = first.iter().filter_map(|h| h.score).collect();
    assert!(scores.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_kind_filter_and_limit() {
    let mut db = TestDatabaseManager::new_temp();
    TestDataFactory::create_workday_scenario(&mut db.store);

    let only_decisions = db.store.search(
        "auth",
        SearchMode::Unified,
        &SearchOptions::new().kinds([EntityKind::Decision]),
    );
    assert_eq!(only_decisions.len(), 1);
    assert_eq!(only_decisions[0].kind, EntityKind::Decision);

    let limited = db
        .store
        .search("auth", SearchMode::Substring, &SearchOptions::new().limit(2));
    assert_eq!(limited.len(), 2);
}

#[test]
fn test_blank_query_returns_nothing_in_every_mode() {
    let mut db = TestDatabaseManager::new_temp();
    TestDataFactory::create_workday_scenario(&mut db.store);

    for mode in [SearchMode::Substring, SearchMode::Ranked, SearchMode::Unified] {
        for query in ["", "   ", "\t\n"] {
            assert!(db.store.search(query, mode, &SearchOptions::new()).is_empty());
        }
    }
}

// ============================================================================
// EDIT AND RE-FIND
// ============================================================================

#[test]
fn test_update_refreshes_ranked_results() {
    let mut db = TestDatabaseManager::new_temp();
    let id = TestDataFactory::create_decision(&mut db.store, "Adopt JWT", "Stateless sessions")
        .expect("insert");

    let mut changes = cockpit_core::FieldMap::new();
    changes.insert("title".into(), Value::from("Adopt PASETO"));
    assert!(db.store.update(EntityKind::Decision, &id, changes));

    let options = SearchOptions::new().kinds([EntityKind::Decision]);
    assert!(db.store.search_ranked("jwt", &options).is_empty());
    let hits = db.store.search_ranked("paseto", &options);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, id);

    let typed: Decision = db.store.get_entity(&id).expect("typed get");
    assert_eq!(typed.title, "Adopt PASETO");
    assert_eq!(typed.rationale.as_deref(), Some("Stateless sessions"));
}

#[test]
fn test_dismissing_an_insight_removes_it_from_ranked_search() {
    let mut db = TestDatabaseManager::new_temp();
    let id = TestDataFactory::create_insight(&mut db.store, "Context switching", "Slack every 4 minutes", false)
        .expect("insert");
    let options = SearchOptions::new().kinds([EntityKind::Insight]);
    assert_eq!(db.store.search_ranked("slack", &options).len(), 1);

    let mut changes = cockpit_core::FieldMap::new();
    changes.insert("isDismissed".into(), Value::Bool(true));
    assert!(db.store.update(EntityKind::Insight, &id, changes));

    assert!(db.store.search_ranked("slack", &options).is_empty());
    assert!(db.store.search_substring("slack", &options).is_empty());
    assert!(db.store.get(EntityKind::Insight, &id).is_some());
}

// ============================================================================
// TIMELINE
// ============================================================================

#[test]
fn test_list_is_newest_first_with_date_bounds() {
    let mut db = TestDatabaseManager::new_temp();
    let ids = TestDataFactory::create_activity_batch(&mut db.store, 5, "Xcode");
    assert_eq!(ids.len(), 5);

    let newest = db.store.list(EntityKind::Activity, &ListFilter::new(), 3);
    let listed: Vec<&str> = newest.iter().filter_map(|r| r["id"].as_str()).collect();
    assert_eq!(listed, vec![ids[4].as_str(), ids[3].as_str(), ids[2].as_str()]);

    let base = TestDataFactory::base_time();
    let window = ListFilter::new()
        .since(base + Duration::minutes(1))
        .until(base + Duration::minutes(3));
    let bounded = db.store.list(EntityKind::Activity, &window, 10);
    assert_eq!(bounded.len(), 3);

    let search_window = SearchOptions::new()
        .since(base + Duration::minutes(4))
        .kinds([EntityKind::Activity]);
    let recent = db.store.search_substring("xcode", &search_window);
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, ids[4]);
}

#[test]
fn test_activity_summary_over_the_timeline() {
    let mut db = TestDatabaseManager::new_temp();
    TestDataFactory::create_activity_batch(&mut db.store, 5, "Xcode");
    TestDataFactory::create_activity(&mut db.store, "Safari", "Docs", 2).unwrap();

    let base = TestDataFactory::base_time();
    let summary = db
        .store
        .activity_summary(base, base + Duration::minutes(2))
        .expect("summary");
    assert_eq!(summary.total_activities, 4);
    assert_eq!(summary.idle_activities, 0);
    assert_eq!(summary.active_duration, 240.0);
    assert_eq!(summary.most_active_app.as_deref(), Some("Xcode"));
    assert_eq!(summary.apps.len(), 2);
    assert_eq!(summary.apps[0].activities, 3);
}
