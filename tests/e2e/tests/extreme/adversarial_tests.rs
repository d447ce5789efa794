//! # Adversarial Tests
//!
//! Hostile queries, odd stored data and degraded schemas. Nothing here may
//! panic; every call answers with data or a neutral empty result.

use chrono::{TimeZone, Utc};
use cockpit_core::{EntityKind, FieldMap, ListFilter, SearchMode, SearchOptions, Value};
use cockpit_e2e_tests::{TestDataFactory, TestDatabaseManager};
use rusqlite::types::Value as SqlValue;

// ============================================================================
// QUERY SYNTAX
// ============================================================================

#[test]
fn test_fts_syntax_in_queries_never_errors() {
    let mut db = TestDatabaseManager::new_temp();
    TestDataFactory::create_workday_scenario(&mut db.store);

    let hostile = [
        "\"unbalanced",
        "jwt OR",
        "(",
        "*",
        "NEAR(auth",
        "-auth",
        "title:jwt",
        "^auth",
        "AND OR NOT",
        "'; DROP TABLE ZDECISION; --",
        "🔐",
    ];
    for query in hostile {
        for mode in [SearchMode::Substring, SearchMode::Ranked, SearchMode::Unified] {
            let _ = db.store.search(query, mode, &SearchOptions::new());
        }
    }

    // Still intact
    assert_eq!(db.store.count(EntityKind::Decision), 1);
    assert!(!db.store.search_ranked("jwt", &SearchOptions::new()).is_empty());
}

#[test]
fn test_operator_characters_are_stripped_from_ranked_queries() {
    let mut db = TestDatabaseManager::new_temp();
    let id = TestDataFactory::create_decision(&mut db.store, "Adopt JWT", "").unwrap();

    let hits = db
        .store
        .search_ranked("(jwt*", &SearchOptions::new().kinds([EntityKind::Decision]));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, id);
}

#[test]
fn test_substring_wildcards_match_literally() {
    let mut db = TestDatabaseManager::new_temp();
    let literal = TestDataFactory::create_decision(&mut db.store, "Reached 100%_done", "").unwrap();
    TestDataFactory::create_decision(&mut db.store, "Reached 100XdoneY", "").unwrap();

    let options = SearchOptions::new().kinds([EntityKind::Decision]);
    let hits = db.store.search_substring("100%_done", &options);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, literal);

    let filter = ListFilter::new().contains("title", "100%_");
    assert_eq!(db.store.list(EntityKind::Decision, &filter, 10).len(), 1);
}

#[test]
fn test_sql_text_is_stored_verbatim() {
    let mut db = TestDatabaseManager::new_temp();
    let nasty = "Robert'); DROP TABLE ZDECISION;--";
    let id = TestDataFactory::create_decision(&mut db.store, nasty, "").unwrap();

    let record = db.store.get(EntityKind::Decision, &id).unwrap();
    assert_eq!(record["title"], Value::from(nasty));
    assert_eq!(db.store.count(EntityKind::Decision), 1);
}

#[test]
fn test_diacritics_fold_in_ranked_search() {
    let mut db = TestDatabaseManager::new_temp();
    let id = TestDataFactory::create_decision(&mut db.store, "Meet at the café", "").unwrap();

    let hits = db
        .store
        .search_ranked("cafe", &SearchOptions::new().kinds([EntityKind::Decision]));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, id);
}

// ============================================================================
// ODD STORED DATA
// ============================================================================

#[test]
fn test_malformed_list_blob_decodes_to_empty_list() {
    let mut db = TestDatabaseManager::new_temp();
    let id = db.producer_insert(
        EntityKind::ContextSnapshot,
        &[
            ("ZTITLE", SqlValue::Text("Corrupt tags".into())),
            ("ZTAGS", SqlValue::Blob(b"\x00not json".to_vec())),
        ],
        None,
    );

    let record = db.store.get(EntityKind::ContextSnapshot, &id).unwrap();
    assert_eq!(record["title"], Value::from("Corrupt tags"));
    assert_eq!(record["tags"], Value::StringArray(vec![]));
}

#[test]
fn test_integer_timestamps_decode() {
    let mut db = TestDatabaseManager::new_temp();
    let id = db.producer_insert(
        EntityKind::Activity,
        &[("ZAPPNAME", SqlValue::Text("Finder".into()))],
        None,
    );
    // Overwrite with an INTEGER offset: 2026-01-01T00:00:00Z
    let seconds = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap().timestamp() - 978_307_200;
    db.producer_exec(&format!("UPDATE ZACTIVITY SET ZTIMESTAMP = {} WHERE ZID = '{}';", seconds, id));

    let record = db.store.get(EntityKind::Activity, &id).unwrap();
    let timestamp = record["timestamp"].as_str().unwrap();
    assert!(timestamp.starts_with("2026-01-01T00:00:00"), "got {timestamp}");
}

#[test]
fn test_rows_without_zid_are_not_indexed() {
    let mut db = TestDatabaseManager::new_temp();
    db.producer_exec("INSERT INTO ZDECISION (Z_PK, Z_ENT, ZTITLE) VALUES (900, 6, 'Anonymous row');");

    assert_eq!(db.store.rebuild(), 5);
    assert_eq!(db.shadow_count(EntityKind::Decision), Some(0));
    assert!(db.store.search_ranked("anonymous", &SearchOptions::new()).is_empty());
}

// ============================================================================
// BAD INPUT
// ============================================================================

#[test]
fn test_bad_inputs_are_absorbed() {
    let mut db = TestDatabaseManager::new_temp();

    // Required field blank
    let mut fields = FieldMap::new();
    fields.insert("title".into(), Value::from("   "));
    assert!(db.store.insert(EntityKind::Decision, fields).is_none());

    // Wrong type for a typed column
    let mut fields = FieldMap::new();
    fields.insert("appName".into(), Value::from("Xcode"));
    fields.insert("duration".into(), Value::from("a while"));
    assert!(db.store.insert(EntityKind::Activity, fields).is_none());

    // Unknown filter field
    let filter = ListFilter::new().contains("noSuchField", "x");
    assert!(db.store.list(EntityKind::Activity, &filter, 10).is_empty());

    // Update of a missing record
    let mut fields = FieldMap::new();
    fields.insert("title".into(), Value::from("Ghost"));
    assert!(!db.store.update(EntityKind::Decision, "missing-id", fields));

    assert_eq!(db.store.count(EntityKind::Decision), 0);
    assert_eq!(db.store.count(EntityKind::Activity), 0);
}

#[test]
fn test_duplicate_ids_are_rejected() {
    let mut db = TestDatabaseManager::new_temp();
    let mut fields = FieldMap::new();
    fields.insert("id".into(), Value::from("fixed-id"));
    fields.insert("title".into(), Value::from("First"));
    assert_eq!(db.store.insert(EntityKind::Decision, fields.clone()).as_deref(), Some("fixed-id"));

    fields.insert("title".into(), Value::from("Second"));
    assert!(db.store.insert(EntityKind::Decision, fields).is_none());
    assert_eq!(
        db.store.get(EntityKind::Decision, "fixed-id").unwrap()["title"],
        Value::from("First")
    );
}

#[test]
fn test_empty_database_answers_neutrally() {
    let mut db = TestDatabaseManager::new_without_schema();

    assert!(db.store.get(EntityKind::Decision, "x").is_none());
    assert!(db.store.list(EntityKind::Decision, &ListFilter::new(), 10).is_empty());
    assert_eq!(db.store.count(EntityKind::Decision), 0);
    for mode in [SearchMode::Substring, SearchMode::Ranked, SearchMode::Unified] {
        assert!(db.store.search("anything", mode, &SearchOptions::new()).is_empty());
    }
    assert_eq!(db.store.rebuild(), 0);
    assert_eq!(db.store.reconcile(), 0);
}
