//! # Producer Sharing Journey Tests
//!
//! The tracker app writes the same database file from another process. These
//! tests drive a second connection as that producer and check the store copes:
//!
//! 1. **Drift**: producer rows are invisible to ranked search until rebuild
//! 2. **Schema discovery**: entity tags are found at runtime, never assumed
//! 3. **Reconcile**: producer deletes leave orphans that reconcile removes
//! 4. **Persistence**: records survive reopening the store
//! 5. **Locking**: a producer write lock fails store writes after the busy
//!    timeout while reads keep answering

use std::time::{Duration, Instant};

use cockpit_core::{EntityKind, FieldMap, ListFilter, SearchMode, SearchOptions, Value, fixture};
use cockpit_e2e_tests::{TestDataFactory, TestDatabaseManager};
use rusqlite::types::Value as SqlValue;

fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}

// ============================================================================
// DRIFT
// ============================================================================

#[test]
fn test_producer_rows_need_rebuild_for_ranked_search() {
    let mut db = TestDatabaseManager::new_temp();
    let id = db.producer_insert(
        EntityKind::Decision,
        &[("ZTITLE", text("Move CI to self-hosted runners"))],
        None,
    );

    let options = SearchOptions::new().kinds([EntityKind::Decision]);
    assert!(db.store.search_ranked("runners", &options).is_empty());

    // Unified falls back to the scan, which reads the primary table
    let unified = db.store.search("runners", SearchMode::Unified, &options);
    assert_eq!(unified.len(), 1);
    assert_eq!(unified[0].id, id);
    assert!(unified[0].score.is_none());

    assert_eq!(db.store.rebuild(), 5);
    let ranked = db.store.search_ranked("runners", &options);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].id, id);
    assert!(ranked[0].snippet.as_deref().unwrap().contains("**runners**"));
}

#[test]
fn test_rebuild_is_idempotent() {
    let mut db = TestDatabaseManager::new_temp();
    TestDataFactory::create_workday_scenario(&mut db.store);
    db.producer_insert(EntityKind::Activity, &[("ZAPPNAME", text("Terminal"))], None);

    assert_eq!(db.store.rebuild(), 5);
    let first = db.store.shadow_counts();
    assert_eq!(db.store.rebuild(), 5);
    assert_eq!(db.store.shadow_counts(), first);

    // Excluded rows stay out of the shadow tables
    assert_eq!(db.shadow_count(EntityKind::Insight), Some(1));
    assert_eq!(db.shadow_count(EntityKind::AiInteraction), Some(1));
    assert_eq!(db.shadow_count(EntityKind::Activity), Some(2));
}

#[test]
fn test_rebuild_survives_a_missing_table() {
    let mut db = TestDatabaseManager::new_temp();
    TestDataFactory::create_decision(&mut db.store, "Keep going", "Other kinds still index");
    db.producer_exec("DROP TABLE ZINSIGHT;");

    assert_eq!(db.store.rebuild(), 4);
    assert_eq!(db.shadow_count(EntityKind::Decision), Some(1));
    assert_eq!(db.shadow_count(EntityKind::Insight), Some(0));
}

// ============================================================================
// SCHEMA DISCOVERY
// ============================================================================

#[test]
fn test_unknown_entity_yields_not_found_and_insert_returns_none() {
    let mut db = TestDatabaseManager::new_temp();
    {
        let conn = db.producer();
        fixture::unregister_entity(&conn, EntityKind::Decision).unwrap();
    }
    db.producer_exec("DELETE FROM ZDECISION;");

    assert_eq!(db.store.entity_type(EntityKind::Decision), None);

    let mut fields = FieldMap::new();
    fields.insert("title".into(), Value::from("Nowhere to go"));
    assert_eq!(db.store.insert(EntityKind::Decision, fields), None);
    assert_eq!(db.store.count(EntityKind::Decision), 0);
}

#[test]
fn test_entity_tag_discovered_after_producer_initializes_schema() {
    let mut db = TestDatabaseManager::new_without_schema();
    assert_eq!(db.store.entity_type(EntityKind::Insight), None);
    assert!(TestDataFactory::create_insight(&mut db.store, "Too early", "", false).is_none());

    fixture::create_primary_schema(&db.producer()).unwrap();

    // The earlier miss was not cached
    assert_eq!(db.store.entity_type(EntityKind::Insight), Some(fixture::entity_tag(EntityKind::Insight)));
    let id = TestDataFactory::create_insight(&mut db.store, "Now it works", "Schema is there", false)
        .expect("insert after schema exists");
    assert!(db.store.get(EntityKind::Insight, &id).is_some());
}

#[test]
fn test_tag_from_existing_rows_when_metadata_lacks_it() {
    let mut db = TestDatabaseManager::new_temp();
    db.producer_insert(EntityKind::Activity, &[("ZAPPNAME", text("Mail"))], None);
    fixture::unregister_entity(&db.producer(), EntityKind::Activity).unwrap();

    assert_eq!(
        db.store.entity_type(EntityKind::Activity),
        Some(fixture::entity_tag(EntityKind::Activity))
    );
}

#[test]
fn test_store_inserts_interleave_with_producer_inserts() {
    let mut db = TestDatabaseManager::new_temp();
    let producer_id = db.producer_insert(EntityKind::Decision, &[("ZTITLE", text("From app"))], None);
    let store_id = TestDataFactory::create_decision(&mut db.store, "From gateway", "").expect("insert");
    let second_producer_id = db.producer_insert(EntityKind::Decision, &[("ZTITLE", text("App again"))], None);

    assert_eq!(db.store.count(EntityKind::Decision), 3);
    for id in [&producer_id, &store_id, &second_producer_id] {
        assert!(db.store.get(EntityKind::Decision, id).is_some());
    }

    let conn = db.producer();
    let (max_pk, z_max): (i64, i64) = conn
        .query_row(
            "SELECT (SELECT MAX(Z_PK) FROM ZDECISION), Z_MAX FROM Z_PRIMARYKEY WHERE Z_NAME = 'Decision'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert!(max_pk >= 3);
    assert!(z_max >= 2, "store insert must advance Z_MAX");

    let tags: Vec<i64> = conn
        .prepare("SELECT DISTINCT Z_ENT FROM ZDECISION")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(tags, vec![fixture::entity_tag(EntityKind::Decision)]);
}

// ============================================================================
// RECONCILE
// ============================================================================

#[test]
fn test_reconcile_removes_rows_the_producer_deleted() {
    let mut db = TestDatabaseManager::new_temp();
    let keep = TestDataFactory::create_decision(&mut db.store, "Keep me", "").unwrap();
    let gone = TestDataFactory::create_decision(&mut db.store, "Delete me", "").unwrap();
    db.producer_delete(EntityKind::Decision, &gone);

    let options = SearchOptions::new().kinds([EntityKind::Decision]);
    assert_eq!(db.shadow_count(EntityKind::Decision), Some(2));
    // Orphans never surface: ranked search joins back to the primary table
    let hits = db.store.search_ranked("delete", &options);
    assert!(hits.is_empty());

    assert_eq!(db.store.reconcile(), 1);
    assert_eq!(db.shadow_count(EntityKind::Decision), Some(1));
    assert_eq!(db.store.search_ranked("keep", &options)[0].id, keep);
    assert_eq!(db.store.reconcile(), 0);
}

// ============================================================================
// PERSISTENCE
// ============================================================================

#[test]
fn test_records_and_index_survive_reopen() {
    let mut db = TestDatabaseManager::new_temp();
    let id = TestDataFactory::create_snapshot(&mut db.store, "Release prep", "Writing changelog", "/repo")
        .unwrap();

    db.reopen();

    assert_eq!(db.store.get(EntityKind::ContextSnapshot, &id).unwrap()["title"], Value::from("Release prep"));
    let hits = db.store.search_ranked("changelog", &SearchOptions::new());
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, id);
}

#[test]
fn test_disconnect_heals_on_next_call() {
    let mut db = TestDatabaseManager::new_temp();
    let id = TestDataFactory::create_decision(&mut db.store, "Survive a drop", "").unwrap();

    db.store.disconnect();
    assert!(db.store.get(EntityKind::Decision, &id).is_some());
    assert!(db.store.database().is_open());
}

#[test]
fn test_database_runs_in_wal_mode() {
    let db = TestDatabaseManager::new_temp();
    let mode: String = db
        .producer()
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

// ============================================================================
// LOCKING
// ============================================================================

#[test]
fn test_producer_write_lock_fails_store_writes_but_not_reads() {
    let timeout = Duration::from_millis(200);
    let mut db = TestDatabaseManager::new_temp_with_busy_timeout(timeout);
    let committed = TestDataFactory::create_decision(&mut db.store, "Ship the exporter", "").unwrap();

    let producer = db.producer();
    producer
        .execute_batch(&format!(
            "BEGIN IMMEDIATE;
             INSERT INTO ZDECISION (Z_PK, Z_ENT, Z_OPT, ZID, ZTITLE, ZTIMESTAMP)
             VALUES (500, {}, 1, 'PENDING-ROW', 'Pending producer row', 0);",
            fixture::entity_tag(EntityKind::Decision)
        ))
        .unwrap();

    // No retry past the busy timeout
    let started = Instant::now();
    let blocked = TestDataFactory::create_decision(&mut db.store, "Blocked write", "");
    let elapsed = started.elapsed();
    assert!(blocked.is_none());
    assert!(elapsed >= timeout / 2, "gave up after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "waited {elapsed:?}");

    // Readers see committed data while the producer holds the lock
    let options = SearchOptions::new().kinds([EntityKind::Decision]);
    let hits = db.store.search_substring("exporter", &options);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, committed);
    assert!(db.store.search_substring("pending", &options).is_empty());
    let listed = db.store.list(EntityKind::Decision, &ListFilter::new(), 10);
    assert_eq!(listed.len(), 1);

    producer.execute_batch("COMMIT;").unwrap();

    let after = TestDataFactory::create_decision(&mut db.store, "Write after commit", "");
    assert!(after.is_some());
    assert_eq!(db.store.count(EntityKind::Decision), 3);
    assert!(db.store.get(EntityKind::Decision, "PENDING-ROW").is_some());
}
