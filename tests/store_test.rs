// tests/store_test.rs — Integration test: SQLite round-trip

use std::sync::Arc;

use chrono::{FixedOffset, TimeZone};
use pretty_assertions::assert_eq;
use serde_json::json;

use foresight::core::types::{ActionKind, Payload};
use foresight::engine::{MiningReport, PredictiveEngine};
use foresight::infra::config::EngineConfig;
use foresight::memory::schema;
use foresight::memory::{SqliteStorage, StorageAdapter};
use foresight::patterns::{ManualClock, StaticContextProvider};

fn payload(value: serde_json::Value) -> Payload {
    value.as_object().cloned().unwrap_or_default()
}

fn engine_on(storage: Arc<SqliteStorage>, config: EngineConfig) -> (PredictiveEngine, Arc<ManualClock>) {
    let start = FixedOffset::west_opt(5 * 3600)
        .unwrap()
        .with_ymd_and_hms(2026, 3, 4, 8, 30, 0)
        .unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let engine = PredictiveEngine::builder(config)
        .storage(storage)
        .clock(clock.clone())
        .context_provider(Arc::new(StaticContextProvider::new(Some(600), "/today")))
        .build();
    (engine, clock)
}

#[test]
fn test_engine_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("nested").join("foresight.db");

    let (history, patterns) = {
        let storage = Arc::new(SqliteStorage::open(&db).unwrap());
        let (engine, clock) = engine_on(storage, EngineConfig::default());
        for i in 0..6 {
            clock.advance(chrono::Duration::seconds(90));
            engine.record_action(
                ActionKind::TaskInteraction,
                payload(json!({ "action": "complete", "title": format!("Task {i}"), "score": 0.25 })),
            );
            clock.advance(chrono::Duration::milliseconds(1234));
            engine.record_action(ActionKind::TimeSpent, payload(json!({ "duration": 12.5 })));
        }
        assert!(matches!(engine.run_mining_pass(), MiningReport::Merged(_)));
        (engine.action_history(), engine.behavior_patterns())
    };
    assert!(!patterns.is_empty());

    let storage = Arc::new(SqliteStorage::open(&db).unwrap());
    assert_eq!(storage.count_actions().unwrap(), 12);
    let (engine, _) = engine_on(storage, EngineConfig::default());
    assert_eq!(engine.action_history(), history);
    assert_eq!(engine.behavior_patterns(), patterns);
}

#[test]
fn test_persisted_actions_are_capped() {
    let storage = Arc::new(SqliteStorage::in_memory().unwrap());
    let config = EngineConfig {
        max_persisted_actions: 4,
        ..Default::default()
    };
    let (engine, clock) = engine_on(storage.clone(), config);

    let mut ids = Vec::new();
    for _ in 0..7 {
        clock.advance(chrono::Duration::minutes(1));
        ids.push(engine.record_action(ActionKind::GestureUse, Payload::new()).id);
    }

    // Memory keeps everything; storage only the newest four
    assert_eq!(engine.action_history().len(), 7);
    let stored: Vec<String> = storage
        .load()
        .unwrap()
        .actions
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(stored, ids[3..].to_vec());
}

#[test]
fn test_flush_and_clear() {
    let storage = Arc::new(SqliteStorage::in_memory().unwrap());
    let (engine, clock) = engine_on(storage.clone(), EngineConfig::default());
    for _ in 0..10 {
        clock.advance(chrono::Duration::minutes(2));
        engine.record_action(ActionKind::PageNavigation, payload(json!({ "to": "/today" })));
    }
    engine.run_mining_pass();
    engine.flush().unwrap();

    let state = storage.load().unwrap();
    assert_eq!(state.actions, engine.action_history());
    assert_eq!(state.patterns, engine.behavior_patterns());

    engine.clear_learning_data();
    let state = storage.load().unwrap();
    assert!(state.actions.is_empty());
    assert!(state.patterns.is_empty());
    assert!(state.marker.is_none());
}

#[test]
fn test_reopen_does_not_merge_same_log_twice() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("foresight.db");

    let patterns = {
        let storage = Arc::new(SqliteStorage::open(&db).unwrap());
        let (engine, clock) = engine_on(storage, EngineConfig::default());
        for _ in 0..6 {
            clock.advance(chrono::Duration::minutes(3));
            engine.record_action(ActionKind::PageNavigation, payload(json!({ "to": "/today" })));
            engine.record_action(ActionKind::TaskInteraction, payload(json!({ "action": "complete" })));
        }
        assert!(matches!(engine.run_mining_pass(), MiningReport::Merged(_)));
        engine.behavior_patterns()
    };
    assert!(!patterns.is_empty());

    for _ in 0..2 {
        let storage = Arc::new(SqliteStorage::open(&db).unwrap());
        let (engine, _) = engine_on(storage.clone(), EngineConfig::default());
        assert_eq!(engine.run_mining_pass(), MiningReport::Unchanged);
        assert_eq!(engine.behavior_patterns(), patterns);
        assert_eq!(storage.load().unwrap().patterns, patterns);
    }
}

#[test]
fn test_migrations_idempotent_and_reversible() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    schema::run_migrations(&conn).unwrap();
    schema::run_migrations(&conn).unwrap();
    assert_eq!(schema::current_version(&conn).unwrap(), 2);

    schema::rollback_to(&conn, 0).unwrap();
    assert_eq!(schema::current_version(&conn).unwrap(), 0);
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
             AND name IN ('actions', 'patterns', 'engine_meta')",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(tables, 0);
}
