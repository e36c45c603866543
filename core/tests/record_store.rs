//! Record Store tests.
//!
//! Tests cover: point lookup, upsert round trips, leaderboard ordering and
//! limits, play time and balance adjustment, the login flow, and
//! concurrent writers.

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use std::thread;
use tinypg_core::{
    player::MAX_PLAY_TIME_MINUTES, ConnectionManager, PersistError, PlayerRecord, RecordStore, SessionError, StorageConfig,
};

fn build() -> RecordStore {
    let _ = env_logger::builder().is_test(true).try_init();
    let manager = ConnectionManager::open(&StorageConfig::embedded(":memory:"))
        .expect("open in-memory storage");
    RecordStore::new(Arc::new(manager))
}

fn player(id: &str, name: &str, balance: f64) -> PlayerRecord {
    let seen = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();
    let mut p = PlayerRecord::new(id, name, seen);
    p.balance = balance;
    p
}

#[test]
fn unknown_id_is_absent() {
    let store = build();
    assert_eq!(store.find_by_id("never-seen").unwrap(), None);
}

#[test]
fn upsert_then_find_returns_identical_record() {
    let store = build();
    let mut record = player("uuid-a", "Alex", -12.75);
    record.play_time_minutes = 4_321;
    record.last_seen_at = Utc.timestamp_millis_opt(1_717_171_717_123).unwrap();

    let persisted = store.upsert(&record).unwrap();
    assert_eq!(persisted, record);
    assert_eq!(store.find_by_id("uuid-a").unwrap(), Some(record));
}

#[test]
fn upsert_overwrites_all_mutable_fields() {
    let store = build();
    store.upsert(&player("uuid-a", "Alex", 10.0)).unwrap();

    let mut changed = player("uuid-a", "Alex_2", 42.5);
    changed.play_time_minutes = 77;
    changed.last_seen_at += Duration::days(3);
    let persisted = store.upsert(&changed).unwrap();

    assert_eq!(persisted, changed);
    assert_eq!(store.top_by_balance(10).unwrap().len(), 1);
}

#[test]
fn add_play_time_accumulates_and_clamps_at_zero() {
    let store = build();
    let mut record = player("uuid-a", "Alex", 0.0);
    record.play_time_minutes = 20;
    store.upsert(&record).unwrap();

    store.add_play_time("uuid-a", 30).unwrap();
    assert_eq!(store.find_by_id("uuid-a").unwrap().unwrap().play_time_minutes, 50);

    store.add_play_time("uuid-a", -10).unwrap();
    assert_eq!(store.find_by_id("uuid-a").unwrap().unwrap().play_time_minutes, 40);

    // max(0, 40 - 100) = 0
    store.add_play_time("uuid-a", -100).unwrap();
    assert_eq!(store.find_by_id("uuid-a").unwrap().unwrap().play_time_minutes, 0);
}

#[test]
fn add_play_time_for_unknown_id_is_a_noop() {
    let store = build();
    store.add_play_time("ghost", 30).unwrap();
    assert_eq!(store.find_by_id("ghost").unwrap(), None);
}

#[test]
fn add_balance_allows_negative_and_reports_unknown() {
    let store = build();
    store.upsert(&player("uuid-a", "Alex", 5.0)).unwrap();

    assert_eq!(store.add_balance("uuid-a", -7.5).unwrap(), Some(-2.5));
    assert_eq!(store.find_by_id("uuid-a").unwrap().unwrap().balance, -2.5);
    assert_eq!(store.add_balance("ghost", 100.0).unwrap(), None);
}

#[test]
fn non_finite_balance_delta_is_rejected_without_effect() {
    let store = build();
    store.upsert(&player("uuid-a", "Alex", 5.0)).unwrap();

    let err = store.add_balance("uuid-a", f64::NAN).unwrap_err();
    assert!(matches!(err, PersistError::Transaction(SessionError::Aborted(_))));
    assert_eq!(store.find_by_id("uuid-a").unwrap().unwrap().balance, 5.0);
}

#[test]
fn balance_overflow_is_rejected_without_effect() {
    let store = build();
    store.upsert(&player("uuid-a", "Alex", f64::MAX)).unwrap();

    let err = store.add_balance("uuid-a", f64::MAX).unwrap_err();
    assert!(
        matches!(err, PersistError::Transaction(SessionError::Aborted(_))),
        "got {err:?}"
    );
    assert_eq!(store.find_by_id("uuid-a").unwrap().unwrap().balance, f64::MAX);
}

#[test]
fn play_time_beyond_storable_range_is_rejected() {
    let store = build();
    let mut record = player("uuid-a", "Alex", 0.0);
    record.play_time_minutes = MAX_PLAY_TIME_MINUTES + 1;

    let err = store.upsert(&record).unwrap_err();
    assert!(
        matches!(err, PersistError::Transaction(SessionError::Aborted(_))),
        "got {err:?}"
    );
    assert_eq!(store.find_by_id("uuid-a").unwrap(), None);
}

#[test]
fn play_time_saturates_and_round_trips_at_maximum() {
    let store = build();
    let mut record = player("uuid-a", "Alex", 0.0);
    record.play_time_minutes = MAX_PLAY_TIME_MINUTES - 10;
    store.upsert(&record).unwrap();

    store.add_play_time("uuid-a", 60).unwrap();
    let stored = store.find_by_id("uuid-a").unwrap().unwrap();
    assert_eq!(stored.play_time_minutes, MAX_PLAY_TIME_MINUTES);

    store.add_play_time("uuid-a", -5).unwrap();
    let stored = store.find_by_id("uuid-a").unwrap().unwrap();
    assert_eq!(stored.play_time_minutes, MAX_PLAY_TIME_MINUTES - 5);
}

#[test]
fn top_by_balance_with_non_positive_limit_is_empty() {
    let store = build();
    store.upsert(&player("uuid-a", "Alex", 5.0)).unwrap();
    assert!(store.top_by_balance(0).unwrap().is_empty());
    assert!(store.top_by_balance(-3).unwrap().is_empty());
}

#[test]
fn top_by_balance_is_bounded_and_non_increasing() {
    let store = build();
    let balances = [12.0, -4.0, 300.5, 0.0, 88.0, 88.0, 7.25];
    for (i, balance) in balances.iter().enumerate() {
        store
            .upsert(&player(&format!("uuid-{i}"), &format!("P{i}"), *balance))
            .unwrap();
    }

    for k in [1_i64, 3, 7, 50] {
        let top = store.top_by_balance(k).unwrap();
        assert_eq!(top.len(), (k as usize).min(balances.len()), "limit {k}");
        assert!(
            top.windows(2).all(|w| w[0].balance >= w[1].balance),
            "limit {k} not sorted: {:?}",
            top.iter().map(|p| p.balance).collect::<Vec<_>>()
        );
    }
    assert_eq!(store.top_by_balance(1).unwrap()[0].balance, 300.5);
}

#[test]
fn alice_bob_carol_scenario() {
    let store = build();

    let p1 = player("p1", "Alice", 0.0);
    store.upsert(&p1).unwrap();
    assert_eq!(store.find_by_id("p1").unwrap(), Some(p1));

    store.add_play_time("p1", 30).unwrap();
    assert_eq!(store.find_by_id("p1").unwrap().unwrap().play_time_minutes, 30);

    store.upsert(&player("p2", "Bob", 100.0)).unwrap();
    store.upsert(&player("p3", "Carol", 50.0)).unwrap();

    let ids: Vec<_> = store
        .top_by_balance(2)
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, ["p2", "p3"]);
}

#[test]
fn record_login_creates_then_refreshes() {
    let store = build();
    let first = Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0).unwrap();
    let second = first + Duration::hours(5);

    let outcome = store.record_login("uuid-a", "Alex", first).unwrap();
    assert!(outcome.first_seen);
    assert_eq!(outcome.record, PlayerRecord::new("uuid-a", "Alex", first));

    store.add_balance("uuid-a", 15.0).unwrap();
    store.add_play_time("uuid-a", 60).unwrap();

    let outcome = store.record_login("uuid-a", "AlexRenamed", second).unwrap();
    assert!(!outcome.first_seen);
    assert_eq!(outcome.record.display_name, "AlexRenamed");
    assert_eq!(outcome.record.last_seen_at, second);
    assert_eq!(outcome.record.balance, 15.0);
    assert_eq!(outcome.record.play_time_minutes, 60);
}

/// Two writers race on one id. The survivor is one of the two records,
/// never a mix of their fields.
#[test]
fn concurrent_upserts_of_same_id_are_last_write_wins() {
    let store = build();
    store.upsert(&player("uuid-a", "Original", 0.0)).unwrap();

    let mut red = player("uuid-a", "Red", 1.0);
    red.play_time_minutes = 100;
    let mut blue = player("uuid-a", "Blue", 2.0);
    blue.play_time_minutes = 200;

    for _ in 0..20 {
        let writers: Vec<_> = [red.clone(), blue.clone()]
            .into_iter()
            .map(|record| {
                let store = store.clone();
                thread::spawn(move || store.upsert(&record).unwrap())
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }

        let survivor = store.find_by_id("uuid-a").unwrap().unwrap();
        assert!(
            survivor == red || survivor == blue,
            "fields from both writers mixed: {survivor:?}"
        );
    }
}

#[test]
fn closed_storage_surfaces_not_connected() {
    let store = build();
    store.manager().shutdown();
    assert!(matches!(
        store.find_by_id("uuid-a"),
        Err(PersistError::NotConnected { .. })
    ));
    // limit <= 0 never touches storage.
    assert!(store.top_by_balance(0).unwrap().is_empty());
}
