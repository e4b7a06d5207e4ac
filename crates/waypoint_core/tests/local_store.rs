use chrono::{Duration, NaiveDate, TimeZone, Utc};
use std::error::Error;
use waypoint_core::{
    DailyTask, Entity, Event, LocalStore, LocalStores, RepoError, Repository, Trip,
    ValidationError,
};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
}

fn trip(name: &str) -> Trip {
    Trip::new(name, "Porto", day(10), day(14))
}

#[tokio::test]
async fn save_then_fetch_roundtrips_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::<Trip>::in_dir(dir.path());

    let mut original = trip("Spring break");
    original.notes = "pack sunscreen".to_string();
    let saved = store.save(original.clone()).await.unwrap();
    let loaded = store.fetch(original.id).await.unwrap();

    assert_eq!(loaded, saved);
    assert!(loaded.updated_at >= original.updated_at);
    let mut expected = original.clone();
    expected.updated_at = loaded.updated_at;
    assert_eq!(loaded, expected);
}

#[tokio::test]
async fn missing_file_is_an_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::<Event>::in_dir(dir.path());

    assert!(store.fetch_all().await.unwrap().is_empty());
    assert!(!store.path().exists());
}

#[tokio::test]
async fn fetch_of_unknown_id_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::<Trip>::in_dir(dir.path());
    let id = uuid::Uuid::new_v4();

    let err = store.fetch(id).await.unwrap_err();
    assert!(matches!(err, RepoError::NotFound(missing) if missing == id));
}

#[tokio::test]
async fn delete_is_idempotent_and_skips_write_for_absent_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::<Trip>::in_dir(dir.path());

    store.delete(uuid::Uuid::new_v4()).await.unwrap();
    assert!(!store.path().exists());

    let saved = store.save(trip("Weekend")).await.unwrap();
    store.delete(saved.id).await.unwrap();
    store.delete(saved.id).await.unwrap();
    assert!(store.fetch_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_file_is_load_failed() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::<Trip>::in_dir(dir.path());
    std::fs::write(store.path(), b"{ not json").unwrap();

    let err = store.fetch_all().await.unwrap_err();
    assert_eq!(err.code(), "load_failed");
    assert!(err.source().is_some());
}

#[tokio::test]
async fn collection_is_a_camel_case_json_array() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::<Trip>::in_dir(dir.path());
    let saved = store.save(trip("Coast")).await.unwrap();

    assert_eq!(store.path(), dir.path().join("trips.json"));
    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
    let records = raw.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], saved.id.to_string());
    assert_eq!(records[0]["startDate"], "2026-05-10");
    assert!(records[0].get("updatedAt").is_some());
    assert!(!dir.path().join("trips.json.tmp").exists());
}

#[tokio::test]
async fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let saved = {
        let stores = LocalStores::open(dir.path());
        stores.trips.save(trip("Alps")).await.unwrap()
    };

    let reopened = LocalStores::open(dir.path());
    assert_eq!(reopened.trips.fetch(saved.id).await.unwrap(), saved);
    assert!(reopened.events.fetch_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_temp_file_is_ignored_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::<Trip>::in_dir(dir.path());
    let saved = store.save(trip("Lakes")).await.unwrap();
    std::fs::write(dir.path().join("trips.json.tmp"), b"garbage").unwrap();

    let reopened = LocalStore::<Trip>::in_dir(dir.path());
    assert_eq!(reopened.fetch_all().await.unwrap(), vec![saved]);
}

#[tokio::test]
async fn invalid_entity_is_rejected_without_touching_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::<Trip>::in_dir(dir.path());

    let reversed = Trip::new("Backwards", "Nowhere", day(9), day(2));
    let err = store.save(reversed).await.unwrap_err();
    assert_eq!(err.code(), "save_failed");
    let cause = err
        .source()
        .and_then(|source| source.downcast_ref::<ValidationError>());
    assert!(matches!(cause, Some(ValidationError::ReversedRange { .. })));
    assert!(!store.path().exists());
}

#[tokio::test]
async fn save_never_lowers_updated_at() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::<Trip>::in_dir(dir.path());

    let mut ahead = trip("Future");
    ahead.updated_at = Utc::now() + Duration::hours(2);
    let saved = store.save(ahead.clone()).await.unwrap();
    assert_eq!(saved.updated_at, ahead.updated_at);

    let mut stale = saved.clone();
    stale.updated_at = Utc::now() - Duration::days(1);
    stale.name = "Renamed".to_string();
    let resaved = store.save(stale).await.unwrap();
    assert_eq!(resaved.updated_at, ahead.updated_at);
    assert_eq!(resaved.name, "Renamed");
}

#[tokio::test]
async fn save_replica_keeps_timestamp_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::<Trip>::in_dir(dir.path());

    let mut old = trip("Archive");
    old.updated_at = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let saved = store.save_replica(old.clone()).await.unwrap();
    assert_eq!(saved, old);
    assert_eq!(store.fetch(old.id).await.unwrap().updated_at, old.updated_at);
}

#[tokio::test]
async fn fetch_by_date_and_delete_older_than() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::<DailyTask>::in_dir(dir.path());

    let early = store.save(DailyTask::new("early", day(1))).await.unwrap();
    let mut first = DailyTask::new("first", day(3));
    let mut second = DailyTask::new("second", day(3));
    first.created_at = Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap();
    second.created_at = first.created_at + Duration::minutes(5);
    let second = store.save(second).await.unwrap();
    let first = store.save(first).await.unwrap();
    let late = store.save(DailyTask::new("late", day(5))).await.unwrap();

    let on_third = store.fetch_by_date(day(3)).await.unwrap();
    assert_eq!(
        on_third.iter().map(Entity::id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );

    assert_eq!(store.delete_older_than(day(3)).await.unwrap(), 1);
    assert!(matches!(
        store.fetch(early.id).await,
        Err(RepoError::NotFound(_))
    ));
    assert!(store.fetch(late.id).await.is_ok());

    let modified = std::fs::metadata(store.path()).unwrap().modified().unwrap();
    assert_eq!(store.delete_older_than(day(2)).await.unwrap(), 0);
    assert_eq!(
        std::fs::metadata(store.path()).unwrap().modified().unwrap(),
        modified
    );

    let reopened = LocalStore::<DailyTask>::in_dir(dir.path());
    assert_eq!(reopened.fetch_all().await.unwrap().len(), 3);
}

#[tokio::test]
async fn events_are_dated_by_their_start_day() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::<Event>::in_dir(dir.path());

    let morning = Utc.with_ymd_and_hms(2026, 5, 3, 9, 30, 0).unwrap();
    let event = store.save(Event::new("Museum", morning)).await.unwrap();

    assert_eq!(store.fetch_by_date(day(3)).await.unwrap(), vec![event]);
    assert!(store.fetch_by_date(day(4)).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_saves_are_all_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let stores = LocalStores::open(dir.path());

    let mut handles = Vec::new();
    for n in 0..16 {
        let store = stores.daily_tasks.clone();
        handles.push(tokio::spawn(async move {
            store.save(DailyTask::new(format!("task {n}"), day(7))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let reopened = LocalStores::open(dir.path());
    assert_eq!(reopened.daily_tasks.fetch_all().await.unwrap().len(), 16);
}
