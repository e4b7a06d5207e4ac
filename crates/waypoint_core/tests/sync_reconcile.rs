use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use waypoint_core::sync::{SyncError, SyncOrchestrator, SyncSide};
use waypoint_core::{
    BackendError, EntityId, InMemoryRemoteClient, LocalStore, RemoteStore, RepoResult, Repository,
    Trip,
};

/// Local repository wrapper that counts writes and can cancel a token after
/// the first one.
struct CountingRepo {
    inner: Arc<LocalStore<Trip>>,
    writes: AtomicUsize,
    cancel_after_first_write: Option<CancellationToken>,
}

impl CountingRepo {
    fn new(inner: Arc<LocalStore<Trip>>) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
            cancel_after_first_write: None,
        }
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_after_first_write {
            token.cancel();
        }
    }
}

#[async_trait]
impl Repository<Trip> for CountingRepo {
    async fn fetch_all(&self) -> RepoResult<Vec<Trip>> {
        self.inner.fetch_all().await
    }

    async fn fetch(&self, id: EntityId) -> RepoResult<Trip> {
        self.inner.fetch(id).await
    }

    async fn save(&self, entity: Trip) -> RepoResult<Trip> {
        let saved = self.inner.save(entity).await?;
        self.record_write();
        Ok(saved)
    }

    async fn save_replica(&self, entity: Trip) -> RepoResult<Trip> {
        let saved = self.inner.save_replica(entity).await?;
        self.record_write();
        Ok(saved)
    }

    async fn delete(&self, id: EntityId) -> RepoResult<()> {
        self.inner.delete(id).await
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    local_store: Arc<LocalStore<Trip>>,
    local: Arc<CountingRepo>,
    client: Arc<InMemoryRemoteClient>,
    orchestrator: SyncOrchestrator<Trip>,
}

impl Fixture {
    fn new() -> Self {
        Self::build(None)
    }

    fn cancelling_after_first_local_write(token: CancellationToken) -> Self {
        Self::build(Some(token))
    }

    fn build(cancel_after_first_write: Option<CancellationToken>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let local_store = Arc::new(LocalStore::<Trip>::in_dir(dir.path()));
        let mut counting = CountingRepo::new(local_store.clone());
        counting.cancel_after_first_write = cancel_after_first_write;
        let local = Arc::new(counting);
        let client = Arc::new(InMemoryRemoteClient::new(2));
        let orchestrator =
            SyncOrchestrator::new(local.clone(), Arc::new(RemoteStore::<Trip>::new(client.clone())));
        Self {
            _dir: dir,
            local_store,
            local,
            client,
            orchestrator,
        }
    }

    async fn seed_local(&self, trip: &Trip) {
        self.local_store.save_replica(trip.clone()).await.unwrap();
    }

    fn seed_remote(&self, trip: &Trip) {
        self.client.seed(trip).unwrap();
    }

    fn remote(&self, id: EntityId) -> Option<Trip> {
        self.client.get::<Trip>(id).map(|result| result.unwrap())
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap()
}

fn trip_at(name: &str, updated_at: DateTime<Utc>) -> Trip {
    let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let mut trip = Trip::new(name, "Rome", start, start + Duration::days(3));
    trip.created_at = t0() - Duration::days(1);
    trip.updated_at = updated_at;
    trip
}

fn newer_copy(trip: &Trip, name: &str, seconds: i64) -> Trip {
    let mut copy = trip.clone();
    copy.name = name.to_string();
    copy.updated_at = trip.updated_at + Duration::seconds(seconds);
    copy
}

#[tokio::test]
async fn newer_local_record_is_pushed() {
    let fx = Fixture::new();
    let remote = trip_at("old name", t0());
    let local = newer_copy(&remote, "new name", 30);
    fx.seed_local(&local).await;
    fx.seed_remote(&remote);

    let report = fx.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!((report.pushed, report.pulled, report.unchanged), (1, 0, 0));
    assert_eq!(fx.remote(local.id), Some(local.clone()));
    assert_eq!(fx.local_store.fetch(local.id).await.unwrap(), local);
    assert_eq!(fx.local.writes(), 0);
}

#[tokio::test]
async fn newer_remote_record_is_pulled() {
    let fx = Fixture::new();
    let local = trip_at("old name", t0());
    let remote = newer_copy(&local, "new name", 30);
    fx.seed_local(&local).await;
    fx.seed_remote(&remote);

    let report = fx.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!((report.pushed, report.pulled, report.unchanged), (0, 1, 0));
    assert_eq!(fx.local_store.fetch(local.id).await.unwrap(), remote);
    assert_eq!(fx.client.save_count(), 0);
}

#[tokio::test]
async fn equal_timestamps_write_nothing() {
    let fx = Fixture::new();
    let local = trip_at("local wording", t0());
    let mut remote = local.clone();
    remote.name = "remote wording".to_string();
    fx.seed_local(&local).await;
    fx.seed_remote(&remote);

    let report = fx.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.unchanged, 1);
    assert_eq!(report.writes(), 0);
    assert_eq!(fx.local.writes(), 0);
    assert!(fx.client.writes().is_empty());
    assert_eq!(fx.local_store.fetch(local.id).await.unwrap().name, "local wording");
    assert_eq!(fx.remote(local.id).unwrap().name, "remote wording");
}

#[tokio::test]
async fn one_sided_records_end_up_on_both_sides() {
    let fx = Fixture::new();
    let local_only = trip_at("local only", t0());
    let remote_only = trip_at("remote only", t0() + Duration::seconds(5));
    fx.seed_local(&local_only).await;
    fx.seed_remote(&remote_only);

    let report = fx.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!((report.pushed, report.pulled), (1, 1));
    assert_eq!(fx.remote(local_only.id), Some(local_only.clone()));
    assert_eq!(
        fx.local_store.fetch(remote_only.id).await.unwrap(),
        remote_only
    );
}

#[tokio::test]
async fn remote_newer_and_remote_only_scenario() {
    let fx = Fixture::new();
    let local_a = trip_at("A", t0());
    let remote_a = newer_copy(&local_a, "A edited elsewhere", 10);
    let remote_b = trip_at("B", t0());
    fx.seed_local(&local_a).await;
    fx.seed_remote(&remote_a);
    fx.seed_remote(&remote_b);

    let report = fx.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!((report.pushed, report.pulled), (0, 2));
    assert_eq!(fx.local.writes(), 2);
    assert!(fx.client.writes().is_empty());

    let mut local_ids: Vec<EntityId> = fx
        .local_store
        .fetch_all()
        .await
        .unwrap()
        .into_iter()
        .map(|trip| trip.id)
        .collect();
    local_ids.sort();
    let mut expected = vec![local_a.id, remote_b.id];
    expected.sort();
    assert_eq!(local_ids, expected);
    assert_eq!(fx.local_store.fetch(local_a.id).await.unwrap(), remote_a);
    assert_eq!(fx.remote(remote_a.id), Some(remote_a));
}

#[tokio::test]
async fn second_pass_after_convergence_is_a_no_op() {
    let fx = Fixture::new();
    let local = trip_at("pushed", t0() + Duration::seconds(20));
    let remote = trip_at("pulled", t0());
    fx.seed_local(&local).await;
    fx.seed_remote(&remote);

    fx.orchestrator.run(&CancellationToken::new()).await.unwrap();
    let local_writes = fx.local.writes();
    let remote_writes = fx.client.save_count();

    let second = fx.orchestrator.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(second.writes(), 0);
    assert_eq!(second.unchanged, 2);
    assert_eq!(fx.local.writes(), local_writes);
    assert_eq!(fx.client.save_count(), remote_writes);
}

#[tokio::test]
async fn first_failing_id_aborts_the_rest() {
    let fx = Fixture::new();
    let mut trips: Vec<Trip> = (0..3)
        .map(|n| trip_at(&format!("local {n}"), t0()))
        .collect();
    trips.sort_by_key(|trip| trip.id);
    for trip in &trips {
        fx.seed_local(trip).await;
    }
    fx.client
        .fail_record(trips[0].id, BackendError::Rejected("bad record".to_string()));

    let err = fx
        .orchestrator
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        SyncError::Store { side, id, .. } => {
            assert_eq!(side, SyncSide::Remote);
            assert_eq!(id, Some(trips[0].id));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fx.client.record_count("Trip"), 0);
}

#[tokio::test]
async fn unavailable_remote_fails_the_pass() {
    let fx = Fixture::new();
    fx.seed_local(&trip_at("local", t0())).await;
    fx.client.set_available(false);

    let err = fx
        .orchestrator
        .run(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not signed in"));
    assert!(!err.is_cancelled());
}

#[tokio::test]
async fn local_deletion_is_undone_by_the_next_pass() {
    let fx = Fixture::new();
    let trip = trip_at("shared", t0());
    fx.seed_local(&trip).await;
    fx.seed_remote(&trip);

    fx.local_store.delete(trip.id).await.unwrap();
    let report = fx.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.pulled, 1);
    assert_eq!(fx.local_store.fetch(trip.id).await.unwrap(), trip);
}

#[tokio::test]
async fn cancelled_token_stops_before_fetching() {
    let fx = Fixture::new();
    fx.seed_remote(&trip_at("remote", t0()));
    let token = CancellationToken::new();
    token.cancel();

    let err = fx.orchestrator.run(&token).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(fx.client.pages_served(), 0);
    assert_eq!(fx.local.writes(), 0);
}

#[tokio::test]
async fn cancellation_mid_pass_keeps_applied_writes_and_a_readable_store() {
    let token = CancellationToken::new();
    let fx = Fixture::cancelling_after_first_local_write(token.clone());
    for n in 0..3 {
        fx.seed_remote(&trip_at(&format!("remote {n}"), t0()));
    }

    let err = fx.orchestrator.run(&token).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(fx.local.writes(), 1);
    let reopened = LocalStore::<Trip>::in_dir(fx.local_store.path().parent().unwrap());
    assert_eq!(reopened.fetch_all().await.unwrap().len(), 1);
}
