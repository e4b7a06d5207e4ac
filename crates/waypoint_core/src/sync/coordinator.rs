//! Process-wide sync policy.
//!
//! # Responsibility
//! - Gate sync passes on the persisted enablement flag.
//! - Run entity types in a fixed order and publish the outcome as a status.
//!
//! # Invariants
//! - At most one run is current. Starting a run cancels the previous one.
//! - Only the current run publishes its final status; a superseded run is
//!   silent.
//! - Cancellation ends in `Idle`, never `Failed`.
//! - Errors never escape a pass; they become `Failed(message)`.
//! - A run never starts after a disable has been acknowledged.
//! - No settings I/O happens while the run slot is locked.

use crate::config::RemoteConfig;
use crate::model::entity::Entity;
use crate::remote::{RemoteClient, RemoteStore};
use crate::repo::{LocalStore, LocalStores, Repository};
use crate::settings::{SettingsResult, SettingsStore};
use crate::sync::error::SyncError;
use crate::sync::orchestrator::{ReconcileReport, SyncOrchestrator, SyncTarget};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Observable state of the sync machinery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Syncing,
    Success,
    Failed(String),
}

struct ActiveRun {
    id: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct RunSlot {
    active: Option<ActiveRun>,
    /// Bumped by every disable; a run whose enabled check predates a bump
    /// must not start.
    disables: u64,
}

struct Inner {
    settings: Arc<SettingsStore>,
    remote: Arc<dyn RemoteClient>,
    targets: Vec<Arc<dyn SyncTarget>>,
    status: watch::Sender<SyncStatus>,
    slot: Mutex<RunSlot>,
    next_run_id: AtomicU64,
}

/// Cheap to clone; clones share one run slot and one status channel.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl SyncCoordinator {
    /// Builds a coordinator over explicit targets, reconciled in the given order.
    pub fn new(
        settings: Arc<SettingsStore>,
        remote: Arc<dyn RemoteClient>,
        targets: Vec<Arc<dyn SyncTarget>>,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);
        Self {
            inner: Arc::new(Inner {
                settings,
                remote,
                targets,
                status,
                slot: Mutex::new(RunSlot::default()),
                next_run_id: AtomicU64::new(1),
            }),
        }
    }

    /// Wires every entity type of `stores` against `remote`: trips, events,
    /// daily routines, then daily tasks. Listings use `config.page_size`.
    pub fn for_stores(
        settings: Arc<SettingsStore>,
        stores: &LocalStores,
        remote: Arc<dyn RemoteClient>,
        config: &RemoteConfig,
    ) -> Self {
        let page_size = config.page_size;
        let targets = vec![
            target(stores.trips.clone(), &remote, page_size),
            target(stores.events.clone(), &remote, page_size),
            target(stores.daily_routines.clone(), &remote, page_size),
            target(stores.daily_tasks.clone(), &remote, page_size),
        ];
        Self::new(settings, remote, targets)
    }

    pub fn is_enabled(&self) -> SettingsResult<bool> {
        self.inner.settings.sync_enabled()
    }

    /// Persists the flag. Enabling starts a run in the background and returns
    /// its handle; disabling cancels the current run.
    pub fn set_enabled(&self, enabled: bool) -> SettingsResult<Option<JoinHandle<SyncStatus>>> {
        self.inner.settings.set_sync_enabled(enabled)?;
        if enabled {
            Ok(Some(self.start_sync()))
        } else {
            let mut slot = self.slot();
            slot.disables += 1;
            self.cancel_locked(&mut slot);
            Ok(None)
        }
    }

    /// Spawns `sync` on the current tokio runtime.
    pub fn start_sync(&self) -> JoinHandle<SyncStatus> {
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.sync().await })
    }

    /// Runs one pass over every target and returns the resulting status.
    ///
    /// Does nothing when sync is disabled. A superseded run returns the status
    /// it would have published without publishing it.
    pub async fn sync(&self) -> SyncStatus {
        let disables_seen = self.slot().disables;
        match self.is_enabled() {
            Ok(true) => {}
            Ok(false) => {
                info!("event=sync_run module=sync status=skip reason=disabled");
                return self.status();
            }
            Err(err) => {
                error!(
                    "event=sync_run module=sync status=error error_code=settings_read_failed error={}",
                    err
                );
                let status = SyncStatus::Failed(err.to_string());
                let slot = self.slot();
                if slot.active.is_none() {
                    self.inner.status.send_replace(status.clone());
                }
                return status;
            }
        }

        let Some((run_id, token)) = self.begin_run(disables_seen) else {
            info!("event=sync_run module=sync status=skip reason=disabled_concurrently");
            return self.status();
        };
        let started_at = Instant::now();
        let result = self.run_pass(&token).await;
        self.finish_run(run_id, result, started_at)
    }

    /// Cancels the current run, if any, and resets status to `Idle`.
    pub fn cancel(&self) {
        let mut slot = self.slot();
        self.cancel_locked(&mut slot);
    }

    pub fn is_running(&self) -> bool {
        self.slot().active.is_some()
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    pub fn last_success_at(&self) -> SettingsResult<Option<DateTime<Utc>>> {
        self.inner.settings.last_sync_at()
    }

    /// Whether the remote account is usable. Callers may disable sync when it
    /// is not, instead of letting each pass fail.
    pub async fn is_remote_available(&self) -> bool {
        self.inner.remote.is_available().await
    }

    fn slot(&self) -> MutexGuard<'_, RunSlot> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_locked(&self, slot: &mut RunSlot) {
        if let Some(run) = slot.active.take() {
            run.token.cancel();
            info!("event=sync_cancel module=sync status=ok run_id={}", run.id);
            self.inner.status.send_replace(SyncStatus::Idle);
        }
    }

    /// Installs a new current run, superseding any previous one. Returns
    /// `None` when a disable landed after the caller read the enabled flag.
    fn begin_run(&self, disables_seen: u64) -> Option<(u64, CancellationToken)> {
        let mut slot = self.slot();
        if slot.disables != disables_seen {
            return None;
        }

        let id = self.inner.next_run_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        if let Some(previous) = slot.active.replace(ActiveRun {
            id,
            token: token.clone(),
        }) {
            previous.token.cancel();
            info!(
                "event=sync_run module=sync status=superseded run_id={} by_run_id={}",
                previous.id, id
            );
        }
        self.inner.status.send_replace(SyncStatus::Syncing);
        info!("event=sync_run module=sync status=start run_id={id}");
        Some((id, token))
    }

    async fn run_pass(&self, token: &CancellationToken) -> Result<Vec<ReconcileReport>, SyncError> {
        let mut reports = Vec::with_capacity(self.inner.targets.len());
        for target in &self.inner.targets {
            reports.push(target.reconcile(token).await?);
        }
        Ok(reports)
    }

    fn is_current(&self, run_id: u64) -> bool {
        self.slot()
            .active
            .as_ref()
            .is_some_and(|run| run.id == run_id)
    }

    fn finish_run(
        &self,
        run_id: u64,
        result: Result<Vec<ReconcileReport>, SyncError>,
        started_at: Instant,
    ) -> SyncStatus {
        let duration_ms = started_at.elapsed().as_millis();

        let status = match result {
            Ok(reports) => {
                let pushed: usize = reports.iter().map(|report| report.pushed).sum();
                let pulled: usize = reports.iter().map(|report| report.pulled).sum();
                let recorded = if self.is_current(run_id) {
                    self.inner.settings.set_last_sync_at(Utc::now())
                } else {
                    Ok(())
                };
                match recorded {
                    Ok(()) => {
                        info!(
                            "event=sync_run module=sync status=ok run_id={} types={} pushed={} pulled={} duration_ms={}",
                            run_id,
                            reports.len(),
                            pushed,
                            pulled,
                            duration_ms
                        );
                        SyncStatus::Success
                    }
                    Err(err) => {
                        error!(
                            "event=sync_run module=sync status=error run_id={} error_code=settings_write_failed error={}",
                            run_id, err
                        );
                        SyncStatus::Failed(err.to_string())
                    }
                }
            }
            Err(SyncError::Cancelled) => {
                info!(
                    "event=sync_run module=sync status=cancelled run_id={} duration_ms={}",
                    run_id, duration_ms
                );
                SyncStatus::Idle
            }
            Err(err) => {
                warn!(
                    "event=sync_run module=sync status=error run_id={} duration_ms={} error={}",
                    run_id, duration_ms, err
                );
                SyncStatus::Failed(err.to_string())
            }
        };

        let mut slot = self.slot();
        if slot.active.as_ref().is_some_and(|run| run.id == run_id) {
            slot.active = None;
            self.inner.status.send_replace(status.clone());
        }
        status
    }
}

fn target<E: Entity>(
    local: Arc<LocalStore<E>>,
    remote: &Arc<dyn RemoteClient>,
    page_size: usize,
) -> Arc<dyn SyncTarget> {
    let remote: Arc<dyn Repository<E>> =
        Arc::new(RemoteStore::<E>::with_page_size(Arc::clone(remote), page_size));
    Arc::new(SyncOrchestrator::new(local, remote))
}
