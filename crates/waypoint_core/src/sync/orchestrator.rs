//! Per-type reconciliation between a local and a remote repository.
//!
//! # Responsibility
//! - Fetch both sides, walk the union of ids, and copy the newer record onto
//!   the stale side (last-write-wins on `updated_at`).
//!
//! # Invariants
//! - Equal timestamps are a no-op; neither side is written.
//! - Deletions are never propagated. A record missing on one side is treated
//!   as not yet copied there.
//! - Cancellation is polled before fetching and before each id. Writes already
//!   applied stay applied.
//! - The first failing id aborts the rest of the pass for this type.
//! - Writes use `save_replica`, so both sides end with identical timestamps.

use crate::model::entity::{Entity, EntityId, EntityKind};
use crate::repo::Repository;
use crate::sync::error::SyncError;
use async_trait::async_trait;
use log::{debug, info};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// What a pass does for one id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Local is newer or only local has it.
    Push,
    /// Remote is newer or only remote has it.
    Pull,
    /// Timestamps tie, or neither side has the id.
    Skip,
}

/// Decides the action for one id from its local and remote versions.
pub fn plan<E: Entity>(local: Option<&E>, remote: Option<&E>) -> SyncAction {
    match (local, remote) {
        (Some(local), Some(remote)) => {
            if local.updated_at() > remote.updated_at() {
                SyncAction::Push
            } else if remote.updated_at() > local.updated_at() {
                SyncAction::Pull
            } else {
                SyncAction::Skip
            }
        }
        (Some(_), None) => SyncAction::Push,
        (None, Some(_)) => SyncAction::Pull,
        (None, None) => SyncAction::Skip,
    }
}

/// Counts of what one reconciliation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub kind: EntityKind,
    pub pushed: usize,
    pub pulled: usize,
    pub unchanged: usize,
}

impl ReconcileReport {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            pushed: 0,
            pulled: 0,
            unchanged: 0,
        }
    }

    pub fn writes(&self) -> usize {
        self.pushed + self.pulled
    }
}

/// Type-erased unit of a sync pass, so one pass can walk several entity types.
#[async_trait]
pub trait SyncTarget: Send + Sync {
    fn kind(&self) -> EntityKind;
    async fn reconcile(&self, token: &CancellationToken) -> Result<ReconcileReport, SyncError>;
}

/// Reconciles one entity type between two repositories.
pub struct SyncOrchestrator<E: Entity> {
    local: Arc<dyn Repository<E>>,
    remote: Arc<dyn Repository<E>>,
}

impl<E: Entity> SyncOrchestrator<E> {
    pub fn new(local: Arc<dyn Repository<E>>, remote: Arc<dyn Repository<E>>) -> Self {
        Self { local, remote }
    }

    /// Runs one pass for `E`.
    pub async fn run(&self, token: &CancellationToken) -> Result<ReconcileReport, SyncError> {
        let kind = E::KIND;
        if token.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let started_at = Instant::now();
        let local_records = self
            .local
            .fetch_all()
            .await
            .map_err(|source| SyncError::local(kind, None, source))?;
        let remote_records = self
            .remote
            .fetch_all()
            .await
            .map_err(|source| SyncError::remote(kind, None, source))?;

        let local_by_id = index_by_id(local_records);
        let remote_by_id = index_by_id(remote_records);
        let ids: BTreeSet<EntityId> = local_by_id
            .keys()
            .chain(remote_by_id.keys())
            .copied()
            .collect();

        let mut report = ReconcileReport::new(kind);
        for id in ids {
            if token.is_cancelled() {
                info!(
                    "event=sync_reconcile module=sync status=cancelled kind={} pushed={} pulled={}",
                    kind, report.pushed, report.pulled
                );
                return Err(SyncError::Cancelled);
            }

            let local = local_by_id.get(&id);
            let remote = remote_by_id.get(&id);
            match plan(local, remote) {
                SyncAction::Push => {
                    if let Some(record) = local {
                        self.remote
                            .save_replica(record.clone())
                            .await
                            .map_err(|source| SyncError::remote(kind, Some(id), source))?;
                        report.pushed += 1;
                        debug!(
                            "event=sync_push module=sync status=ok kind={} id={}",
                            kind, id
                        );
                    }
                }
                SyncAction::Pull => {
                    if let Some(record) = remote {
                        self.local
                            .save_replica(record.clone())
                            .await
                            .map_err(|source| SyncError::local(kind, Some(id), source))?;
                        report.pulled += 1;
                        debug!(
                            "event=sync_pull module=sync status=ok kind={} id={}",
                            kind, id
                        );
                    }
                }
                SyncAction::Skip => report.unchanged += 1,
            }
        }

        info!(
            "event=sync_reconcile module=sync status=ok kind={} pushed={} pulled={} unchanged={} duration_ms={}",
            kind,
            report.pushed,
            report.pulled,
            report.unchanged,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }
}

#[async_trait]
impl<E: Entity> SyncTarget for SyncOrchestrator<E> {
    fn kind(&self) -> EntityKind {
        E::KIND
    }

    async fn reconcile(&self, token: &CancellationToken) -> Result<ReconcileReport, SyncError> {
        self.run(token).await
    }
}

fn index_by_id<E: Entity>(records: Vec<E>) -> HashMap<EntityId, E> {
    records
        .into_iter()
        .map(|record| (record.id(), record))
        .collect()
}
