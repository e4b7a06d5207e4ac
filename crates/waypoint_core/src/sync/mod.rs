//! Local/remote reconciliation.
//!
//! `orchestrator` reconciles one entity type per call; `coordinator` owns the
//! enablement flag, run lifecycle and published status.

pub mod coordinator;
pub mod error;
pub mod orchestrator;

pub use coordinator::{SyncCoordinator, SyncStatus};
pub use error::{SyncError, SyncSide};
pub use orchestrator::{plan, ReconcileReport, SyncAction, SyncOrchestrator, SyncTarget};
