//! Repository contract shared by local and remote stores.
//!
//! # Responsibility
//! - Define the uniform CRUD surface (`fetch_all`, `fetch`, `save`, `delete`)
//!   so local and remote stores are interchangeable to callers.
//! - Define the error taxonomy every implementation surfaces.
//!
//! # Invariants
//! - `save` is an upsert keyed by id and never moves `updated_at` backwards.
//! - `delete` of an absent id succeeds.
//! - Write paths validate the entity before mutating anything.

use crate::model::entity::{Entity, EntityId, ValidationError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod local_store;
pub mod stores;

pub use local_store::LocalStore;
pub use stores::LocalStores;

/// Boxed underlying cause carried by load/save/delete failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error taxonomy surfaced by every repository implementation.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("record not found: {0}")]
    NotFound(EntityId),
    #[error("failed to load records: {0}")]
    LoadFailed(#[source] BoxError),
    #[error("failed to save record: {0}")]
    SaveFailed(#[source] BoxError),
    #[error("failed to delete record: {0}")]
    DeleteFailed(#[source] BoxError),
    #[error("remote account is not signed in")]
    NotAuthenticated,
    #[error("remote service is unreachable")]
    NetworkUnavailable,
    #[error("remote record could not be converted: {0}")]
    ConversionFailed(String),
    #[error("remote operation failed: {0}")]
    OperationFailed(String),
}

impl RepoError {
    /// Stable short code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::LoadFailed(_) => "load_failed",
            Self::SaveFailed(_) => "save_failed",
            Self::DeleteFailed(_) => "delete_failed",
            Self::NotAuthenticated => "not_authenticated",
            Self::NetworkUnavailable => "network_unavailable",
            Self::ConversionFailed(_) => "conversion_failed",
            Self::OperationFailed(_) => "operation_failed",
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::SaveFailed(Box::new(value))
    }
}

/// Uniform CRUD capability implemented by every store of one entity type.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Returns every known record, draining any pagination.
    async fn fetch_all(&self) -> RepoResult<Vec<E>>;

    /// Returns one record or `RepoError::NotFound`.
    async fn fetch(&self, id: EntityId) -> RepoResult<E>;

    /// Upserts by id, stamping `updated_at` (see [`stamp_updated_at`]).
    async fn save(&self, entity: E) -> RepoResult<E>;

    /// Upserts by id keeping the caller's `updated_at` verbatim.
    ///
    /// Sync writes go through here so both sides converge on the same
    /// timestamp and the next pass sees a tie.
    async fn save_replica(&self, entity: E) -> RepoResult<E>;

    /// Removes the record if present. Absent ids are not an error.
    async fn delete(&self, id: EntityId) -> RepoResult<()>;
}

/// Picks the timestamp `save` writes: the latest of now, the incoming value,
/// and the currently stored value.
pub fn stamp_updated_at(
    now: DateTime<Utc>,
    incoming: DateTime<Utc>,
    stored: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    let mut stamped = now.max(incoming);
    if let Some(stored) = stored {
        stamped = stamped.max(stored);
    }
    stamped
}
