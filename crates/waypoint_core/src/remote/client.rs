//! Backend client seam for remote persistence.
//!
//! # Responsibility
//! - Describe the record-level operations a cloud backend offers.
//! - Carry backend-specific failures as a closed enum so the remote store can
//!   normalize them.
//!
//! # Invariants
//! - Clients are injected explicitly; there is no shared static handle.
//! - `is_available` is cheap and is checked before every store operation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Backend-native record: type name, record name (the entity id), and fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    pub record_type: String,
    pub record_name: String,
    pub fields: Map<String, Value>,
}

/// One page of a listing plus the cursor for the next one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPage {
    pub records: Vec<RemoteRecord>,
    /// `None` once the backend has no further pages.
    pub next_cursor: Option<String>,
}

/// Failure codes reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("account not authenticated")]
    NotAuthenticated,
    #[error("network unavailable")]
    NetworkUnavailable,
    #[error("unknown item")]
    UnknownItem,
    #[error("rejected by server: {0}")]
    Rejected(String),
    #[error("{0}")]
    Other(String),
}

/// Per-record outcome of a batch write.
pub type RecordResult = Result<RemoteRecord, BackendError>;

/// Record-level API of a remote backend.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Whether an account is signed in and the service is reachable.
    async fn is_available(&self) -> bool;

    async fn fetch_record(
        &self,
        record_type: &str,
        record_name: &str,
    ) -> Result<RemoteRecord, BackendError>;

    /// Lists one page of `record_type`. `cursor = None` requests the first page.
    /// `limit` caps the page length; a backend may return fewer records.
    async fn query_page(
        &self,
        record_type: &str,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<RecordPage, BackendError>;

    /// Writes a batch. The outer error fails the whole request; the inner
    /// results report each record in input order.
    async fn save_records(
        &self,
        records: Vec<RemoteRecord>,
    ) -> Result<Vec<RecordResult>, BackendError>;

    async fn delete_record(&self, record_type: &str, record_name: &str)
        -> Result<(), BackendError>;
}
