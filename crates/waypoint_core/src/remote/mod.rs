//! Remote persistence: backend client seam, record mapping, and the
//! repository implementation over it.
//!
//! # Invariants
//! - Backend failures leave this module only as `RepoError` variants.
//! - Remote operations hold no local lock; concurrent requests are allowed.

pub mod client;
pub mod memory;
pub mod record;
pub mod store;

pub use client::{BackendError, RecordPage, RecordResult, RemoteClient, RemoteRecord};
pub use memory::{InMemoryRemoteClient, RemoteWrite};
pub use store::RemoteStore;
