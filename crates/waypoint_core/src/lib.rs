//! Core domain logic for Waypoint.
//!
//! Entities are persisted per type in a local JSON store and mirrored to a
//! remote record store; a sync pass reconciles the two with last-write-wins.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod remote;
pub mod repo;
pub mod service;
pub mod settings;
pub mod sync;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::daily_routine::DailyRoutine;
pub use model::daily_task::DailyTask;
pub use model::entity::{DatedEntity, Entity, EntityId, EntityKind, ValidationError};
pub use model::event::Event;
pub use model::trip::Trip;
pub use remote::{BackendError, InMemoryRemoteClient, RemoteClient, RemoteStore};
pub use repo::{LocalStore, LocalStores, RepoError, RepoResult, Repository};
pub use service::DailyPlanService;
pub use settings::{SettingsError, SettingsStore};
pub use sync::{SyncCoordinator, SyncError, SyncStatus};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
