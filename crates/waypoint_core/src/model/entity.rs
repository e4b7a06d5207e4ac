//! Shared entity contract.
//!
//! # Responsibility
//! - Describe what the repository and sync layers need from a record:
//!   identity, timestamps, validation, and a natural display order.
//! - Name each collection (file stem, remote record type).
//!
//! # Invariants
//! - `id` is assigned once and never reused for a different record.
//! - `updated_at` is the only input to conflict resolution.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;
use uuid::Uuid;

/// Stable identifier shared by every entity type.
pub type EntityId = Uuid;

/// The four independent collections managed by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Trip,
    Event,
    DailyTask,
    DailyRoutine,
}

impl EntityKind {
    /// File stem of the local collection blob.
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::Trip => "trips",
            Self::Event => "events",
            Self::DailyTask => "daily_tasks",
            Self::DailyRoutine => "daily_routines",
        }
    }

    /// Record type name used by the remote backend.
    pub fn record_type(self) -> &'static str {
        match self {
            Self::Trip => "Trip",
            Self::Event => "Event",
            Self::DailyTask => "DailyTask",
            Self::DailyRoutine => "DailyRoutine",
        }
    }

    pub fn all() -> [EntityKind; 4] {
        [
            Self::Trip,
            Self::Event,
            Self::DailyRoutine,
            Self::DailyTask,
        ]
    }

    /// Parses a file stem or record type name.
    pub fn parse(value: &str) -> Option<EntityKind> {
        let normalized = value.trim();
        Self::all().into_iter().find(|kind| {
            kind.file_stem() == normalized || kind.record_type() == normalized
        })
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_stem())
    }
}

/// Model-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("id must not be nil")]
    NilId,
    #[error("`{field}` must not be blank")]
    BlankField { field: &'static str },
    #[error("`{end_field}` must not be earlier than `{start_field}`")]
    ReversedRange {
        start_field: &'static str,
        end_field: &'static str,
    },
    #[error("routine must be scheduled on at least one weekday")]
    NoWeekdays,
}

/// Contract every stored record fulfils.
pub trait Entity:
    Clone + PartialEq + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: EntityKind;

    fn id(&self) -> EntityId;
    fn updated_at(&self) -> DateTime<Utc>;
    fn set_updated_at(&mut self, at: DateTime<Utc>);

    /// Checks type-specific invariants before persistence.
    fn validate(&self) -> Result<(), ValidationError>;

    /// Presentation order used by `fetch_all` on local stores.
    fn display_order(&self, other: &Self) -> Ordering;
}

/// Entities with a natural calendar-day axis.
pub trait DatedEntity: Entity {
    fn date(&self) -> NaiveDate;
}

pub(crate) fn ensure_id(id: EntityId) -> Result<(), ValidationError> {
    if id.is_nil() {
        return Err(ValidationError::NilId);
    }
    Ok(())
}

pub(crate) fn ensure_not_blank(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField { field });
    }
    Ok(())
}
