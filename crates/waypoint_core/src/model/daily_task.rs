//! Daily task record.
//!
//! # Invariants
//! - `routine_id` is a soft reference; the core does not cascade-validate it.

use crate::model::entity::{
    ensure_id, ensure_not_blank, DatedEntity, Entity, EntityId, EntityKind, ValidationError,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// One actionable item planned for a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTask {
    pub id: EntityId,
    pub title: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub is_completed: bool,
    /// Routine this task was generated from, if any.
    #[serde(default)]
    pub routine_id: Option<EntityId>,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailyTask {
    pub fn new(title: impl Into<String>, date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            date,
            is_completed: false,
            routine_id: None,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for DailyTask {
    const KIND: EntityKind = EntityKind::DailyTask;

    fn id(&self) -> EntityId {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        ensure_id(self.id)?;
        ensure_not_blank("title", &self.title)
    }

    fn display_order(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl DatedEntity for DailyTask {
    fn date(&self) -> NaiveDate {
        self.date
    }
}
