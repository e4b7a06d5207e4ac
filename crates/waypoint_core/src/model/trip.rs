//! Trip record.

use crate::model::entity::{ensure_id, ensure_not_blank, Entity, EntityId, EntityKind, ValidationError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// A planned journey spanning one or more days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: EntityId,
    pub name: String,
    pub destination: String,
    pub start_date: NaiveDate,
    /// Inclusive. Must not be earlier than `start_date`.
    pub end_date: NaiveDate,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn new(
        name: impl Into<String>,
        destination: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            destination: destination.into(),
            start_date,
            end_date,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Trip {
    const KIND: EntityKind = EntityKind::Trip;

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
        ensure_not_blank("name", &self.name)?;
        if self.end_date < self.start_date {
            return Err(ValidationError::ReversedRange {
                start_field: "startDate",
                end_field: "endDate",
            });
        }
        Ok(())
    }

    fn display_order(&self, other: &Self) -> Ordering {
        self.start_date
            .cmp(&other.start_date)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.id.cmp(&other.id))
    }
}
