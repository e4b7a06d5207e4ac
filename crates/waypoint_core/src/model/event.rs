//! Calendar event record.

use crate::model::entity::{
    ensure_id, ensure_not_blank, DatedEntity, Entity, EntityId, EntityKind, ValidationError,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Point or range event on the calendar, optionally attached to a trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EntityId,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    /// `None` for point events.
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    /// Not validated against the trip collection.
    #[serde(default)]
    pub trip_id: Option<EntityId>,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn new(title: impl Into<String>, starts_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            starts_at,
            ends_at: None,
            location: None,
            trip_id: None,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Event {
    const KIND: EntityKind = EntityKind::Event;

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
        ensure_not_blank("title", &self.title)?;
        if let Some(ends_at) = self.ends_at {
            if ends_at < self.starts_at {
                return Err(ValidationError::ReversedRange {
                    start_field: "startsAt",
                    end_field: "endsAt",
                });
            }
        }
        Ok(())
    }

    fn display_order(&self, other: &Self) -> Ordering {
        self.starts_at
            .cmp(&other.starts_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl DatedEntity for Event {
    fn date(&self) -> NaiveDate {
        self.starts_at.date_naive()
    }
}
