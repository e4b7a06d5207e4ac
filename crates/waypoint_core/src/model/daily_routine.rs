//! Recurring routine record.

use crate::model::entity::{ensure_id, ensure_not_blank, Entity, EntityId, EntityKind, ValidationError};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// A habit repeated on a fixed set of weekdays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRoutine {
    pub id: EntityId,
    pub title: String,
    /// Weekdays on which the routine produces a task. Never empty.
    pub weekdays: Vec<Weekday>,
    #[serde(default)]
    pub time_of_day: Option<NaiveTime>,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailyRoutine {
    pub fn new(title: impl Into<String>, weekdays: impl IntoIterator<Item = Weekday>) -> Self {
        let now = Utc::now();
        let mut routine = Self {
            id: Uuid::new_v4(),
            title: title.into(),
            weekdays: Vec::new(),
            time_of_day: None,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        };
        routine.set_weekdays(weekdays);
        routine
    }

    /// Routine scheduled on all seven days.
    pub fn every_day(title: impl Into<String>) -> Self {
        Self::new(
            title,
            [
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ],
        )
    }

    /// Replaces the schedule; stored deduplicated in Monday-first order.
    pub fn set_weekdays(&mut self, weekdays: impl IntoIterator<Item = Weekday>) {
        let mut days: Vec<Weekday> = weekdays.into_iter().collect();
        days.sort_by_key(|day| day.num_days_from_monday());
        days.dedup();
        self.weekdays = days;
    }

    pub fn is_scheduled_on(&self, date: NaiveDate) -> bool {
        self.weekdays.contains(&date.weekday())
    }
}

impl Entity for DailyRoutine {
    const KIND: EntityKind = EntityKind::DailyRoutine;

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
        if self.weekdays.is_empty() {
            return Err(ValidationError::NoWeekdays);
        }
        Ok(())
    }

    fn display_order(&self, other: &Self) -> Ordering {
        // Unscheduled routines sort after timed ones.
        let time_order = match (self.time_of_day, other.time_of_day) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        time_order
            .then_with(|| self.title.cmp(&other.title))
            .then_with(|| self.id.cmp(&other.id))
    }
}
