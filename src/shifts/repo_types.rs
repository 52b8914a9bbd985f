use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Shift record in the database. Members live in `shift_employees`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Shift {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Where `now` falls relative to a shift window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftState {
    Upcoming,
    Active,
    Finished,
}

impl Shift {
    /// Inclusive at both ends of the window.
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        self.start_time <= now && now <= self.end_time
    }

    pub fn is_finished(&self, now: OffsetDateTime) -> bool {
        now > self.end_time
    }

    pub fn is_upcoming(&self, now: OffsetDateTime) -> bool {
        now < self.start_time
    }

    pub fn state(&self, now: OffsetDateTime) -> ShiftState {
        if self.is_active(now) {
            ShiftState::Active
        } else if self.is_finished(now) {
            ShiftState::Finished
        } else {
            ShiftState::Upcoming
        }
    }

    /// Plain `end - start` in hours; negative for an inverted window.
    pub fn duration_hours(&self) -> f64 {
        (self.end_time - self.start_time).as_seconds_f64() / 3600.0
    }
}
