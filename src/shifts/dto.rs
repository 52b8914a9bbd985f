use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::shifts::repo_types::{Shift, ShiftState};

#[derive(Debug, Clone, Deserialize)]
pub struct ShiftInput {
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    #[serde(default)]
    pub employee_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MembersInput {
    pub employee_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShiftFilter {
    pub state: Option<ShiftState>,
}

/// A shift with its derived state at response time.
#[derive(Debug, Serialize)]
pub struct ShiftView {
    #[serde(flatten)]
    pub shift: Shift,
    pub state: ShiftState,
    pub duration_hours: f64,
    pub employee_ids: Vec<Uuid>,
}
