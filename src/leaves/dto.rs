use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::leaves::repo::LeaveFields;
use crate::leaves::repo_types::{Leave, LeaveStatus, LeaveType};

/// Date, type and reason of a leave; the only fields callers may write.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaveInput {
    pub date: Date,
    #[serde(default)]
    pub leave_type: LeaveType,
    #[serde(default)]
    pub reason: String,
}

impl From<LeaveInput> for LeaveFields {
    fn from(input: LeaveInput) -> Self {
        Self {
            date: input.date,
            leave_type: input.leave_type,
            reason: input.reason.trim().to_string(),
        }
    }
}

/// Admin creation on behalf of an employee.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLeave {
    pub employee_id: Uuid,
    #[serde(flatten)]
    pub leave: LeaveInput,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaveFilter {
    pub employee_id: Option<Uuid>,
    pub status: Option<LeaveStatus>,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub leave: Leave,
    pub message: String,
}
