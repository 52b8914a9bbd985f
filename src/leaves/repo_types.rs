use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, LeaveStatus::Pending)
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaveStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LeaveStatus::Pending),
            "approved" => Ok(LeaveStatus::Approved),
            "rejected" => Ok(LeaveStatus::Rejected),
            _ => Err(format!("invalid leave status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveType {
    #[default]
    Annual,
    Sick,
    Personal,
    Other,
}

impl LeaveType {
    pub fn as_str(self) -> &'static str {
        match self {
            LeaveType::Annual => "annual",
            LeaveType::Sick => "sick",
            LeaveType::Personal => "personal",
            LeaveType::Other => "other",
        }
    }
}

impl FromStr for LeaveType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "annual" => Ok(LeaveType::Annual),
            "sick" => Ok(LeaveType::Sick),
            "personal" => Ok(LeaveType::Personal),
            "other" => Ok(LeaveType::Other),
            _ => Err(format!("invalid leave type: {s}")),
        }
    }
}

/// Raw `leaves` row; enums are stored as text.
#[derive(Debug, FromRow)]
pub struct LeaveRow {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub date: Date,
    pub leave_type: String,
    pub reason: String,
    pub status: String,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leave {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub date: Date,
    pub leave_type: LeaveType,
    pub reason: String,
    pub status: LeaveStatus,
    pub approved_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub approved_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl TryFrom<LeaveRow> for Leave {
    type Error = anyhow::Error;

    fn try_from(r: LeaveRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            employee_id: r.employee_id,
            date: r.date,
            leave_type: r.leave_type.parse().map_err(anyhow::Error::msg)?,
            reason: r.reason,
            status: r.status.parse().map_err(anyhow::Error::msg)?,
            approved_by: r.approved_by,
            approved_at: r.approved_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// An admin decision on a pending leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn target(self) -> LeaveStatus {
        match self {
            Decision::Approve => LeaveStatus::Approved,
            Decision::Reject => LeaveStatus::Rejected,
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

impl Leave {
    /// Moves a pending leave to the decision's terminal state.
    /// Terminal leaves are left untouched.
    pub fn decide(&mut self, decision: Decision, by: Uuid, at: OffsetDateTime) -> AppResult<()> {
        if self.status.is_terminal() {
            return Err(AppError::StateConflict(format!(
                "cannot {} a leave that is already {}",
                decision.verb(),
                self.status
            )));
        }
        self.status = decision.target();
        self.approved_by = Some(by);
        self.approved_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    pub fn approve(&mut self, by: Uuid, at: OffsetDateTime) -> AppResult<()> {
        self.decide(Decision::Approve, by, at)
    }

    pub fn reject(&mut self, by: Uuid, at: OffsetDateTime) -> AppResult<()> {
        self.decide(Decision::Reject, by, at)
    }
}
