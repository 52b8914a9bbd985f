use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::dto::{PublicUser, RegisterRequest};
use crate::employees::repo_types::Employee;
use crate::leaves::repo_types::Leave;
use crate::shifts::repo_types::Shift;

/// Editable profile fields, shared by admin and self-service forms.
#[derive(Debug, Clone, Deserialize)]
pub struct EmployeeInput {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub working_hours: Decimal,
}

/// Admin creation of a profile for an existing user.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEmployee {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub profile: EmployeeInput,
}

/// Admin creation of a user account and its profile in one step.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEmployeeWithUser {
    pub user: RegisterRequest,
    #[serde(default)]
    pub is_admin: bool,
    pub employee: EmployeeInput,
}

#[derive(Debug, Serialize)]
pub struct EmployeeWithUser {
    pub user: PublicUser,
    pub employee: Employee,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeFilter {
    pub search: Option<String>,
}

/// Where an employee stands right now.
#[derive(Debug, Serialize)]
pub struct EmployeeStatus {
    pub current_shift: Option<Shift>,
    pub next_shift: Option<Shift>,
    pub on_leave_today: bool,
    pub today_leave: Option<Leave>,
    #[serde(with = "time::serde::rfc3339")]
    pub now: OffsetDateTime,
}
