use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Employee record in the database.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Employee {
    pub id: Uuid,
    pub user_id: Uuid,             // 1:1 with users.id
    pub name: String,              // unique
    pub email: String,             // unique
    pub working_hours: Decimal,    // NUMERIC(5,2), >= 0
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fields an employee profile is written with, on create or update.
#[derive(Debug, Clone)]
pub struct EmployeeFields {
    pub name: String,
    pub email: String,
    pub working_hours: Decimal,
}
