use async_trait::async_trait;
use sqlx::PgPool;
use time::Date;
use uuid::Uuid;

use crate::error::AppResult;
use crate::leaves::repo_types::{Leave, LeaveRow, LeaveStatus, LeaveType};

const LEAVE_COLUMNS: &str =
    "id, employee_id, date, leave_type, reason, status, approved_by, approved_at, created_at, updated_at";

/// Writable fields of a leave. Status is not one of them.
#[derive(Debug, Clone)]
pub struct LeaveFields {
    pub date: Date,
    pub leave_type: LeaveType,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LeaveQuery {
    pub employee_id: Option<Uuid>,
    pub status: Option<LeaveStatus>,
}

#[async_trait]
pub trait LeaveRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Leave>>;
    /// Newest date first.
    async fn find_by_owner(&self, employee_id: Uuid, limit: i64, offset: i64) -> AppResult<Vec<Leave>>;
    /// Newest date first.
    async fn list(&self, query: LeaveQuery, limit: i64, offset: i64) -> AppResult<Vec<Leave>>;
    async fn find_on_date(&self, employee_id: Uuid, date: Date, status: LeaveStatus) -> AppResult<Option<Leave>>;
    async fn count_by_status(&self, status: LeaveStatus) -> AppResult<i64>;
    /// Always inserted as pending.
    async fn create(&self, employee_id: Uuid, fields: &LeaveFields) -> AppResult<Leave>;
    async fn update(&self, id: Uuid, fields: &LeaveFields) -> AppResult<Option<Leave>>;
    /// Persists status, approver and decision time of an already-decided leave.
    async fn save_decision(&self, leave: &Leave) -> AppResult<bool>;
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgLeaveRepo {
    db: PgPool,
}

impl PgLeaveRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_leaves(rows: Vec<LeaveRow>) -> AppResult<Vec<Leave>> {
    rows.into_iter()
        .map(|r| Leave::try_from(r).map_err(Into::into))
        .collect()
}

fn into_leave(row: Option<LeaveRow>) -> AppResult<Option<Leave>> {
    Ok(row.map(Leave::try_from).transpose()?)
}

#[async_trait]
impl LeaveRepo for PgLeaveRepo {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Leave>> {
        let row = sqlx::query_as::<_, LeaveRow>(&format!(
            "SELECT {LEAVE_COLUMNS} FROM leaves WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        into_leave(row)
    }

    async fn find_by_owner(&self, employee_id: Uuid, limit: i64, offset: i64) -> AppResult<Vec<Leave>> {
        self.list(
            LeaveQuery {
                employee_id: Some(employee_id),
                status: None,
            },
            limit,
            offset,
        )
        .await
    }

    async fn list(&self, query: LeaveQuery, limit: i64, offset: i64) -> AppResult<Vec<Leave>> {
        let rows = sqlx::query_as::<_, LeaveRow>(&format!(
            r#"
            SELECT {LEAVE_COLUMNS}
              FROM leaves
             WHERE ($1::uuid IS NULL OR employee_id = $1)
               AND ($2::text IS NULL OR status = $2)
             ORDER BY date DESC, created_at DESC
             LIMIT $3 OFFSET $4
            "#
        ))
        .bind(query.employee_id)
        .bind(query.status.map(LeaveStatus::as_str))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        into_leaves(rows)
    }

    async fn find_on_date(&self, employee_id: Uuid, date: Date, status: LeaveStatus) -> AppResult<Option<Leave>> {
        let row = sqlx::query_as::<_, LeaveRow>(&format!(
            r#"
            SELECT {LEAVE_COLUMNS}
              FROM leaves
             WHERE employee_id = $1 AND date = $2 AND status = $3
            "#
        ))
        .bind(employee_id)
        .bind(date)
        .bind(status.as_str())
        .fetch_optional(&self.db)
        .await?;
        into_leave(row)
    }

    async fn count_by_status(&self, status: LeaveStatus) -> AppResult<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leaves WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }

    async fn create(&self, employee_id: Uuid, fields: &LeaveFields) -> AppResult<Leave> {
        let row = sqlx::query_as::<_, LeaveRow>(&format!(
            r#"
            INSERT INTO leaves (employee_id, date, leave_type, reason, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING {LEAVE_COLUMNS}
            "#
        ))
        .bind(employee_id)
        .bind(fields.date)
        .bind(fields.leave_type.as_str())
        .bind(&fields.reason)
        .fetch_one(&self.db)
        .await?;
        Ok(Leave::try_from(row)?)
    }

    async fn update(&self, id: Uuid, fields: &LeaveFields) -> AppResult<Option<Leave>> {
        let row = sqlx::query_as::<_, LeaveRow>(&format!(
            r#"
            UPDATE leaves
               SET date = $2, leave_type = $3, reason = $4, updated_at = now()
             WHERE id = $1
            RETURNING {LEAVE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(fields.date)
        .bind(fields.leave_type.as_str())
        .bind(&fields.reason)
        .fetch_optional(&self.db)
        .await?;
        into_leave(row)
    }

    async fn save_decision(&self, leave: &Leave) -> AppResult<bool> {
        // Plain last-writer-wins update; concurrent decisions are not arbitrated.
        let res = sqlx::query(
            r#"
            UPDATE leaves
               SET status = $2, approved_by = $3, approved_at = $4, updated_at = $5
             WHERE id = $1
            "#,
        )
        .bind(leave.id)
        .bind(leave.status.as_str())
        .bind(leave.approved_by)
        .bind(leave.approved_at)
        .bind(leave.updated_at)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM leaves WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
