use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppResult;
use crate::shifts::repo_types::{Shift, ShiftState};

const SHIFT_COLUMNS: &str = "s.id, s.name, s.start_time, s.end_time, s.created_at, s.updated_at";

/// Writable fields of a shift, membership included.
#[derive(Debug, Clone)]
pub struct ShiftFields {
    pub name: String,
    pub start_time: OffsetDateTime,
    pub end_time: OffsetDateTime,
    pub employee_ids: Vec<Uuid>,
}

#[async_trait]
pub trait ShiftRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Shift>>;
    /// Ordered by start time, optionally only shifts in `state` at `now`.
    async fn list(
        &self,
        state: Option<ShiftState>,
        now: OffsetDateTime,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Shift>>;
    async fn recent(&self, limit: i64) -> AppResult<Vec<Shift>>;
    async fn count(&self) -> AppResult<i64>;
    async fn count_active_at(&self, now: OffsetDateTime) -> AppResult<i64>;
    /// First of the employee's shifts (by start time) whose window contains `now`.
    async fn find_active_at(&self, employee_id: Uuid, now: OffsetDateTime) -> AppResult<Option<Shift>>;
    /// Earliest of the employee's shifts starting strictly after `now`.
    async fn find_next_after(&self, employee_id: Uuid, now: OffsetDateTime) -> AppResult<Option<Shift>>;
    /// `(shift_id, employee_id)` pairs for the given shifts.
    async fn members(&self, shift_ids: &[Uuid]) -> AppResult<Vec<(Uuid, Uuid)>>;
    async fn create(&self, fields: &ShiftFields) -> AppResult<Shift>;
    async fn update(&self, id: Uuid, fields: &ShiftFields) -> AppResult<Option<Shift>>;
    /// Replaces membership; false when the shift does not exist.
    async fn set_members(&self, id: Uuid, employee_ids: &[Uuid]) -> AppResult<bool>;
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgShiftRepo {
    db: PgPool,
}

impl PgShiftRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

// `$1` is always the reference instant so the bind list never changes.
fn state_condition(state: Option<ShiftState>) -> &'static str {
    match state {
        None => "$1::timestamptz IS NOT NULL",
        Some(ShiftState::Active) => "s.start_time <= $1 AND s.end_time >= $1",
        Some(ShiftState::Upcoming) => "s.start_time > $1",
        Some(ShiftState::Finished) => "s.end_time < $1",
    }
}

async fn replace_members_tx(
    tx: &mut Transaction<'_, Postgres>,
    shift_id: Uuid,
    employee_ids: &[Uuid],
) -> AppResult<()> {
    sqlx::query("DELETE FROM shift_employees WHERE shift_id = $1")
        .bind(shift_id)
        .execute(&mut **tx)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO shift_employees (shift_id, employee_id)
        SELECT $1, e FROM UNNEST($2::uuid[]) AS e
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(shift_id)
    .bind(employee_ids)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl ShiftRepo for PgShiftRepo {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Shift>> {
        let row = sqlx::query_as::<_, Shift>(&format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts s WHERE s.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn list(
        &self,
        state: Option<ShiftState>,
        now: OffsetDateTime,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Shift>> {
        let rows = sqlx::query_as::<_, Shift>(&format!(
            r#"
            SELECT {SHIFT_COLUMNS}
              FROM shifts s
             WHERE {}
             ORDER BY s.start_time
             LIMIT $2 OFFSET $3
            "#,
            state_condition(state)
        ))
        .bind(now)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn recent(&self, limit: i64) -> AppResult<Vec<Shift>> {
        let rows = sqlx::query_as::<_, Shift>(&format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts s ORDER BY s.created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn count(&self) -> AppResult<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shifts")
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }

    async fn count_active_at(&self, now: OffsetDateTime) -> AppResult<i64> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shifts WHERE start_time <= $1 AND end_time >= $1",
        )
        .bind(now)
        .fetch_one(&self.db)
        .await?;
        Ok(n)
    }

    async fn find_active_at(&self, employee_id: Uuid, now: OffsetDateTime) -> AppResult<Option<Shift>> {
        let row = sqlx::query_as::<_, Shift>(&format!(
            r#"
            SELECT {SHIFT_COLUMNS}
              FROM shifts s
              JOIN shift_employees se ON se.shift_id = s.id
             WHERE se.employee_id = $1
               AND s.start_time <= $2
               AND s.end_time >= $2
             ORDER BY s.start_time
             LIMIT 1
            "#
        ))
        .bind(employee_id)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_next_after(&self, employee_id: Uuid, now: OffsetDateTime) -> AppResult<Option<Shift>> {
        let row = sqlx::query_as::<_, Shift>(&format!(
            r#"
            SELECT {SHIFT_COLUMNS}
              FROM shifts s
              JOIN shift_employees se ON se.shift_id = s.id
             WHERE se.employee_id = $1
               AND s.start_time > $2
             ORDER BY s.start_time
             LIMIT 1
            "#
        ))
        .bind(employee_id)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn members(&self, shift_ids: &[Uuid]) -> AppResult<Vec<(Uuid, Uuid)>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            SELECT se.shift_id, se.employee_id
              FROM shift_employees se
              JOIN employees e ON e.id = se.employee_id
             WHERE se.shift_id = ANY($1)
             ORDER BY e.name
            "#,
        )
        .bind(shift_ids)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn create(&self, fields: &ShiftFields) -> AppResult<Shift> {
        let mut tx = self.db.begin().await?;
        let shift = sqlx::query_as::<_, Shift>(
            r#"
            INSERT INTO shifts AS s (name, start_time, end_time)
            VALUES ($1, $2, $3)
            RETURNING s.id, s.name, s.start_time, s.end_time, s.created_at, s.updated_at
            "#,
        )
        .bind(&fields.name)
        .bind(fields.start_time)
        .bind(fields.end_time)
        .fetch_one(&mut *tx)
        .await?;
        replace_members_tx(&mut tx, shift.id, &fields.employee_ids).await?;
        tx.commit().await?;
        Ok(shift)
    }

    async fn update(&self, id: Uuid, fields: &ShiftFields) -> AppResult<Option<Shift>> {
        let mut tx = self.db.begin().await?;
        let shift = sqlx::query_as::<_, Shift>(
            r#"
            UPDATE shifts AS s
               SET name = $2, start_time = $3, end_time = $4, updated_at = now()
             WHERE s.id = $1
            RETURNING s.id, s.name, s.start_time, s.end_time, s.created_at, s.updated_at
            "#,
        )
        .bind(id)
        .bind(&fields.name)
        .bind(fields.start_time)
        .bind(fields.end_time)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(shift) = shift else {
            return Ok(None);
        };
        replace_members_tx(&mut tx, shift.id, &fields.employee_ids).await?;
        tx.commit().await?;
        Ok(Some(shift))
    }

    async fn set_members(&self, id: Uuid, employee_ids: &[Uuid]) -> AppResult<bool> {
        let mut tx = self.db.begin().await?;
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM shifts WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(false);
        }
        replace_members_tx(&mut tx, id, employee_ids).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM shifts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
