use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::auth::repo::insert_user_tx;
use crate::auth::repo_types::{NewUser, User};
use crate::employees::repo_types::{Employee, EmployeeFields};
use crate::error::AppResult;

const EMPLOYEE_COLUMNS: &str = "id, user_id, name, email, working_hours, created_at, updated_at";

#[async_trait]
pub trait EmployeeRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Employee>>;
    /// The profile linked to a user account.
    async fn find_by_owner(&self, user_id: Uuid) -> AppResult<Option<Employee>>;
    /// Ordered by name; `search` matches name or email, case-insensitively.
    async fn list(&self, search: Option<&str>, limit: i64, offset: i64) -> AppResult<Vec<Employee>>;
    /// Most recently created first.
    async fn recent(&self, limit: i64) -> AppResult<Vec<Employee>>;
    async fn count(&self) -> AppResult<i64>;
    async fn create(&self, user_id: Uuid, fields: &EmployeeFields) -> AppResult<Employee>;
    /// Both rows or neither.
    async fn create_with_user(&self, user: &NewUser, fields: &EmployeeFields) -> AppResult<(User, Employee)>;
    async fn update(&self, id: Uuid, fields: &EmployeeFields) -> AppResult<Option<Employee>>;
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgEmployeeRepo {
    db: PgPool,
}

impl PgEmployeeRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

async fn insert_employee_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    fields: &EmployeeFields,
) -> AppResult<Employee> {
    let employee = sqlx::query_as::<_, Employee>(&format!(
        r#"
        INSERT INTO employees (user_id, name, email, working_hours)
        VALUES ($1, $2, $3, $4)
        RETURNING {EMPLOYEE_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(&fields.name)
    .bind(&fields.email)
    .bind(fields.working_hours)
    .fetch_one(&mut **tx)
    .await?;
    Ok(employee)
}

#[async_trait]
impl EmployeeRepo for PgEmployeeRepo {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Employee>> {
        let row = sqlx::query_as::<_, Employee>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_by_owner(&self, user_id: Uuid) -> AppResult<Option<Employee>> {
        let row = sqlx::query_as::<_, Employee>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn list(&self, search: Option<&str>, limit: i64, offset: i64) -> AppResult<Vec<Employee>> {
        // Literal substring match; `%` and `_` in the search are not wildcards.
        let needle = search.map(str::to_lowercase);
        let rows = sqlx::query_as::<_, Employee>(&format!(
            r#"
            SELECT {EMPLOYEE_COLUMNS}
              FROM employees
             WHERE $1::text IS NULL
                OR strpos(lower(name), $1) > 0
                OR strpos(lower(email), $1) > 0
             ORDER BY name
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(needle)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn recent(&self, limit: i64) -> AppResult<Vec<Employee>> {
        let rows = sqlx::query_as::<_, Employee>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn count(&self) -> AppResult<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees")
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }

    async fn create(&self, user_id: Uuid, fields: &EmployeeFields) -> AppResult<Employee> {
        let mut tx = self.db.begin().await?;
        let employee = insert_employee_tx(&mut tx, user_id, fields).await?;
        tx.commit().await?;
        Ok(employee)
    }

    async fn create_with_user(&self, user: &NewUser, fields: &EmployeeFields) -> AppResult<(User, Employee)> {
        // Dropping `tx` on any `?` below rolls both inserts back.
        let mut tx = self.db.begin().await?;
        let user = insert_user_tx(&mut tx, user).await?;
        let employee = insert_employee_tx(&mut tx, user.id, fields).await?;
        tx.commit().await?;
        Ok((user, employee))
    }

    async fn update(&self, id: Uuid, fields: &EmployeeFields) -> AppResult<Option<Employee>> {
        let row = sqlx::query_as::<_, Employee>(&format!(
            r#"
            UPDATE employees
               SET name = $2, email = $3, working_hours = $4, updated_at = now()
             WHERE id = $1
            RETURNING {EMPLOYEE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(fields.working_hours)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM employees WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
