use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};
use crate::error::AppResult;

const USER_COLUMNS: &str = "id, username, email, password_hash, is_admin, created_at";

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn create(&self, new: &NewUser) -> AppResult<User>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    /// Find a user by (lowercased) email.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, new: &NewUser) -> AppResult<User> {
        let mut tx = self.db.begin().await?;
        let user = insert_user_tx(&mut tx, new).await?;
        tx.commit().await?;
        Ok(user)
    }
}

/// Insert a user within a caller-owned transaction.
pub(crate) async fn insert_user_tx(
    tx: &mut Transaction<'_, Postgres>,
    new: &NewUser,
) -> AppResult<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (username, email, password_hash, is_admin)
        VALUES ($1, $2, $3, $4)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(&new.username)
    .bind(&new.email)
    .bind(&new.password_hash)
    .bind(new.is_admin)
    .fetch_one(&mut **tx)
    .await?;
    Ok(user)
}
