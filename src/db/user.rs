//! User entity and repository.

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::db::DbPool;
use crate::{datetime, Result, StratusError};

/// A user account row.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string, never exposed through the API.
    pub password: String,
    pub avatar: Option<String>,
    pub two_factor_enabled: bool,
    pub created_at: String,
    pub last_login: Option<String>,
    pub storage_quota: i64,
    pub storage_used: i64,
}

impl User {
    /// Public view of the account, safe to return from handlers.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            avatar: self.avatar.clone(),
            verified: self.two_factor_enabled,
        }
    }
}

/// Serializable public subset of a user account.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub verified: bool,
}

/// Fields required to create an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    /// Already-hashed password.
    pub password: String,
}

/// Repository for user accounts.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new, unverified account.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (name, email, password, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password)
        .bind(datetime::now_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Overwrite name and password of an account that never completed
    /// verification, so a repeat registration starts clean.
    pub async fn rewrite_pending(&self, id: i64, name: &str, password: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET name = $1, password = $2
             WHERE id = $3 AND two_factor_enabled = 0",
        )
        .bind(name)
        .bind(password)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StratusError::NotFound("user".to_string()));
        }
        Ok(())
    }

    /// Mark the account verified and stamp the login time.
    pub async fn mark_verified(&self, id: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET two_factor_enabled = 1, last_login = $1 WHERE id = $2",
        )
        .bind(datetime::now_string())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StratusError::NotFound("user".to_string()));
        }
        Ok(())
    }

    pub async fn touch_last_login(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(datetime::now_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Atomically reserve `size` bytes against the quota.
    ///
    /// The condition lives inside the UPDATE so two concurrent uploads can
    /// never both slip under the limit.
    pub async fn reserve_storage(&self, id: i64, size: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET storage_used = storage_used + $1
             WHERE id = $2 AND storage_used + $1 <= storage_quota",
        )
        .bind(size)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StratusError::QuotaExceeded);
        }
        Ok(())
    }

    /// Give back a reservation after a failed upload.
    pub async fn release_storage(&self, id: i64, size: i64) -> Result<()> {
        sqlx::query(
            "UPDATE users SET storage_used = MAX(storage_used - $1, 0) WHERE id = $2",
        )
        .bind(size)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Irreversibly anonymize an account and purge its personal data.
    ///
    /// The user row is kept (audit rows reference it) but stripped of
    /// identifying content; contacts, sessions and codes are deleted and
    /// messages are redacted in the same transaction.
    pub async fn anonymize(&self, id: i64, scrambled_password: &str) -> Result<()> {
        let placeholder_email = format!("deleted_{}@deleted.invalid", Uuid::new_v4().simple());

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE users
             SET name = 'Deleted User', email = $1, password = $2,
                 avatar = NULL, two_factor_enabled = 0
             WHERE id = $3",
        )
        .bind(&placeholder_email)
        .bind(scrambled_password)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StratusError::NotFound("user".to_string()));
        }

        sqlx::query("DELETE FROM contacts WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM two_factor_codes WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE messages SET body = '[message removed]', deleted = 1 WHERE user_id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
