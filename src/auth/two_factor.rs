//! One-time verification code engine.
//!
//! Codes are 6 random digits, stored only as SHA-256 hashes, valid for a
//! single use within a short window. Issuing a code for a purpose
//! invalidates any earlier outstanding codes for the same purpose, so at
//! most one code per (user, purpose) is ever acceptable.

use chrono::Duration;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use tracing::debug;

use crate::db::DbPool;
use crate::{datetime, Result, StratusError};

/// What a verification code authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePurpose {
    Register,
    Login,
    AccountDelete,
}

impl CodePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodePurpose::Register => "register",
            CodePurpose::Login => "login",
            CodePurpose::AccountDelete => "account_delete",
        }
    }
}

/// A stored verification code row. The plaintext never touches the table.
#[derive(Debug, Clone, FromRow)]
pub struct TwoFactorCode {
    pub id: i64,
    pub user_id: i64,
    pub purpose: String,
    pub code_hash: String,
    pub issued_at: String,
    pub expires_at: String,
    pub used: bool,
    pub ip_address: Option<String>,
}

/// SHA-256 hex digest of a code string.
fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Engine for issuing and redeeming one-time codes.
#[derive(Debug, Clone)]
pub struct TwoFactorEngine {
    pool: DbPool,
    ttl_minutes: i64,
}

impl TwoFactorEngine {
    pub fn new(pool: DbPool, ttl_minutes: i64) -> Self {
        Self { pool, ttl_minutes }
    }

    /// Issue a fresh code, invalidating prior outstanding codes for the
    /// same purpose in the same transaction. Returns the plaintext for
    /// delivery; it is not retained.
    pub async fn issue(
        &self,
        user_id: i64,
        purpose: CodePurpose,
        ip_address: Option<&str>,
    ) -> Result<String> {
        let code = format!("{}", rand::thread_rng().gen_range(100000..=999999));
        let expires_at = datetime::from_now(Duration::minutes(self.ttl_minutes));

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE two_factor_codes SET used = 1
             WHERE user_id = $1 AND purpose = $2 AND used = 0",
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO two_factor_codes (user_id, purpose, code_hash, issued_at, expires_at, ip_address)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .bind(hash_code(&code))
        .bind(datetime::now_string())
        .bind(&expires_at)
        .bind(ip_address)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(user_id, purpose = purpose.as_str(), "issued verification code");
        Ok(code)
    }

    /// Verify a submitted code and consume it on success.
    ///
    /// Only the newest live code counts. `NotFound` when no live code
    /// exists, `Invalid` on a hash mismatch. Consumption is an atomic
    /// conditional update, so a code can never be redeemed twice even
    /// under concurrent submissions.
    pub async fn verify(
        &self,
        user_id: i64,
        purpose: CodePurpose,
        submitted: &str,
    ) -> Result<()> {
        let row = sqlx::query_as::<_, TwoFactorCode>(
            "SELECT * FROM two_factor_codes
             WHERE user_id = $1 AND purpose = $2 AND used = 0
               AND expires_at > datetime('now')
             ORDER BY issued_at DESC, id DESC
             LIMIT 1",
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| StratusError::NotFound("verification code".to_string()))?;

        if row.code_hash != hash_code(submitted) {
            return Err(StratusError::Invalid("incorrect verification code".to_string()));
        }

        let result = sqlx::query(
            "UPDATE two_factor_codes SET used = 1 WHERE id = $1 AND used = 0",
        )
        .bind(row.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            // Lost the race against another redemption of the same code.
            return Err(StratusError::NotFound("verification code".to_string()));
        }
        Ok(())
    }

    /// Drop every code belonging to a user.
    pub async fn delete_all_for_user(&self, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM two_factor_codes WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::user::{NewUser, UserRepository};
    use crate::db::Database;

    async fn setup() -> (Database, TwoFactorEngine, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let users = UserRepository::new(db.pool().clone());
        let user = users
            .create(&NewUser {
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "$argon2id$fake".to_string(),
            })
            .await
            .unwrap();
        let engine = TwoFactorEngine::new(db.pool().clone(), 15);
        (db, engine, user.id)
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let (_db, engine, user_id) = setup().await;
        let code = engine.issue(user_id, CodePurpose::Login, None).await.unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        engine.verify(user_id, CodePurpose::Login, &code).await.unwrap();
    }

    #[tokio::test]
    async fn test_code_is_single_use() {
        let (_db, engine, user_id) = setup().await;
        let code = engine.issue(user_id, CodePurpose::Login, None).await.unwrap();
        engine.verify(user_id, CodePurpose::Login, &code).await.unwrap();
        let err = engine
            .verify(user_id, CodePurpose::Login, &code)
            .await
            .unwrap_err();
        assert!(matches!(err, StratusError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_wrong_code_is_invalid_and_not_consumed() {
        let (_db, engine, user_id) = setup().await;
        let code = engine.issue(user_id, CodePurpose::Login, None).await.unwrap();
        let err = engine
            .verify(user_id, CodePurpose::Login, "000000")
            .await
            .unwrap_err();
        assert!(matches!(err, StratusError::Invalid(_)));
        // The real code still works afterwards
        engine.verify(user_id, CodePurpose::Login, &code).await.unwrap();
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous_code() {
        let (_db, engine, user_id) = setup().await;
        let first = engine.issue(user_id, CodePurpose::Register, None).await.unwrap();
        let second = engine.issue(user_id, CodePurpose::Register, None).await.unwrap();
        if first != second {
            let err = engine
                .verify(user_id, CodePurpose::Register, &first)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                StratusError::Invalid(_) | StratusError::NotFound(_)
            ));
        }
        engine
            .verify(user_id, CodePurpose::Register, &second)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_purposes_are_isolated() {
        let (_db, engine, user_id) = setup().await;
        let code = engine.issue(user_id, CodePurpose::Login, None).await.unwrap();
        let err = engine
            .verify(user_id, CodePurpose::Register, &code)
            .await
            .unwrap_err();
        assert!(matches!(err, StratusError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_expired_code_rejected() {
        let (db, engine, user_id) = setup().await;
        let code = engine.issue(user_id, CodePurpose::Login, None).await.unwrap();
        sqlx::query(
            "UPDATE two_factor_codes SET expires_at = datetime('now', '-1 minute')
             WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(db.pool())
        .await
        .unwrap();
        let err = engine
            .verify(user_id, CodePurpose::Login, &code)
            .await
            .unwrap_err();
        assert!(matches!(err, StratusError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_all_for_user() {
        let (db, engine, user_id) = setup().await;
        engine.issue(user_id, CodePurpose::Login, None).await.unwrap();
        engine.issue(user_id, CodePurpose::Register, None).await.unwrap();
        engine.delete_all_for_user(user_id).await.unwrap();
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM two_factor_codes WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_hash_code_is_hex_sha256() {
        let hash = hash_code("123456");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "8d969eef6ecad3c29a3a629280e686cf0c3f5d5a86aff3ca12020c923adc6c92"
        );
    }
}
