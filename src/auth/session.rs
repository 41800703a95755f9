//! Server-side session management.
//!
//! A session is a database row keyed by a random token identifier. The
//! bearer token handed to the client is a signed JWT carrying that
//! identifier, so presenting the token proves nothing unless the row
//! still exists, is confirmed and has not expired. Logout and account
//! deletion revoke by deleting rows; expiry is lazy, checked at
//! validation time.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::db::DbPool;
use crate::{datetime, Result, StratusError};

/// Claims embedded in the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id.
    pub sub: i64,
    /// Session token identifier, matched against the sessions table.
    pub sid: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

/// A session row.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub token_id: String,
    pub two_factor_confirmed: bool,
    pub created_at: String,
    pub expires_at: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Manager for opening, validating and closing sessions.
#[derive(Clone)]
pub struct SessionManager {
    pool: DbPool,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_hours: i64,
}

impl SessionManager {
    pub fn new(pool: DbPool, token_secret: &str, ttl_hours: i64) -> Self {
        Self {
            pool,
            encoding_key: EncodingKey::from_secret(token_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(token_secret.as_bytes()),
            ttl_hours,
        }
    }

    /// Open a confirmed session and return the signed bearer token.
    ///
    /// Sessions only come into existence after a successful code
    /// verification, so there is no unconfirmed state to manage.
    pub async fn open(
        &self,
        user_id: i64,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(String, Session)> {
        let token_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let ttl = Duration::hours(self.ttl_hours);

        let session = sqlx::query_as::<_, Session>(
            "INSERT INTO sessions
                (user_id, token_id, two_factor_confirmed, created_at, expires_at, ip_address, user_agent)
             VALUES ($1, $2, 1, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(user_id)
        .bind(&token_id)
        .bind(datetime::now_string())
        .bind(datetime::from_now(ttl))
        .bind(ip_address)
        .bind(user_agent)
        .fetch_one(&self.pool)
        .await?;

        let claims = SessionClaims {
            sub: user_id,
            sid: token_id,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| StratusError::Internal(format!("token signing failed: {e}")))?;

        Ok((token, session))
    }

    /// Validate a bearer token and return its live session.
    pub async fn validate(&self, bearer: &str) -> Result<Session> {
        let claims = jsonwebtoken::decode::<SessionClaims>(
            bearer,
            &self.decoding_key,
            &Validation::default(),
        )
        .map_err(|_| StratusError::Unauthorized("invalid token".to_string()))?
        .claims;

        let session = sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE user_id = $1 AND token_id = $2",
        )
        .bind(claims.sub)
        .bind(&claims.sid)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StratusError::Unauthorized("session revoked".to_string()))?;

        if !session.two_factor_confirmed {
            return Err(StratusError::Unauthorized("session not confirmed".to_string()));
        }
        if session.expires_at <= datetime::now_string() {
            return Err(StratusError::Unauthorized("session expired".to_string()));
        }
        Ok(session)
    }

    /// Close one session by row id.
    pub async fn close(&self, session_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Close the session identified by a token id (logout).
    pub async fn close_by_token(&self, user_id: i64, token_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND token_id = $2")
            .bind(user_id)
            .bind(token_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Close every session a user holds.
    pub async fn close_all(&self, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
