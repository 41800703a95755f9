//! Authentication flows.
//!
//! Every flow is two-step: a request that checks credentials and sends a
//! one-time code, and a confirmation that redeems the code. Sessions only
//! exist after a confirmation succeeds.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::audit::{AuditCategory, AuditLog, AuditSeverity};
use crate::auth::password;
use crate::auth::session::{Session, SessionManager};
use crate::auth::two_factor::{CodePurpose, TwoFactorEngine};
use crate::db::user::{NewUser, UserProfile, UserRepository};
use crate::db::DbPool;
use crate::mail::CodeSender;
use crate::{Result, StratusError};

/// The result of a successful confirmation: a bearer token plus the
/// profile of the account it belongs to.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuthGrant {
    pub token: String,
    pub profile: UserProfile,
}

/// Orchestrates registration, login and account deletion.
#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    codes: TwoFactorEngine,
    sessions: SessionManager,
    sender: Arc<dyn CodeSender>,
    audit: AuditLog,
}

impl AuthService {
    pub fn new(
        pool: DbPool,
        sessions: SessionManager,
        codes: TwoFactorEngine,
        sender: Arc<dyn CodeSender>,
    ) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            codes,
            sessions,
            sender,
            audit: AuditLog::new(pool),
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Validate a bearer token for a protected operation, auditing
    /// rejections.
    pub async fn authenticate(&self, bearer: &str, ip: Option<&str>) -> Result<Session> {
        match self.sessions.validate(bearer).await {
            Ok(session) => Ok(session),
            Err(e) => {
                self.audit
                    .record(
                        None,
                        AuditCategory::Auth,
                        AuditSeverity::Warning,
                        "SESSION_REJECTED",
                        Some(&e.to_string()),
                        None,
                        ip,
                    )
                    .await;
                Err(e)
            }
        }
    }

    /// Step one of registration: create (or refresh) the pending account
    /// and send a verification code.
    pub async fn register_request(
        &self,
        name: &str,
        email: &str,
        plaintext_password: &str,
        ip: Option<&str>,
    ) -> Result<()> {
        let name = name.trim();
        let email = email.trim().to_lowercase();
        if name.is_empty() || email.is_empty() || !email.contains('@') {
            return Err(StratusError::Invalid("name and a valid email are required".to_string()));
        }
        password::validate_password(plaintext_password)?;
        let hash = password::hash_password(plaintext_password)?;

        let user_id = match self.users.get_by_email(&email).await? {
            Some(existing) if existing.two_factor_enabled => {
                self.audit
                    .record(
                        Some(existing.id),
                        AuditCategory::Auth,
                        AuditSeverity::Warning,
                        "REGISTER_ATTEMPT",
                        Some("email already registered"),
                        None,
                        ip,
                    )
                    .await;
                return Err(StratusError::Conflict("email is already registered".to_string()));
            }
            Some(pending) => {
                // A registration that never completed: start over in place.
                self.users.rewrite_pending(pending.id, name, &hash).await?;
                self.codes.delete_all_for_user(pending.id).await?;
                pending.id
            }
            None => {
                let user = self
                    .users
                    .create(&NewUser {
                        name: name.to_string(),
                        email: email.clone(),
                        password: hash,
                    })
                    .await?;
                user.id
            }
        };

        self.audit
            .record(
                Some(user_id),
                AuditCategory::Auth,
                AuditSeverity::Info,
                "REGISTER_ATTEMPT",
                None,
                Some(&json!({ "email": email })),
                ip,
            )
            .await;

        let code = self.codes.issue(user_id, CodePurpose::Register, ip).await?;
        self.sender.send(&email, &code).await?;
        Ok(())
    }

    /// Step two of registration: redeem the code, activate the account
    /// and open the first session.
    pub async fn register_confirm(
        &self,
        email: &str,
        code: &str,
        ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<AuthGrant> {
        let email = email.trim().to_lowercase();
        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or_else(|| StratusError::NotFound("user".to_string()))?;

        if let Err(e) = self.codes.verify(user.id, CodePurpose::Register, code).await {
            self.audit
                .record(
                    Some(user.id),
                    AuditCategory::Auth,
                    AuditSeverity::Warning,
                    "REGISTER_VERIFY_FAILED",
                    None,
                    None,
                    ip,
                )
                .await;
            return Err(e);
        }

        self.users.mark_verified(user.id).await?;
        let (token, _session) = self.sessions.open(user.id, ip, user_agent).await?;
        let user = self
            .users
            .get_by_id(user.id)
            .await?
            .ok_or_else(|| StratusError::NotFound("user".to_string()))?;

        info!(user_id = user.id, "registration completed");
        self.audit
            .record(
                Some(user.id),
                AuditCategory::Auth,
                AuditSeverity::Info,
                "REGISTER_SUCCESS",
                None,
                None,
                ip,
            )
            .await;

        Ok(AuthGrant {
            token,
            profile: user.profile(),
        })
    }

    /// Step one of login: check credentials, then send a login code.
    ///
    /// Unknown email and wrong password produce the same error, so the
    /// response does not reveal whether an account exists.
    pub async fn login_request(
        &self,
        email: &str,
        plaintext_password: &str,
        ip: Option<&str>,
    ) -> Result<()> {
        let email = email.trim().to_lowercase();
        let user = match self.users.get_by_email(&email).await? {
            Some(user) if password::verify_password(plaintext_password, &user.password) => user,
            other => {
                self.audit
                    .record(
                        other.map(|u| u.id),
                        AuditCategory::Auth,
                        AuditSeverity::Warning,
                        "LOGIN_FAILED",
                        Some("bad credentials"),
                        Some(&json!({ "email": email })),
                        ip,
                    )
                    .await;
                return Err(StratusError::Unauthorized("invalid email or password".to_string()));
            }
        };

        if !user.two_factor_enabled {
            warn!(user_id = user.id, "login attempt on unverified account");
            return Err(StratusError::Forbidden(
                "account has not completed verification".to_string(),
            ));
        }

        self.audit
            .record(
                Some(user.id),
                AuditCategory::Auth,
                AuditSeverity::Info,
                "LOGIN_ATTEMPT",
                None,
                None,
                ip,
            )
            .await;

        let code = self.codes.issue(user.id, CodePurpose::Login, ip).await?;
        self.sender.send(&user.email, &code).await?;
        Ok(())
    }

    /// Step two of login: redeem the code and open a session.
    pub async fn login_confirm(
        &self,
        email: &str,
        code: &str,
        ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<AuthGrant> {
        let email = email.trim().to_lowercase();
        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or_else(|| StratusError::Unauthorized("invalid email or code".to_string()))?;

        if let Err(e) = self.codes.verify(user.id, CodePurpose::Login, code).await {
            self.audit
                .record(
                    Some(user.id),
                    AuditCategory::Auth,
                    AuditSeverity::Warning,
                    "LOGIN_VERIFY_FAILED",
                    None,
                    None,
                    ip,
                )
                .await;
            return Err(e);
        }

        self.users.touch_last_login(user.id).await?;
        let (token, _session) = self.sessions.open(user.id, ip, user_agent).await?;

        self.audit
            .record(
                Some(user.id),
                AuditCategory::Auth,
                AuditSeverity::Info,
                "LOGIN_SUCCESS",
                None,
                None,
                ip,
            )
            .await;

        Ok(AuthGrant {
            token,
            profile: user.profile(),
        })
    }

    /// Close exactly the presented session.
    pub async fn logout(&self, session: &Session, ip: Option<&str>) -> Result<()> {
        self.sessions
            .close_by_token(session.user_id, &session.token_id)
            .await?;
        self.audit
            .record(
                Some(session.user_id),
                AuditCategory::Auth,
                AuditSeverity::Info,
                "LOGOUT",
                None,
                None,
                ip,
            )
            .await;
        Ok(())
    }

    /// Profile for an authenticated session.
    pub async fn profile(&self, user_id: i64) -> Result<UserProfile> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| StratusError::NotFound("user".to_string()))?;
        Ok(user.profile())
    }

    /// Step one of account deletion: re-check the password on a confirmed
    /// session, then send a deletion code.
    pub async fn delete_request(
        &self,
        session: &Session,
        plaintext_password: &str,
        ip: Option<&str>,
    ) -> Result<()> {
        // validate() already refuses unconfirmed sessions; deletion
        // re-checks the flag anyway since the stakes are higher.
        if !session.two_factor_confirmed {
            return Err(StratusError::Forbidden(
                "account deletion requires a verified session".to_string(),
            ));
        }

        let user = self
            .users
            .get_by_id(session.user_id)
            .await?
            .ok_or_else(|| StratusError::NotFound("user".to_string()))?;

        if !password::verify_password(plaintext_password, &user.password) {
            self.audit
                .record(
                    Some(user.id),
                    AuditCategory::Account,
                    AuditSeverity::Warning,
                    "ACCOUNT_DELETE_DENIED",
                    Some("password mismatch"),
                    None,
                    ip,
                )
                .await;
            return Err(StratusError::Unauthorized("password is incorrect".to_string()));
        }

        self.audit
            .record(
                Some(user.id),
                AuditCategory::Account,
                AuditSeverity::Warning,
                "ACCOUNT_DELETE_REQUEST",
                None,
                None,
                ip,
            )
            .await;

        let code = self
            .codes
            .issue(user.id, CodePurpose::AccountDelete, ip)
            .await?;
        self.sender.send(&user.email, &code).await?;
        Ok(())
    }

    /// Step two of account deletion: redeem the code, then anonymize the
    /// account and purge its personal data.
    pub async fn delete_confirm(
        &self,
        session: &Session,
        code: &str,
        ip: Option<&str>,
    ) -> Result<()> {
        if let Err(e) = self
            .codes
            .verify(session.user_id, CodePurpose::AccountDelete, code)
            .await
        {
            self.audit
                .record(
                    Some(session.user_id),
                    AuditCategory::Account,
                    AuditSeverity::Warning,
                    "ACCOUNT_DELETE_VERIFY_FAILED",
                    None,
                    None,
                    ip,
                )
                .await;
            return Err(e);
        }

        let scrambled = password::scrambled_password()?;
        self.users.anonymize(session.user_id, &scrambled).await?;

        info!(user_id = session.user_id, "account deleted");
        self.audit
            .record(
                Some(session.user_id),
                AuditCategory::Account,
                AuditSeverity::Critical,
                "ACCOUNT_DELETED",
                None,
                None,
                ip,
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::mail::testing::{CapturingSender, FailingSender};

    const SECRET: &str = "test-secret";

    async fn service_with(sender: Arc<dyn CodeSender>) -> (Database, AuthService) {
        let db = Database::open_in_memory().await.unwrap();
        let pool = db.pool().clone();
        let sessions = SessionManager::new(pool.clone(), SECRET, 24);
        let codes = TwoFactorEngine::new(pool.clone(), 15);
        let service = AuthService::new(pool, sessions, codes, sender);
        (db, service)
    }

    async fn service() -> (Database, Arc<CapturingSender>, AuthService) {
        let sender = Arc::new(CapturingSender::default());
        let (db, service) = service_with(sender.clone()).await;
        (db, sender, service)
    }

    async fn register_alice(sender: &CapturingSender, service: &AuthService) -> AuthGrant {
        service
            .register_request("Alice", "alice@example.com", "hunter2hunter2", None)
            .await
            .unwrap();
        let code = sender.last_code().unwrap();
        service
            .register_confirm("alice@example.com", &code, None, None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_registration_flow() {
        let (_db, sender, service) = service().await;
        let grant = register_alice(&sender, &service).await;
        assert_eq!(grant.profile.email, "alice@example.com");
        assert!(grant.profile.verified);
        // The token works against the session manager
        let session = service.sessions().validate(&grant.token).await.unwrap();
        assert_eq!(session.user_id, grant.profile.id);
    }

    #[tokio::test]
    async fn test_register_rejects_weak_input() {
        let (_db, _sender, service) = service().await;
        assert!(matches!(
            service
                .register_request("Alice", "not-an-email", "hunter2hunter2", None)
                .await
                .unwrap_err(),
            StratusError::Invalid(_)
        ));
        assert!(matches!(
            service
                .register_request("Alice", "alice@example.com", "short", None)
                .await
                .unwrap_err(),
            StratusError::Invalid(_)
        ));
    }

    #[tokio::test]
    async fn test_register_verified_email_conflicts() {
        let (_db, sender, service) = service().await;
        register_alice(&sender, &service).await;
        let err = service
            .register_request("Mallory", "alice@example.com", "hunter2hunter2", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StratusError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_unverified_email_is_rewritten() {
        let (_db, sender, service) = service().await;
        service
            .register_request("Alice", "alice@example.com", "hunter2hunter2", None)
            .await
            .unwrap();
        let stale_code = sender.last_code().unwrap();

        service
            .register_request("Alice Again", "alice@example.com", "betterpassword", None)
            .await
            .unwrap();
        let fresh_code = sender.last_code().unwrap();

        if stale_code != fresh_code {
            assert!(service
                .register_confirm("alice@example.com", &stale_code, None, None)
                .await
                .is_err());
        }
        let grant = service
            .register_confirm("alice@example.com", &fresh_code, None, None)
            .await
            .unwrap();
        assert_eq!(grant.profile.name, "Alice Again");
    }

    #[tokio::test]
    async fn test_register_send_failure_keeps_account() {
        let sender = Arc::new(FailingSender);
        let (db, service) = service_with(sender).await;
        let err = service
            .register_request("Alice", "alice@example.com", "hunter2hunter2", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StratusError::Internal(_)));
        // User and code rows survive the delivery failure
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(users, 1);
    }

    #[tokio::test]
    async fn test_login_flow() {
        let (_db, sender, service) = service().await;
        register_alice(&sender, &service).await;

        service
            .login_request("alice@example.com", "hunter2hunter2", None)
            .await
            .unwrap();
        let code = sender.last_code().unwrap();
        let grant = service
            .login_confirm("alice@example.com", &code, None, None)
            .await
            .unwrap();
        assert!(service.sessions().validate(&grant.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_login_uniform_failure_shape() {
        let (_db, sender, service) = service().await;
        register_alice(&sender, &service).await;

        let unknown = service
            .login_request("nobody@example.com", "whatever123", None)
            .await
            .unwrap_err();
        let wrong = service
            .login_request("alice@example.com", "wrongpassword", None)
            .await
            .unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_login_unverified_account_forbidden() {
        let (_db, _sender, service) = service().await;
        service
            .register_request("Alice", "alice@example.com", "hunter2hunter2", None)
            .await
            .unwrap();
        let err = service
            .login_request("alice@example.com", "hunter2hunter2", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StratusError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_logout_revokes_session() {
        let (_db, sender, service) = service().await;
        let grant = register_alice(&sender, &service).await;
        let session = service.sessions().validate(&grant.token).await.unwrap();
        service.logout(&session, None).await.unwrap();
        assert!(service.sessions().validate(&grant.token).await.is_err());
    }

    #[tokio::test]
    async fn test_account_deletion_flow() {
        let (db, sender, service) = service().await;
        let grant = register_alice(&sender, &service).await;
        let session = service.sessions().validate(&grant.token).await.unwrap();

        service
            .delete_request(&session, "hunter2hunter2", None)
            .await
            .unwrap();
        let code = sender.last_code().unwrap();
        service.delete_confirm(&session, &code, None).await.unwrap();

        // Session is gone, account is anonymized, codes are purged
        assert!(service.sessions().validate(&grant.token).await.is_err());
        let email: String = sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
            .bind(session.user_id)
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert!(email.ends_with("@deleted.invalid"));
        let codes: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM two_factor_codes WHERE user_id = $1")
                .bind(session.user_id)
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(codes, 0);

        // A second confirmation cannot find a code to redeem
        let err = service.delete_confirm(&session, &code, None).await.unwrap_err();
        assert!(matches!(err, StratusError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_request_wrong_password() {
        let (_db, sender, service) = service().await;
        let grant = register_alice(&sender, &service).await;
        let session = service.sessions().validate(&grant.token).await.unwrap();
        let err = service
            .delete_request(&session, "wrongpassword", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StratusError::Unauthorized(_)));
    }
}
