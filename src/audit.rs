//! Security audit trail.
//!
//! Writes one row per security-relevant event. Recording never fails the
//! calling operation: insert errors are logged and swallowed, since losing
//! an audit row must not abort a login or an upload.

use serde_json::Value;
use tracing::error;

use crate::datetime;
use crate::db::DbPool;

/// Event category, stored as its string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditCategory {
    Auth,
    Account,
    File,
}

impl AuditCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditCategory::Auth => "auth",
            AuditCategory::Account => "account",
            AuditCategory::File => "file",
        }
    }
}

/// Event severity, stored as its string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

impl AuditSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSeverity::Info => "info",
            AuditSeverity::Warning => "warning",
            AuditSeverity::Critical => "critical",
        }
    }
}

/// Audit sink over the shared pool.
#[derive(Debug, Clone)]
pub struct AuditLog {
    pool: DbPool,
}

impl AuditLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record one event. Errors are logged, never returned.
    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        user_id: Option<i64>,
        category: AuditCategory,
        severity: AuditSeverity,
        action: &str,
        detail: Option<&str>,
        metadata: Option<&Value>,
        source_ip: Option<&str>,
    ) {
        let metadata_json = metadata.map(|m| m.to_string());
        let result = sqlx::query(
            "INSERT INTO audit_logs
                (user_id, category, severity, action, detail, metadata, source_ip, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(user_id)
        .bind(category.as_str())
        .bind(severity.as_str())
        .bind(action)
        .bind(detail)
        .bind(metadata_json)
        .bind(source_ip)
        .bind(datetime::now_string())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            error!(action, "failed to write audit log entry: {e}");
        }
    }
}
