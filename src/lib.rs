//! Stratus - personal cloud storage backend.
//!
//! Two-factor authentication, server-side sessions and a quota-checked
//! file store over SQLite.

pub mod audit;
pub mod auth;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod mail;
pub mod web;

pub use audit::{AuditCategory, AuditLog, AuditSeverity};
pub use auth::{AuthGrant, AuthService, SessionManager, TwoFactorEngine};
pub use config::Config;
pub use db::Database;
pub use error::{Result, StratusError};
pub use file::{BlobStore, FileService};
pub use mail::{CodeSender, TracingSender};
