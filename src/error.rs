//! Error types for Stratus.

use thiserror::Error;

/// Common error type for Stratus.
#[derive(Error, Debug)]
pub enum StratusError {
    /// Database error.
    ///
    /// Generic database error wrapping errors from the sqlx backend.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found (user, session, folder, file, code).
    #[error("{0} not found")]
    NotFound(String),

    /// Missing/invalid/expired session or bad credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Valid identity but a flow precondition is unmet.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Wrong one-time code or malformed input.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Duplicate verified email or duplicate folder name.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The upload would push the user past their storage quota.
    #[error("storage quota exceeded")]
    QuotaExceeded,

    /// File extension is not in the allow-list.
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    /// Stored bytes no longer match the recorded content hash.
    #[error("file content is corrupted")]
    Corrupt,

    /// Code delivery or storage failure.
    #[error("internal error: {0}")]
    Internal(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

// Conversion from sqlx errors
impl From<sqlx::Error> for StratusError {
    fn from(e: sqlx::Error) -> Self {
        StratusError::Database(e.to_string())
    }
}

/// Result type alias for Stratus operations.
pub type Result<T> = std::result::Result<T, StratusError>;
