//! Database schema and migrations for Stratus.
//!
//! This module contains all database migrations that will be applied
//! sequentially when the database is first opened or upgraded.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Users table for identity, credentials and storage accounting
    r#"
CREATE TABLE users (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    name                TEXT NOT NULL,
    email               TEXT NOT NULL UNIQUE,
    password            TEXT NOT NULL,           -- Argon2 hash
    avatar              TEXT,
    two_factor_enabled  INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL DEFAULT (datetime('now')),
    last_login          TEXT,
    storage_quota       INTEGER NOT NULL DEFAULT 10737418240,  -- 10 GiB
    storage_used        INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX idx_users_email ON users(email);
"#,
    // v2: Sessions and one-time verification codes
    r#"
CREATE TABLE sessions (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id               INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token_id              TEXT NOT NULL UNIQUE,  -- value embedded in the bearer token
    two_factor_confirmed  INTEGER NOT NULL DEFAULT 0,
    created_at            TEXT NOT NULL DEFAULT (datetime('now')),
    expires_at            TEXT NOT NULL,
    ip_address            TEXT,
    user_agent            TEXT
);

CREATE INDEX idx_sessions_user_id ON sessions(user_id);
CREATE INDEX idx_sessions_token_id ON sessions(token_id);

CREATE TABLE two_factor_codes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    purpose     TEXT NOT NULL,       -- 'register', 'login', 'account_delete'
    code_hash   TEXT NOT NULL,       -- SHA-256 hex, never plaintext
    issued_at   TEXT NOT NULL DEFAULT (datetime('now')),
    expires_at  TEXT NOT NULL,
    used        INTEGER NOT NULL DEFAULT 0,
    ip_address  TEXT
);

CREATE INDEX idx_two_factor_codes_user_purpose ON two_factor_codes(user_id, purpose);
"#,
    // v3: Folders and files
    r#"
CREATE TABLE folders (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    parent_id   INTEGER REFERENCES folders(id) ON DELETE CASCADE,
    path        TEXT NOT NULL,       -- parent path + '/' + name
    deleted     INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at  TEXT
);

CREATE INDEX idx_folders_user_id ON folders(user_id);
CREATE INDEX idx_folders_parent_id ON folders(parent_id);

-- Sibling uniqueness for live folders; COALESCE folds root (NULL parent)
-- into a single bucket so the constraint covers root-level names too.
CREATE UNIQUE INDEX idx_folders_sibling_name
    ON folders(user_id, COALESCE(parent_id, 0), name) WHERE deleted = 0;

CREATE TABLE files (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    folder_id     INTEGER REFERENCES folders(id) ON DELETE CASCADE,
    original_name TEXT NOT NULL,
    stored_name   TEXT NOT NULL UNIQUE,  -- opaque uuid-based blob handle
    size          INTEGER NOT NULL,
    mime_type     TEXT NOT NULL,
    content_hash  TEXT NOT NULL,         -- SHA-256 hex
    is_public     INTEGER NOT NULL DEFAULT 0,
    uploaded_at   TEXT NOT NULL DEFAULT (datetime('now')),
    deleted       INTEGER NOT NULL DEFAULT 0,
    deleted_at    TEXT
);

CREATE INDEX idx_files_user_id ON files(user_id);
CREATE INDEX idx_files_folder_id ON files(folder_id);
"#,
    // v4: Audit log
    r#"
CREATE TABLE audit_logs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER REFERENCES users(id) ON DELETE SET NULL,
    category    TEXT NOT NULL,
    severity    TEXT NOT NULL,
    action      TEXT NOT NULL,
    detail      TEXT,
    metadata    TEXT,                -- JSON
    source_ip   TEXT,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_audit_logs_user_id ON audit_logs(user_id);
CREATE INDEX idx_audit_logs_category ON audit_logs(category);
"#,
    // v5: Contacts and messages (targets of the account-deletion cascade)
    r#"
CREATE TABLE contacts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    email       TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_contacts_user_id ON contacts(user_id);

CREATE TABLE messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    body        TEXT NOT NULL,
    deleted     INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_messages_user_id ON messages(user_id);
"#,
];
