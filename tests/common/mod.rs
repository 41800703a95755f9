//! Shared setup for API tests.

use std::sync::Arc;

use axum_test::TestServer;

use stratus::auth::{AuthService, SessionManager, TwoFactorEngine};
use stratus::file::{BlobStore, FileService};
use stratus::mail::testing::CapturingSender;
use stratus::web::{create_router, AppState};
use stratus::Database;

pub const TOKEN_SECRET: &str = "test-secret";

/// A fully wired in-memory server plus the handles tests poke at.
pub struct TestApp {
    pub server: TestServer,
    pub sender: Arc<CapturingSender>,
    pub db: Database,
    // Held so blob storage survives for the duration of the test
    _storage_dir: tempfile::TempDir,
}

pub async fn spawn_app() -> TestApp {
    let db = Database::open_in_memory().await.unwrap();
    let pool = db.pool().clone();
    let sender = Arc::new(CapturingSender::default());
    let storage_dir = tempfile::tempdir().unwrap();

    let sessions = SessionManager::new(pool.clone(), TOKEN_SECRET, 24);
    let codes = TwoFactorEngine::new(pool.clone(), 15);
    let auth = AuthService::new(pool.clone(), sessions, codes, sender.clone());
    let files = FileService::new(pool, BlobStore::new(storage_dir.path()));

    let state = Arc::new(AppState::new(auth, files));
    let server = TestServer::new(create_router(state)).unwrap();

    TestApp {
        server,
        sender,
        db,
        _storage_dir: storage_dir,
    }
}

/// Run the full registration flow and return the bearer token.
pub async fn register_and_login(app: &TestApp, email: &str, password: &str) -> String {
    let response = app
        .server
        .post("/api/auth/register")
        .json(&serde_json::json!({
            "name": "Test User",
            "email": email,
            "password": password,
        }))
        .await;
    response.assert_status_ok();

    let code = app.sender.last_code().unwrap();
    let response = app
        .server
        .post("/api/auth/register/verify")
        .json(&serde_json::json!({ "email": email, "code": code }))
        .await;
    response.assert_status_ok();
    response.json::<serde_json::Value>()["token"]
        .as_str()
        .unwrap()
        .to_string()
}
