use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use stratus::auth::{AuthService, SessionManager, TwoFactorEngine};
use stratus::file::{BlobStore, FileService};
use stratus::web::{create_router, AppState};
use stratus::{Config, Database, StratusError, TracingSender};

#[tokio::main]
async fn main() -> stratus::Result<()> {
    // Load configuration
    let config = match Config::load("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };

    // Initialize logging
    if let Err(e) = stratus::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        stratus::logging::init_console_only(&config.logging.level);
    }

    info!("Stratus - personal cloud storage backend");

    let db = Database::open(&config.database.path).await?;
    let pool = db.pool().clone();

    let sessions = SessionManager::new(
        pool.clone(),
        &config.auth.token_secret,
        config.auth.session_ttl_hours,
    );
    let codes = TwoFactorEngine::new(pool.clone(), config.auth.code_ttl_minutes);
    let auth = AuthService::new(pool.clone(), sessions, codes, Arc::new(TracingSender));
    let files = FileService::new(pool, BlobStore::new(&config.storage.path));

    let state = Arc::new(AppState::new(auth, files));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| StratusError::Config(format!("invalid bind address: {e}")))?;
    info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
