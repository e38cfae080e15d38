pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod notifications;
pub mod password;
pub mod rate_limit;
pub mod transactions;

use api::{ApiError, create_api_router};
use axum::{Router, middleware, response::IntoResponse};
use db::Database;
use jwt::{JwtConfig, JwtError};
use notifications::NotificationHub;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// IP extraction strategy (requires running behind a proxy)
    pub ip_extractor: Option<cli::IpExtractor>,
    /// Per-IP limits for login and registration
    pub rate_limits: RateLimitConfig,
}

async fn not_found() -> impl IntoResponse {
    ApiError::not_found("Not found")
}

/// Create the application router with the given configuration.
/// Fails only when the JWT secret is missing.
pub fn create_app(config: &ServerConfig) -> Result<Router, JwtError> {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret)?);

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        NotificationHub::new(),
        config.secure_cookies,
        config.ip_extractor.clone(),
        config.rate_limits.clone(),
    );

    // Pages are rendered elsewhere; the guard still runs in front of every non-API path
    Ok(Router::new()
        .nest("/api", api_router)
        .fallback(not_found)
        .layer(middleware::from_fn(auth::route_guard)))
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config).map_err(std::io::Error::other)?;
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    init_cleanup(&config.db).await;

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
