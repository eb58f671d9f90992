// Keystone API server
// Decision: Configuration from environment (optionally a .env file); bad auth config is fatal
// Decision: In-memory identity store seeded at startup

mod app;
mod seed;
mod telemetry;

use anyhow::{Context, Result};
use axum::http::Method;
use keystone_auth::{
    Access, AccessPolicy, Argon2Hasher, AuthConfig, AuthState, InMemoryIdentityStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::telemetry::{init_telemetry, TelemetryConfig};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; real deployments set the environment directly
    let dotenv = dotenvy::dotenv();

    init_telemetry(TelemetryConfig::from_env());
    tracing::info!("keystone-server starting...");
    if let Ok(path) = dotenv {
        tracing::info!("Loaded environment from {}", path.display());
    }

    // Load authentication configuration
    let auth_config = AuthConfig::from_env().context("Invalid authentication configuration")?;
    tracing::info!(
        api_prefix = %auth_config.api_prefix,
        access_token_lifetime_secs = auth_config.jwt.access_token_lifetime.as_secs(),
        refresh_token_lifetime_secs = auth_config.jwt.refresh_token_lifetime.as_secs(),
        secure_cookies = auth_config.cookies.secure,
        "Authentication configured"
    );

    // Load access policy
    let policy_path = std::env::var("AUTH_POLICY_PATH")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from);
    let policy = AccessPolicy::load(policy_path.as_deref())?;
    tracing::info!(rules = policy.rules().len(), "Access policy loaded");

    let login_path = format!("{}/login", auth_config.api_prefix);
    if policy.resolve(&Method::POST, &login_path) != &Access::Public {
        tracing::warn!(path = %login_path, "Login route is not public under the access policy");
    }

    // Identity store and seed accounts
    let store = Arc::new(InMemoryIdentityStore::new());
    let hasher = Arc::new(Argon2Hasher);
    let accounts = seed::accounts_from_env()?;
    seed::seed_accounts(&store, hasher.as_ref(), &accounts)?;
    if store.is_empty() {
        tracing::warn!("No accounts configured; every login will fail");
    }

    let state = AuthState::new(auth_config, store, hasher, policy);

    // Load CORS allowed origins from environment (optional)
    // Only needed when the UI is served from a different origin than the API
    let cors_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .map(|s| app::parse_origins(&s))
        .unwrap_or_default();
    if cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
    } else {
        tracing::info!(origins = ?cors_origins, "CORS origins configured");
    }

    let app = app::with_cors(app::build_app(state), cors_origins);

    // Add tracing
    let app = app.layer(TraceLayer::new_for_http());

    // Start HTTP server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
