// HTTP application assembly
// Decision: Every route, auth API included, sits behind the same pipeline and gate
// Decision: CORS is opt-in; credentials are allowed so cookies cross origins

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use keystone_auth::{protect, routes::IdentityResponse, AuthState, RequestIdentity};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/user/details - Caller's identity
async fn user_details(identity: RequestIdentity) -> Json<IdentityResponse> {
    Json(identity.into())
}

/// Application routes plus the auth API, protected by the access policy
pub fn build_app(state: AuthState) -> Router {
    let app = Router::new()
        .route("/health", get(health))
        .route("/api/user/details", get(user_details))
        .merge(keystone_auth::routes(state.clone()));

    protect(app, state)
}

/// Parse a comma-separated origin list; invalid entries are dropped
pub fn parse_origins(value: &str) -> Vec<HeaderValue> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}

/// Add a CORS layer when origins are configured
pub fn with_cors(app: Router, origins: Vec<HeaderValue>) -> Router {
    if origins.is_empty() {
        return app;
    }

    app.layer(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::ACCEPT,
                header::ORIGIN,
                header::CACHE_CONTROL,
            ])
            .allow_credentials(true),
    )
}
