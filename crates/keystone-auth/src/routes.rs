// Authentication HTTP routes
// Decision: All auth endpoints live under the configured prefix (default /api/auth)
// Decision: Tokens are only ever returned as cookies, never in response bodies

use axum::{
    extract::{rejection::JsonRejection, State},
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use crate::error::{ApiResponse, AuthError};
use crate::gate::authorize;
use crate::identity::Role;
use crate::middleware::{authenticate, AuthState, RequestIdentity};
use crate::session::REFRESH_TOKEN_COOKIE;

/// Login request
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub username: String,
    pub role: Role,
}

/// Current identity response
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub username: String,
    pub role: Role,
    pub authorities: Vec<String>,
}

impl From<RequestIdentity> for IdentityResponse {
    fn from(identity: RequestIdentity) -> Self {
        Self {
            username: identity.username,
            role: identity.role,
            authorities: identity.authorities,
        }
    }
}

/// Create auth routes under the configured prefix
pub fn routes(state: AuthState) -> Router {
    let prefix = state.config.api_prefix.clone();

    Router::new()
        .route(&format!("{}/login", prefix), post(login))
        .route(&format!("{}/refresh", prefix), post(refresh_token))
        .route(&format!("{}/logout", prefix), post(logout))
        .route(&format!("{}/me", prefix), get(get_current_identity))
        .with_state(state)
}

/// Wrap a router with the authentication pipeline and the authorization gate.
///
/// The pipeline is the outer layer, so the gate always sees the identity it
/// established.
pub fn protect<S>(router: Router<S>, state: AuthState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(from_fn_with_state(state.clone(), authorize))
        .layer(from_fn_with_state(state, authenticate))
}

/// POST {prefix}/login - Login with username and password
pub async fn login(
    State(state): State<AuthState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>), AuthError> {
    let Json(req) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "Login rejected: unreadable request body");
        AuthError::Validation("Username and password are required.".to_string())
    })?;
    let session = state.issuer.login(&req.username, &req.password).await?;
    let jar = state.issuer.attach_session(jar, &session);

    Ok((
        jar,
        Json(LoginResponse {
            username: session.principal.username,
            role: session.principal.role,
        }),
    ))
}

/// POST {prefix}/refresh - New access token from the refresh cookie
pub async fn refresh_token(
    State(state): State<AuthState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse>), AuthError> {
    let refresh_token = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            tracing::warn!("Refresh rejected: no refresh token cookie");
            AuthError::InvalidToken
        })?;

    let access_token = state.issuer.refresh(&refresh_token).await?;

    Ok((
        state.issuer.attach_access(jar, access_token),
        Json(ApiResponse::success("Access token refreshed successfully!")),
    ))
}

/// POST {prefix}/logout - Clear session cookies
pub async fn logout(State(state): State<AuthState>, jar: CookieJar) -> (CookieJar, Json<ApiResponse>) {
    tracing::info!("Session cookies cleared");
    (
        state.issuer.logout(jar),
        Json(ApiResponse::success("Logged out successfully!")),
    )
}

/// GET {prefix}/me - Current identity
pub async fn get_current_identity(identity: RequestIdentity) -> Json<IdentityResponse> {
    Json(identity.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, JwtConfig, SigningKey};
    use crate::gate::AccessPolicy;
    use crate::identity::CredentialHasher;
    use crate::memory::InMemoryIdentityStore;
    use crate::password::Argon2Hasher;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(prefix: &str) -> Router {
        let store = Arc::new(InMemoryIdentityStore::new());
        let hash = Argon2Hasher.hash("s3cret").unwrap();
        store.create("alice", hash, Role::Admin).unwrap();

        let mut config = AuthConfig::new(JwtConfig::new(SigningKey::from_bytes(vec![3; 32]).unwrap()));
        config.api_prefix = prefix.to_string();
        config.cookies.refresh_path = prefix.to_string();

        let policy = AccessPolicy::builder()
            .authenticated(&format!("{}/me", prefix))
            .public(&format!("{}/**", prefix))
            .build()
            .unwrap();
        let state = AuthState::new(config, store, Arc::new(Argon2Hasher), policy);
        protect(routes(state.clone()), state)
    }

    fn login_request(prefix: &str, username: &str, password: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("{}/login", prefix))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::to_vec(&LoginRequest {
                    username: username.to_string(),
                    password: password.to_string(),
                })
                .unwrap(),
            ))
            .unwrap()
    }

    fn set_cookies(response: &axum::response::Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_login_sets_cookies() {
        let response = app("/api/auth")
            .oneshot(login_request("/api/auth", "alice", "s3cret"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 2);
        let access = cookies.iter().find(|c| c.starts_with("accessToken=")).unwrap();
        assert!(access.contains("HttpOnly"));
        assert!(access.contains("Path=/"));
        assert!(access.contains("Max-Age=900"));
        let refresh = cookies.iter().find(|c| c.starts_with("refreshToken=")).unwrap();
        assert!(refresh.contains("Path=/api/auth"));
        assert!(refresh.contains("Max-Age=604800"));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let login: LoginResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(login.username, "alice");
        assert_eq!(login.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let response = app("/api/auth")
            .oneshot(login_request("/api/auth", "alice", "nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response).is_empty());

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let error: ApiResponse = serde_json::from_slice(&body).unwrap();
        assert!(!error.success);
        assert_eq!(error.message, "Incorrect username or password.");
    }

    #[tokio::test]
    async fn test_login_blank_fields() {
        let response = app("/api/auth")
            .oneshot(login_request("/api/auth", "", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_unreadable_body_is_json_error() {
        let bodies = [
            ("application/json", "{not json"),
            ("application/json", r#"{"username":"alice"}"#),
            ("text/plain", r#"{"username":"alice","password":"s3cret"}"#),
        ];

        for (content_type, body) in bodies {
            let request = Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap();
            let response = app("/api/auth").oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
            assert!(set_cookies(&response).is_empty());

            let body = response.into_body().collect().await.unwrap().to_bytes();
            let error: ApiResponse = serde_json::from_slice(&body).unwrap();
            assert!(!error.success);
            assert_eq!(error.message, "Username and password are required.");
        }
    }

    #[tokio::test]
    async fn test_refresh_without_cookie() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/refresh")
            .body(Body::empty())
            .unwrap();
        let response = app("/api/auth").oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let error: ApiResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.message, "Invalid or expired refresh token.");
    }

    #[tokio::test]
    async fn test_logout_clears_cookies() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/logout")
            .body(Body::empty())
            .unwrap();
        let response = app("/api/auth").oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookies = set_cookies(&response);
        let access = cookies.iter().find(|c| c.starts_with("accessToken=;")).unwrap();
        assert!(access.contains("Max-Age=0"));
        assert!(access.contains("Path=/"));
        let refresh = cookies.iter().find(|c| c.starts_with("refreshToken=;")).unwrap();
        assert!(refresh.contains("Max-Age=0"));
        assert!(refresh.contains("Path=/api/auth"));
    }

    #[tokio::test]
    async fn test_me_requires_authentication() {
        let request = Request::builder()
            .uri("/api/auth/me")
            .body(Body::empty())
            .unwrap();
        let response = app("/api/auth").oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let app = app("/auth/v2");
        let response = app
            .clone()
            .oneshot(login_request("/auth/v2", "alice", "s3cret"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert!(cookies
            .iter()
            .any(|c| c.starts_with("refreshToken=") && c.contains("Path=/auth/v2")));

        let response = app
            .oneshot(login_request("/api/auth", "alice", "s3cret"))
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::OK);
        assert!(set_cookies(&response).is_empty());
    }
}
