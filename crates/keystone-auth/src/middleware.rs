// Authentication pipeline and extractors
// Decision: Support both cookie-based (browser) and header-based (API) tokens, cookie first
// Decision: Token and lookup failures never end the request here; the gate decides
// Decision: The role comes from the principal as stored now, not from the token

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::error::{AuthError, TokenError};
use crate::gate::{authority, AccessPolicy};
use crate::identity::{load_active_principal, CredentialHasher, IdentityProvider, Principal, Role};
use crate::jwt::{TokenCodec, TokenKind};
use crate::session::{SessionIssuer, ACCESS_TOKEN_COOKIE};

/// Auth state shared across routes and middleware
#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<AuthConfig>,
    pub codec: Arc<TokenCodec>,
    pub identity: Arc<dyn IdentityProvider>,
    pub issuer: Arc<SessionIssuer>,
    pub policy: Arc<AccessPolicy>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        identity: Arc<dyn IdentityProvider>,
        hasher: Arc<dyn CredentialHasher>,
        policy: AccessPolicy,
    ) -> Self {
        let codec = Arc::new(TokenCodec::new(config.jwt.clone()));
        let issuer = Arc::new(SessionIssuer::new(
            codec.clone(),
            identity.clone(),
            hasher,
            config.cookies.clone(),
        ));
        Self {
            config: Arc::new(config),
            codec,
            identity,
            issuer,
            policy: Arc::new(policy),
        }
    }
}

/// Identity established for the current request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestIdentity {
    pub username: String,
    pub role: Role,
    /// Granted authorities, e.g. `ROLE_ADMIN`
    pub authorities: Vec<String>,
}

impl RequestIdentity {
    pub fn from_principal(principal: &Principal) -> Self {
        Self {
            username: principal.username.clone(),
            role: principal.role,
            authorities: vec![authority(principal.role)],
        }
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.has_authority(&authority(role))
    }
}

/// Establish the request identity from the access token, if any.
///
/// Always passes the request on. Requests that already carry an identity are
/// left untouched.
pub async fn authenticate(State(state): State<AuthState>, mut req: Request, next: Next) -> Response {
    if req.extensions().get::<RequestIdentity>().is_some() {
        return next.run(req).await;
    }

    let Some(token) = extract_token(req.headers()) else {
        return next.run(req).await;
    };
    let path = req.uri().path().to_owned();

    if let Some(identity) = resolve_identity(&state, &token, &path).await {
        tracing::debug!(username = %identity.username, role = %identity.role, path = %path, "Authenticated request");
        req.extensions_mut().insert(identity);
    }

    next.run(req).await
}

/// Access token from the `accessToken` cookie, else from `Authorization: Bearer`
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

async fn resolve_identity(state: &AuthState, token: &str, path: &str) -> Option<RequestIdentity> {
    let claims = match state.codec.verify_kind(token, TokenKind::Access) {
        Ok(claims) => claims,
        Err(TokenError::Expired) => {
            tracing::debug!(path, "Access token expired");
            return None;
        }
        Err(e) => {
            tracing::warn!(path, error = %e, "Access token rejected");
            return None;
        }
    };

    match load_active_principal(state.identity.as_ref(), &claims.sub).await {
        Ok(principal) => Some(RequestIdentity::from_principal(&principal)),
        Err(AuthError::Internal(e)) => {
            tracing::error!(username = %claims.sub, path, error = %e, "Identity lookup failed");
            None
        }
        Err(e) => {
            tracing::warn!(username = %claims.sub, path, reason = %e, "Token subject not accepted");
            None
        }
    }
}

/// Extractor for the authenticated identity
/// This is required - returns 401 if the pipeline established none
#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestIdentity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestIdentity>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

/// Optional identity extractor - `None` for anonymous requests
#[derive(Debug, Clone)]
pub struct OptionalIdentity(pub Option<RequestIdentity>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalIdentity(
            parts.extensions.get::<RequestIdentity>().cloned(),
        ))
    }
}
