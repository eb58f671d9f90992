// Session issuance: login, refresh, logout
// Decision: Tokens travel in HttpOnly cookies; the server keeps no session state
// Decision: One builder per cookie kind, shared by issue and clear, so paths always agree
// Decision: Refresh re-resolves the principal; a disabled account cannot mint new access tokens
// Decision: Unknown and disabled users still pay for one credential check against a dummy hash

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::config::CookieConfig;
use crate::error::AuthError;
use crate::identity::{load_active_principal, CredentialHasher, IdentityProvider, Principal};
use crate::jwt::{TokenCodec, TokenKind};

/// Cookie carrying the access token
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Cookie carrying the refresh token
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Input for the dummy hash checked when no real one is available
const DUMMY_PASSWORD: &str = "keystone-dummy-password";

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub principal: Principal,
    pub access_token: String,
    pub refresh_token: String,
}

pub struct SessionIssuer {
    codec: Arc<TokenCodec>,
    identity: Arc<dyn IdentityProvider>,
    hasher: Arc<dyn CredentialHasher>,
    cookies: CookieConfig,
    dummy_hash: OnceLock<String>,
}

impl SessionIssuer {
    pub fn new(
        codec: Arc<TokenCodec>,
        identity: Arc<dyn IdentityProvider>,
        hasher: Arc<dyn CredentialHasher>,
        cookies: CookieConfig,
    ) -> Self {
        Self {
            codec,
            identity,
            hasher,
            cookies,
            dummy_hash: OnceLock::new(),
        }
    }

    /// Check credentials and issue an access/refresh token pair.
    ///
    /// Unknown user, disabled user and wrong password all fail with the same
    /// `InvalidCredentials`.
    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedSession, AuthError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Username and password are required.".to_string(),
            ));
        }

        let principal = match load_active_principal(self.identity.as_ref(), username).await {
            Ok(principal) => principal,
            Err(AuthError::Internal(e)) => {
                tracing::error!(username, error = %e, "Login failed: identity lookup error");
                return Err(AuthError::Internal(e));
            }
            Err(e) => {
                tracing::warn!(username, reason = %e, "Login failed");
                self.check_dummy_credential(password);
                return Err(AuthError::InvalidCredentials);
            }
        };

        let password_matches = self
            .hasher
            .verify(password, &principal.password_hash)
            .map_err(|e| {
                tracing::error!(username, error = %e, "Login failed: credential check error");
                AuthError::Internal(e)
            })?;

        if !password_matches {
            tracing::warn!(username, "Login failed: incorrect password");
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = self
            .codec
            .issue_access(&principal.username, principal.role)
            .map_err(|e| issuance_failure(username, e))?;
        let refresh_token = self
            .codec
            .issue_refresh(&principal.username)
            .map_err(|e| issuance_failure(username, e))?;

        tracing::info!(username, role = %principal.role, "User logged in");

        Ok(IssuedSession {
            principal,
            access_token,
            refresh_token,
        })
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The refresh token itself is not rotated. Every failure other than an
    /// internal one is reported as `InvalidToken`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self
            .codec
            .verify_kind(refresh_token, TokenKind::Refresh)
            .map_err(|e| {
                tracing::warn!(error = %e, "Refresh rejected: invalid refresh token");
                AuthError::InvalidToken
            })?;
        let username = claims.sub.as_str();

        let principal = match load_active_principal(self.identity.as_ref(), username).await {
            Ok(principal) => principal,
            Err(AuthError::Internal(e)) => {
                tracing::error!(username, error = %e, "Refresh failed: identity lookup error");
                return Err(AuthError::Internal(e));
            }
            Err(e) => {
                tracing::warn!(username, reason = %e, "Refresh rejected");
                return Err(AuthError::InvalidToken);
            }
        };

        let access_token = self
            .codec
            .issue_access(&principal.username, principal.role)
            .map_err(|e| issuance_failure(username, e))?;

        tracing::info!(username, role = %principal.role, "Access token refreshed");
        Ok(access_token)
    }

    /// Run one credential check whose outcome is discarded, so a login for a
    /// missing or disabled account takes as long as a wrong password.
    fn check_dummy_credential(&self, password: &str) {
        let dummy = match self.dummy_hash.get() {
            Some(hash) => hash,
            None => match self.hasher.hash(DUMMY_PASSWORD) {
                Ok(hash) => self.dummy_hash.get_or_init(|| hash),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to build dummy credential hash");
                    return;
                }
            },
        };

        if let Err(e) = self.hasher.verify(password, dummy) {
            tracing::debug!(error = %e, "Dummy credential check failed");
        }
    }

    /// Set both session cookies
    pub fn attach_session(&self, jar: CookieJar, session: &IssuedSession) -> CookieJar {
        jar.add(self.access_cookie(
            session.access_token.clone(),
            self.codec.access_token_lifetime(),
        ))
        .add(self.refresh_cookie(
            session.refresh_token.clone(),
            self.codec.refresh_token_lifetime(),
        ))
    }

    /// Replace the access cookie only
    pub fn attach_access(&self, jar: CookieJar, access_token: String) -> CookieJar {
        jar.add(self.access_cookie(access_token, self.codec.access_token_lifetime()))
    }

    /// Clear both session cookies. Already-issued tokens stay valid until expiry.
    pub fn logout(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.access_cookie(String::new(), Duration::ZERO))
            .add(self.refresh_cookie(String::new(), Duration::ZERO))
    }

    fn access_cookie(&self, value: String, max_age: Duration) -> Cookie<'static> {
        Cookie::build((ACCESS_TOKEN_COOKIE, value))
            .path("/")
            .http_only(true)
            .secure(self.cookies.secure)
            .same_site(SameSite::Lax)
            .max_age(cookie_max_age(max_age))
            .build()
    }

    fn refresh_cookie(&self, value: String, max_age: Duration) -> Cookie<'static> {
        Cookie::build((REFRESH_TOKEN_COOKIE, value))
            .path(self.cookies.refresh_path.clone())
            .http_only(true)
            .secure(self.cookies.secure)
            .same_site(SameSite::Strict)
            .max_age(cookie_max_age(max_age))
            .build()
    }
}

fn cookie_max_age(lifetime: Duration) -> time::Duration {
    time::Duration::seconds(i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX))
}

fn issuance_failure(username: &str, e: crate::error::TokenError) -> AuthError {
    tracing::error!(username, error = %e, "Failed to issue token");
    AuthError::Internal(anyhow::anyhow!("token issuance failed: {}", e))
}
