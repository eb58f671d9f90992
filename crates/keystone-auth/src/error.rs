// Authentication error taxonomy
// Decision: Client-facing messages are generic; the variant is kept for logging only

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::jwt::TokenKind;

/// Token verification and issuance failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Not a well-formed signed token
    #[error("malformed token")]
    Malformed,
    /// Signature does not match the payload
    #[error("bad token signature")]
    BadSignature,
    /// Signature valid, expiry elapsed
    #[error("token expired")]
    Expired,
    /// Valid token of the other kind (access vs refresh)
    #[error("expected {expected} token, got {found}")]
    WrongKind { expected: TokenKind, found: TokenKind },
    /// Token could not be built or signed
    #[error("failed to encode token: {0}")]
    Encoding(String),
}

/// Authentication and authorization failures
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid token")]
    InvalidToken,

    #[error("principal not found")]
    PrincipalNotFound,

    #[error("principal disabled")]
    PrincipalDisabled,

    #[error("authentication required")]
    Unauthenticated,

    #[error("access denied")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::PrincipalNotFound
            | AuthError::PrincipalDisabled
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message safe to show to the client
    pub fn public_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => "Incorrect username or password.".to_string(),
            AuthError::InvalidToken => "Invalid or expired refresh token.".to_string(),
            AuthError::PrincipalNotFound
            | AuthError::PrincipalDisabled
            | AuthError::Unauthenticated => "Authentication required.".to_string(),
            AuthError::Forbidden => "Access denied.".to_string(),
            AuthError::Validation(message) => message.clone(),
            AuthError::Internal(_) => "An unexpected error occurred.".to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ApiResponse::failure(self.public_message()))).into_response()
    }
}

/// Generic success/failure body used by the auth API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
