// Keystone authentication and authorization
// Decision: Stateless signed tokens carried in HttpOnly cookies
// Decision: Role-based route policy enforced by a single gate after the authentication pipeline
//
// Request flow: `authenticate` (token -> RequestIdentity) -> `authorize`
// (AccessPolicy) -> handler. Login, refresh and logout are plain handlers that
// go through SessionIssuer.

pub mod config;
pub mod error;
pub mod gate;
pub mod identity;
pub mod jwt;
pub mod memory;
pub mod middleware;
pub mod password;
pub mod routes;
pub mod session;

pub use config::{AuthConfig, ConfigError, CookieConfig, JwtConfig, SigningKey};
pub use error::{ApiResponse, AuthError, TokenError};
pub use gate::{authority, authorize, Access, AccessPolicy, PolicyError, RoutePattern};
pub use identity::{
    load_active_principal, CredentialHasher, IdentityProvider, Principal, Role,
};
pub use jwt::{TokenClaims, TokenCodec, TokenKind};
pub use memory::InMemoryIdentityStore;
pub use middleware::{authenticate, AuthState, OptionalIdentity, RequestIdentity};
pub use password::Argon2Hasher;
pub use routes::{protect, routes};
pub use session::{SessionIssuer, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
