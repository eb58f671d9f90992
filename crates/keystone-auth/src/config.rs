// Authentication configuration loaded from environment variables.
// Decision: AUTH_ prefix for all auth config
// Decision: Missing or malformed signing secret is a startup error, never a per-request one

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::time::Duration;

/// Minimum decoded key length for HS256 (256 bits)
pub const MIN_SECRET_BYTES: usize = 32;

/// Default auth API prefix; also the refresh cookie path
pub const DEFAULT_API_PREFIX: &str = "/api/auth";

/// Longest accepted token lifetime; keeps cookie `Max-Age` within a 32-bit int
pub const MAX_LIFETIME_SECS: u64 = i32::MAX as u64;

/// Configuration errors raised while loading auth settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("AUTH_JWT_SECRET is not set")]
    MissingSecret,

    #[error("AUTH_JWT_SECRET is not valid base64: {0}")]
    InvalidSecret(#[from] base64::DecodeError),

    #[error("AUTH_JWT_SECRET decodes to {0} bytes, at least 32 are required")]
    SecretTooShort(usize),

    #[error("{name} must be between 1 and {max} seconds, got {value:?}", max = MAX_LIFETIME_SECS)]
    InvalidLifetime { name: &'static str, value: String },

    #[error("AUTH_API_PREFIX must start with '/', got {0:?}")]
    InvalidApiPrefix(String),
}

/// Symmetric signing key, decoded once at startup
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Decode a base64 secret and enforce the minimum key length
    pub fn from_base64(encoded: &str) -> Result<Self, ConfigError> {
        let bytes = STANDARD.decode(encoded.trim())?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ConfigError> {
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::SecretTooShort(bytes.len()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey(<{} bytes redacted>)", self.0.len())
    }
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Key for signing and verifying tokens
    pub signing_key: SigningKey,
    /// Access token lifetime
    pub access_token_lifetime: Duration,
    /// Refresh token lifetime
    pub refresh_token_lifetime: Duration,
}

impl JwtConfig {
    pub fn new(signing_key: SigningKey) -> Self {
        Self {
            signing_key,
            access_token_lifetime: Duration::from_secs(15 * 60), // 15 minutes
            refresh_token_lifetime: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
        }
    }
}

/// Cookie attributes shared by issuance and clearing
#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Whether cookies carry the Secure attribute (HTTPS deployments)
    pub secure: bool,
    /// Path of the refresh cookie; keeps it away from application routes
    pub refresh_path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secure: false,
            refresh_path: DEFAULT_API_PREFIX.to_string(),
        }
    }
}

/// Complete authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT configuration
    pub jwt: JwtConfig,
    /// Cookie configuration
    pub cookies: CookieConfig,
    /// Prefix under which the auth routes are mounted
    pub api_prefix: String,
}

impl AuthConfig {
    pub fn new(jwt: JwtConfig) -> Self {
        Self {
            jwt,
            cookies: CookieConfig::default(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("AUTH_JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)?;
        let signing_key = SigningKey::from_base64(&secret)?;

        let access_token_lifetime = parse_lifetime(
            &lookup,
            "AUTH_ACCESS_TOKEN_LIFETIME",
            Duration::from_secs(15 * 60),
        )?;
        let refresh_token_lifetime = parse_lifetime(
            &lookup,
            "AUTH_REFRESH_TOKEN_LIFETIME",
            Duration::from_secs(7 * 24 * 60 * 60),
        )?;

        let api_prefix = lookup("AUTH_API_PREFIX")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_API_PREFIX.to_string());
        if !api_prefix.starts_with('/') {
            return Err(ConfigError::InvalidApiPrefix(api_prefix));
        }

        let secure = lookup("AUTH_COOKIE_SECURE")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(false);

        Ok(Self {
            jwt: JwtConfig {
                signing_key,
                access_token_lifetime,
                refresh_token_lifetime,
            },
            cookies: CookieConfig {
                secure,
                refresh_path: api_prefix.clone(),
            },
            api_prefix,
        })
    }
}

fn parse_lifetime<F>(lookup: &F, name: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => match value.trim().parse::<u64>() {
            Ok(secs) if (1..=MAX_LIFETIME_SECS).contains(&secs) => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::InvalidLifetime { name, value }),
        },
    }
}
