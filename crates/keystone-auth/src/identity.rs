// Principals and the collaborators the auth core consumes
// Decision: Storage owns Principal; the request pipeline only ever sees RequestIdentity
// Decision: The core never mutates principals

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AuthError;

/// Closed set of application roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "MEMBER" => Ok(Role::Member),
            other => Err(anyhow::anyhow!("unknown role: {}", other)),
        }
    }
}

/// Stored identity record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    /// Disabled principals are rejected at every verification step
    pub enabled: bool,
}

/// Resolves usernames to principals.
///
/// Implementations must read the current state on every call; the `enabled`
/// flag can change out-of-band and is re-checked per request.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<Principal>>;
}

/// Password hashing collaborator
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, plain: &str) -> anyhow::Result<String>;
    fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool>;
}

/// Look up a principal and require it to be enabled
pub async fn load_active_principal(
    provider: &dyn IdentityProvider,
    username: &str,
) -> Result<Principal, AuthError> {
    let principal = provider
        .find_by_username(username)
        .await?
        .ok_or(AuthError::PrincipalNotFound)?;

    if !principal.enabled {
        return Err(AuthError::PrincipalDisabled);
    }

    Ok(principal)
}
