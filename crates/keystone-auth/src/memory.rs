// In-memory identity store
// Decision: parking_lot RwLock; lookups never hold the lock across an await
// Decision: UUIDs generated via uuid v7 (time-ordered)
//
// Backs the server in development and the test suite. Usernames are unique.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::identity::{IdentityProvider, Principal, Role};

#[derive(Default)]
pub struct InMemoryIdentityStore {
    principals: RwLock<HashMap<String, Principal>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new enabled principal; fails if the username is taken
    pub fn create(&self, username: &str, password_hash: String, role: Role) -> Result<Principal> {
        let mut principals = self.principals.write();
        if principals.contains_key(username) {
            return Err(anyhow!("username already taken: {}", username));
        }

        let principal = Principal {
            id: Uuid::now_v7(),
            username: username.to_string(),
            password_hash,
            role,
            enabled: true,
        };
        principals.insert(username.to_string(), principal.clone());
        Ok(principal)
    }

    /// Returns false when the username is unknown
    pub fn set_enabled(&self, username: &str, enabled: bool) -> bool {
        match self.principals.write().get_mut(username) {
            Some(principal) => {
                principal.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Returns false when the username is unknown
    pub fn set_role(&self, username: &str, role: Role) -> bool {
        match self.principals.write().get_mut(username) {
            Some(principal) => {
                principal.role = role;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.principals.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.read().is_empty()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>> {
        Ok(self.principals.read().get(username).cloned())
    }
}
