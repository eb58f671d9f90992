// Startup account seeding
// Decision: Accounts come from environment variables; passwords are hashed before storage
// Decision: A half-configured account (username without password or vice versa) is a startup error

use anyhow::{bail, Context, Result};
use keystone_auth::{CredentialHasher, InMemoryIdentityStore, Role};

/// Account to create at startup
pub struct SeedAccount {
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// Read seed accounts from the process environment
pub fn accounts_from_env() -> Result<Vec<SeedAccount>> {
    accounts_from_lookup(|key| std::env::var(key).ok())
}

/// Environment variables:
/// - `AUTH_ADMIN_USERNAME` / `AUTH_ADMIN_PASSWORD`: ADMIN account
/// - `AUTH_MEMBER_USERNAME` / `AUTH_MEMBER_PASSWORD`: MEMBER account
pub fn accounts_from_lookup<F>(lookup: F) -> Result<Vec<SeedAccount>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut accounts = Vec::new();

    for (role, prefix) in [(Role::Admin, "AUTH_ADMIN"), (Role::Member, "AUTH_MEMBER")] {
        let username = lookup(&format!("{}_USERNAME", prefix)).filter(|s| !s.trim().is_empty());
        let password = lookup(&format!("{}_PASSWORD", prefix)).filter(|s| !s.is_empty());

        match (username, password) {
            (Some(username), Some(password)) => accounts.push(SeedAccount {
                username: username.trim().to_string(),
                password,
                role,
            }),
            (None, None) => {}
            _ => bail!(
                "{prefix}_USERNAME and {prefix}_PASSWORD must be set together",
                prefix = prefix
            ),
        }
    }

    Ok(accounts)
}

/// Create each account in the store. Returns the number created.
pub fn seed_accounts(
    store: &InMemoryIdentityStore,
    hasher: &dyn CredentialHasher,
    accounts: &[SeedAccount],
) -> Result<usize> {
    for account in accounts {
        let hash = hasher
            .hash(&account.password)
            .with_context(|| format!("Failed to hash password for {}", account.username))?;
        store
            .create(&account.username, hash, account.role)
            .with_context(|| format!("Failed to seed account {}", account.username))?;
        tracing::info!(username = %account.username, role = %account.role, "Seeded account");
    }

    Ok(accounts.len())
}
