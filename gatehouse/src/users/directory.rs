//! User lookup collaborator.

use anyhow::bail;
use dashmap::DashMap;

use super::{Totp, User};
use crate::types::UserId;

/// Read/write access to user records.
///
/// Implementations own their consistency guarantees. Callers never hold a lock while awaiting
/// these methods.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    /// Get a user by ID
    async fn find_by_id(&self, id: UserId) -> anyhow::Result<Option<User>>;

    /// Get a user by their unique username
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;

    /// Insert or replace a user
    async fn save(&self, user: &User) -> anyhow::Result<()>;

    /// Replace only the password hash and salt. Returns `false` if the user does not exist.
    async fn update_password(&self, id: UserId, hash: &str, salt: &str) -> anyhow::Result<bool>;

    /// Replace only the TOTP enrollment. Returns `false` if the user does not exist.
    async fn update_totp(&self, id: UserId, totp: &Totp) -> anyhow::Result<bool>;
}

/// Process-local directory, used for the bootstrap administrator and in tests.
#[derive(Debug, Default)]
pub struct InMemoryUsers {
    users: DashMap<UserId, User>,
}

impl InMemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait::async_trait]
impl UserDirectory for InMemoryUsers {
    async fn find_by_id(&self, id: UserId) -> anyhow::Result<Option<User>> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.username == username)
            .map(|entry| entry.value().clone()))
    }

    async fn save(&self, user: &User) -> anyhow::Result<()> {
        if self.users.iter().any(|entry| entry.username == user.username && entry.id != user.id) {
            bail!("username '{}' is already taken", user.username);
        }
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_password(&self, id: UserId, hash: &str, salt: &str) -> anyhow::Result<bool> {
        let Some(mut user) = self.users.get_mut(&id) else {
            return Ok(false);
        };
        user.password_hash = hash.to_string();
        user.password_salt = salt.to_string();
        Ok(true)
    }

    async fn update_totp(&self, id: UserId, totp: &Totp) -> anyhow::Result<bool> {
        let Some(mut user) = self.users.get_mut(&id) else {
            return Ok(false);
        };
        user.totp = totp.clone();
        Ok(true)
    }
}
