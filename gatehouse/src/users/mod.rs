//! User records as seen by the authentication core.
//!
//! Persistence lives outside this crate. The core only needs to look users up by ID or username
//! and to write back the few fields it owns (password and TOTP enrollment), which is what the
//! [`UserDirectory`] trait captures.

mod directory;

pub use directory::{InMemoryUsers, UserDirectory};

use crate::types::{Permissions, UserId};

/// Second-factor enrollment state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Totp {
    /// Base32 shared secret
    pub secret: Option<String>,
    pub validated: bool,
}

impl Totp {
    /// A secret is present, non-blank and has been confirmed with a valid code.
    pub fn is_enabled(&self) -> bool {
        self.validated && self.secret.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub name: String,
    pub enabled: bool,
    /// Base64 digest, see [`crate::auth::password`]
    pub password_hash: String,
    /// Base64 salt
    pub password_salt: String,
    pub totp: Totp,
    pub permissions: Permissions,
}
