//! Authentication and authorization pipeline.
//!
//! Every request passes through [`middleware::authorization_middleware`], which decides, in order:
//!
//! 1. whether the route needs a token at all ([`permissions::PermissionRegistry`])
//! 2. who is calling: the bearer token is checked by [`session::TokenService`] and its subject is
//!    resolved through the [`crate::users::UserDirectory`]
//! 3. whether the caller may perform this method on this resource category
//!
//! On success the token may be renewed (sliding window) and the resolved [`session::Subject`] is
//! attached to the request for handlers to extract.
//!
//! # Credentials
//!
//! Logins go through [`credentials::CredentialVerifier`]: an iterated SHA-512 password check
//! ([`password`]) followed by an optional TOTP second factor ([`totp`]).
//!
//! # Modules
//!
//! - [`credentials`]: Login authentication and credential self-service
//! - [`current_user`]: Extractor for the authenticated subject in handlers
//! - [`middleware`]: The per-request authorization interceptor
//! - [`password`]: Password hashing and verification
//! - [`permissions`]: Route to resource category registry
//! - [`revocation`]: Revoked token set
//! - [`session`]: Token issuance, validation and refresh
//! - [`totp`]: One-time password enrollment and checks
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use gatehouse::auth::session::Subject;
//!
//! async fn whoami(subject: Subject) -> String {
//!     format!("Hello, {}!", subject.user.username)
//! }
//! ```

pub mod credentials;
pub mod current_user;
pub mod middleware;
pub mod password;
pub mod permissions;
pub mod revocation;
pub mod session;
pub mod totp;

use crate::config::ConfigError;

/// Failure of the token pipeline.
///
/// `InvalidToken` covers every reason a token is not accepted (malformed, wrong algorithm or
/// signature, expired, not yet valid, revoked, unknown or disabled subject). The cause is logged,
/// never returned.
#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("invalid token")]
    InvalidToken,

    #[error("forbidden")]
    Forbidden,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Internal(anyhow::Error),
}
