//! API request and response data models.
//!
//! - [`auth`]: Login request and outcome
//! - [`users`]: Current user profile and credential self-service bodies
//!
//! Secrets (password hash, salt, TOTP secret) never appear in a response model.

pub mod auth;
pub mod users;
