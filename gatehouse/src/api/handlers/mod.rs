//! HTTP request handlers.
//!
//! # Handler Modules
//!
//! - [`auth`]: Login and logout (`/api/authentication/*`)
//! - [`users`]: The caller's own profile, password and second factor (`/api/users/current/*`)
//!
//! Handlers never check permissions themselves: by the time they run the authorization
//! middleware has already resolved the [`crate::auth::session::Subject`].

pub mod auth;
pub mod users;
