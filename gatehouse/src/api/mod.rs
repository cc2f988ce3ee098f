//! HTTP surface of the authentication core.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response bodies
//!
//! Only the login, logout and self-service routes live here. Resource controllers (`/api/hosts`,
//! `/api/certificates`, ...) are mounted by the embedding server behind the same authorization
//! middleware.

pub mod handlers;
pub mod models;
