use crate::auth::{AuthError, password::PasswordError};
use crate::config::ConfigError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided, or the token was rejected
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Valid identity without the access level the route requires
    #[error("Insufficient permissions for {resource}")]
    InsufficientPermissions { resource: String },

    /// Invalid request payload, reported against a single field
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Request conflicts with the current state of the resource
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Missing or invalid configuration discovered at use time
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Internal { .. } | Error::Config(_) | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details.
    ///
    /// Authentication and authorization failures collapse to one message each, whatever the
    /// underlying cause.
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::InsufficientPermissions { .. } => "Insufficient permissions".to_string(),
            Error::Validation { message, .. } => message.clone(),
            Error::Conflict { message } => message.clone(),
            Error::Internal { .. } | Error::Config(_) | Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken => Error::Unauthenticated { message: None },
            AuthError::Forbidden => Error::InsufficientPermissions {
                resource: "requested resource".to_string(),
            },
            AuthError::Config(e) => Error::Config(e),
            AuthError::Internal(e) => Error::Other(e),
        }
    }
}

impl From<PasswordError> for Error {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Config(e) => Error::Config(e),
            malformed @ PasswordError::Malformed { .. } => Error::Other(malformed.into()),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Config(_) => {
                tracing::error!("Configuration error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::InsufficientPermissions { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::Validation { .. } | Error::Conflict { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();

        match &self {
            // Field-level detail for validation failures
            Error::Validation { field, message } => {
                let body = json!({
                    "message": message,
                    "field": field,
                });
                (status, Json(body)).into_response()
            }
            _ => (status, self.user_message()).into_response(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
