//! API request/response models for login.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Current one-time code, required once the account has TOTP enabled
    #[serde(default)]
    pub totp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSuccess {
    pub token: String,
}

/// Why a login was refused. Only tells the client whether to prompt for a second factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoginFailureReason {
    Failure,
    MissingTotp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginFailure {
    pub reason: LoginFailureReason,
}

// Response type for login
pub enum LoginResponse {
    Success(LoginSuccess),
    Rejected(LoginFailureReason),
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        match self {
            LoginResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            LoginResponse::Rejected(reason) => (StatusCode::UNAUTHORIZED, Json(LoginFailure { reason })).into_response(),
        }
    }
}
