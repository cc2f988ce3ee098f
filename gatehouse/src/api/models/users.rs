//! API request/response models for the current user.

use serde::{Deserialize, Serialize};

use crate::{
    types::{Permissions, UserId},
    users::User,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUserResponse {
    pub id: UserId,
    pub username: String,
    pub name: String,
    pub permissions: Permissions,
    pub totp_enabled: bool,
}

impl From<&User> for CurrentUserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            permissions: user.permissions,
            totp_enabled: user.totp.is_enabled(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotpStatusResponse {
    pub enabled: bool,
}

/// Provisioning URI to hand to an authenticator app
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotpEnrollmentResponse {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotpActivationRequest {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotpActivationResponse {
    pub activated: bool,
}
