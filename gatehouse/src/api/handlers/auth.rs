use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    api::models::auth::{LoginFailureReason, LoginRequest, LoginResponse, LoginSuccess},
    auth::{credentials::AuthenticationOutcome, session::Subject},
    errors::Error,
    types::abbrev_uuid,
};

/// Login with username, password and, when enabled, a TOTP code
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    let outcome = state
        .credentials
        .authenticate(&request.username, &request.password, request.totp.as_deref())
        .await?;

    match outcome {
        AuthenticationOutcome::Success(user) => {
            let token = state.tokens.issue(&user)?;
            Ok(LoginResponse::Success(LoginSuccess { token }))
        }
        AuthenticationOutcome::Failure => Ok(LoginResponse::Rejected(LoginFailureReason::Failure)),
        AuthenticationOutcome::MissingTotp => Ok(LoginResponse::Rejected(LoginFailureReason::MissingTotp)),
    }
}

/// Logout (revoke the presented token)
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&subject.user.id)))]
pub async fn logout(State(state): State<AppState>, subject: Subject) -> StatusCode {
    state.tokens.revoke(subject.token_id, subject.claims.exp);
    tracing::info!(token_id = %abbrev_uuid(&subject.token_id), "Session revoked");
    StatusCode::NO_CONTENT
}
