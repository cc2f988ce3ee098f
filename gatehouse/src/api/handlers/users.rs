use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    api::models::users::{
        ChangePasswordRequest, CurrentUserResponse, TotpActivationRequest, TotpActivationResponse, TotpEnrollmentResponse,
        TotpStatusResponse,
    },
    auth::session::Subject,
    errors::Error,
};

/// Get the authenticated user's profile
#[tracing::instrument(skip_all)]
pub async fn get_current_user(subject: Subject) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse::from(&subject.user))
}

#[tracing::instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    subject: Subject,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, Error> {
    state
        .credentials
        .change_password(subject.user.id, &request.current_password, &request.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip_all)]
pub async fn get_totp_status(State(state): State<AppState>, subject: Subject) -> Result<Json<TotpStatusResponse>, Error> {
    let enabled = state.credentials.totp_status(subject.user.id).await?;
    Ok(Json(TotpStatusResponse { enabled }))
}

/// Start TOTP enrollment. Fails with 409 while TOTP is already enabled.
#[tracing::instrument(skip_all)]
pub async fn enable_totp(State(state): State<AppState>, subject: Subject) -> Result<Json<TotpEnrollmentResponse>, Error> {
    let url = state.credentials.enable_totp(subject.user.id).await?;
    Ok(Json(TotpEnrollmentResponse { url }))
}

#[tracing::instrument(skip_all)]
pub async fn activate_totp(
    State(state): State<AppState>,
    subject: Subject,
    Json(request): Json<TotpActivationRequest>,
) -> Result<Json<TotpActivationResponse>, Error> {
    let activated = state.credentials.activate_totp(subject.user.id, &request.code).await?;
    Ok(Json(TotpActivationResponse { activated }))
}

#[tracing::instrument(skip_all)]
pub async fn disable_totp(State(state): State<AppState>, subject: Subject) -> Result<StatusCode, Error> {
    state.credentials.disable_totp(subject.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::models::users::{CurrentUserResponse, TotpActivationResponse, TotpEnrollmentResponse, TotpStatusResponse};
    use crate::test_utils::{TEST_PASSWORD, bearer, create_test_server, create_test_user, totp_code};
    use crate::types::{AccessLevel, Permissions, ResourceCategory};
    use crate::users::UserDirectory;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_current_user() {
        let (server, state, users) = create_test_server().await;
        let permissions = Permissions::none().with(ResourceCategory::Certificates, AccessLevel::ReadOnly);
        let user = create_test_user(&users, "operator", permissions).await;
        let token = state.tokens.issue(&user).unwrap();

        let response = server
            .get("/api/users/current")
            .add_header("authorization", bearer(&token))
            .await;

        response.assert_status(StatusCode::OK);
        let body: CurrentUserResponse = response.json();
        assert_eq!(body.id, user.id);
        assert_eq!(body.username, "operator");
        assert_eq!(body.permissions, permissions);
        assert!(!body.totp_enabled);

        // No credential material in the payload
        let raw = response.text();
        assert!(!raw.contains(&user.password_hash));
        assert!(!raw.contains("salt"));
    }

    #[tokio::test]
    async fn test_self_service_does_not_need_users_permission() {
        let (server, state, users) = create_test_server().await;
        let user = create_test_user(&users, "operator", Permissions::none()).await;
        let token = state.tokens.issue(&user).unwrap();

        server
            .get("/api/users/current/totp")
            .add_header("authorization", bearer(&token))
            .await
            .assert_status(StatusCode::OK);

        // Other user routes still require the users category
        server
            .get("/api/users")
            .add_header("authorization", bearer(&token))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_change_password() {
        let (server, state, users) = create_test_server().await;
        let user = create_test_user(&users, "operator", Permissions::none()).await;
        let token = state.tokens.issue(&user).unwrap();

        let response = server
            .put("/api/users/current/password")
            .add_header("authorization", bearer(&token))
            .json(&json!({"current_password": "wrong", "new_password": "a brand new passphrase"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["field"], "current_password");

        let response = server
            .put("/api/users/current/password")
            .add_header("authorization", bearer(&token))
            .json(&json!({"current_password": TEST_PASSWORD, "new_password": "short"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["field"], "new_password");

        server
            .put("/api/users/current/password")
            .add_header("authorization", bearer(&token))
            .json(&json!({"current_password": TEST_PASSWORD, "new_password": "a brand new passphrase"}))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .post("/api/authentication/login")
            .json(&json!({"username": "operator", "password": "a brand new passphrase"}))
            .await
            .assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn test_totp_lifecycle() {
        let (server, state, users) = create_test_server().await;
        let user = create_test_user(&users, "operator", Permissions::none()).await;
        let token = state.tokens.issue(&user).unwrap();

        let status: TotpStatusResponse = server
            .get("/api/users/current/totp")
            .add_header("authorization", bearer(&token))
            .await
            .json();
        assert!(!status.enabled);

        let response = server
            .post("/api/users/current/totp")
            .add_header("authorization", bearer(&token))
            .await;
        response.assert_status(StatusCode::OK);
        let enrollment: TotpEnrollmentResponse = response.json();
        assert!(enrollment.url.starts_with("otpauth://totp/"));

        let response = server
            .post("/api/users/current/totp/activate")
            .add_header("authorization", bearer(&token))
            .json(&json!({"code": "not-a-code"}))
            .await;
        response.assert_status(StatusCode::OK);
        assert!(!response.json::<TotpActivationResponse>().activated);

        let pending = users.find_by_id(user.id).await.unwrap().unwrap();
        let response = server
            .post("/api/users/current/totp/activate")
            .add_header("authorization", bearer(&token))
            .json(&json!({"code": totp_code(&pending)}))
            .await;
        assert!(response.json::<TotpActivationResponse>().activated);

        // Already enabled
        server
            .post("/api/users/current/totp")
            .add_header("authorization", bearer(&token))
            .await
            .assert_status(StatusCode::CONFLICT);

        server
            .delete("/api/users/current/totp")
            .add_header("authorization", bearer(&token))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let status: TotpStatusResponse = server
            .get("/api/users/current/totp")
            .add_header("authorization", bearer(&token))
            .await
            .json();
        assert!(!status.enabled);
    }
}
