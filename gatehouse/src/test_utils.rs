//! Shared fixtures for the in-crate tests.

use std::sync::Arc;

use axum_test::TestServer;
use totp_rs::{Algorithm, Secret, TOTP};
use uuid::Uuid;

use crate::{
    AppState, build_router,
    auth::password::PasswordHasher,
    config::{Config, JwtConfig, PasswordHashingConfig},
    types::Permissions,
    users::{InMemoryUsers, Totp, User, UserDirectory},
};

pub const TEST_JWT_SECRET: &str = "test-secret-for-gatehouse-tests-only-0123456789abcdefghijklmnopq";
pub const TEST_PASSWORD: &str = "correct horse battery staple";

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    };

    config.security.jwt = JwtConfig {
        secret: Some(TEST_JWT_SECRET.to_string()),
        ttl_seconds: Some(3600),
        clock_skew_seconds: Some(60),
        refresh_window_seconds: Some(600),
    };
    // Cheap hashing keeps the suite fast
    config.security.user_password_hashing = PasswordHashingConfig {
        salt_size: Some(16),
        iterations: Some(10),
    };

    config
}

/// A user with no usable password.
pub fn test_user(username: &str, permissions: Permissions) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        name: username.to_string(),
        enabled: true,
        password_hash: String::new(),
        password_salt: String::new(),
        totp: Totp::default(),
        permissions,
    }
}

/// Store a user whose password is [`TEST_PASSWORD`].
pub async fn create_test_user(users: &InMemoryUsers, username: &str, permissions: Permissions) -> User {
    let hashed = PasswordHasher::new(create_test_config().security.user_password_hashing)
        .hash(TEST_PASSWORD)
        .expect("Failed to hash test password");

    let user = User {
        password_hash: hashed.hash,
        password_salt: hashed.salt,
        ..test_user(username, permissions)
    };
    users.save(&user).await.expect("Failed to save test user");
    user
}

pub fn create_test_app_state() -> (AppState, Arc<InMemoryUsers>) {
    let users = Arc::new(InMemoryUsers::new());
    let state = AppState::from_config(create_test_config(), users.clone()).expect("Failed to build app state");
    (state, users)
}

/// The full router behind a test server.
pub async fn create_test_server() -> (TestServer, AppState, Arc<InMemoryUsers>) {
    let (state, users) = create_test_app_state();
    let server = TestServer::new(build_router(&state)).expect("Failed to create test server");
    (server, state, users)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// The current code for a user's stored TOTP secret.
pub fn totp_code(user: &User) -> String {
    let secret = user.totp.secret.clone().expect("user has no TOTP secret");
    let bytes = Secret::Encoded(secret).to_bytes().expect("invalid TOTP secret");
    TOTP::new(Algorithm::SHA1, 6, 1, 30, bytes, None, "test".to_string())
        .expect("Failed to build TOTP")
        .generate_current()
        .expect("system clock before unix epoch")
}
