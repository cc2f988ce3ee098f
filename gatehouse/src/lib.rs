//! # gatehouse: authentication and authorization for the proxy management API
//!
//! `gatehouse` answers three questions for every request that reaches the management API of a
//! reverse proxy manager (hosts, streams, certificates, access lists and so on):
//!
//! - **Who is calling?** Operators log in with a username, a password and, when they have enrolled
//!   one, a TOTP code. A successful login yields an HS512 signed session token.
//! - **Is the session still valid?** Tokens carry their own validity window. They are renewed
//!   while in use (sliding refresh), can be revoked on logout, and die with the account when it is
//!   disabled.
//! - **May they do this?** Each operator holds one [`types::AccessLevel`] per
//!   [`types::ResourceCategory`]. Reads need read-only access to the category the route belongs
//!   to, writes need read-write.
//!
//! ## Request flow
//!
//! ```text
//! request ─▶ PermissionRegistry::resolve ─▶ anonymous? ─▶ handler
//!                                     │
//!                                     ▼
//!                    Bearer token ─▶ TokenService::validate ─▶ UserDirectory
//!                                     │
//!                                     ▼
//!                  allow-all or AccessLevel::permits(method)? ── no ─▶ 403
//!                                     │
//!                                     ▼
//!             TokenService::refresh ─▶ Subject in extensions ─▶ handler
//!                                                    (renewed token in `Authorization`)
//! ```
//!
//! Rejected tokens always produce the same 401, whatever the reason; the reason is logged at
//! `debug`.
//!
//! ## Modules
//!
//! - [`auth`]: credentials, tokens, the route registry and the middleware
//! - [`api`]: login, logout and self-service handlers
//! - [`users`]: the user record and the [`users::UserDirectory`] lookup trait
//! - [`config`]: YAML + environment configuration
//! - [`errors`]: the HTTP error type
//!
//! ## Running
//!
//! ```bash
//! gatehouse -f config.yaml
//! gatehouse -f config.yaml --validate   # check configuration and exit
//! ```
//!
//! User records are owned by the embedding server through [`users::UserDirectory`]. The
//! standalone binary keeps them in memory and seeds the administrator from `admin.*`.

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod telemetry;
pub mod types;
pub mod users;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use bon::Builder;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};
use uuid::Uuid;

use crate::{
    api::handlers,
    auth::{
        credentials::CredentialVerifier, middleware::authorization_middleware, permissions::PermissionRegistry,
        session::TokenService,
    },
    config::ConfigError,
    types::{Permissions, UserId},
    users::{InMemoryUsers, Totp, User, UserDirectory},
};

pub use config::Config;

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserDirectory>,
    pub tokens: Arc<TokenService>,
    pub credentials: Arc<CredentialVerifier>,
    pub permissions: Arc<PermissionRegistry>,
}

impl AppState {
    /// Wire the services for `config` on top of a user directory, with the standard route
    /// registry.
    pub fn from_config(config: Config, users: Arc<dyn UserDirectory>) -> Result<Self, ConfigError> {
        let tokens = TokenService::new(&config.security.jwt, users.clone())?;
        let credentials = CredentialVerifier::new(&config.security, users.clone());

        Ok(Self::builder()
            .tokens(Arc::new(tokens))
            .credentials(Arc::new(credentials))
            .permissions(Arc::new(PermissionRegistry::standard()))
            .users(users)
            .config(config)
            .build())
    }
}

/// Create the initial admin user if it doesn't exist.
///
/// Idempotent: a new user with read-write access to every category is created on first start;
/// afterwards only the password is reset to the configured one.
///
/// Returns the ID of the created or existing admin user.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(state: &AppState, username: &str, password: &str) -> errors::Result<UserId> {
    let hashed = state.credentials.hash_password(password).await?;

    if let Some(existing) = state.users.find_by_username(username).await? {
        state.users.update_password(existing.id, &hashed.hash, &hashed.salt).await?;
        debug!("Reset password of existing admin user");
        return Ok(existing.id);
    }

    let admin = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        name: "Administrator".to_string(),
        enabled: true,
        password_hash: hashed.hash,
        password_salt: hashed.salt,
        totp: Totp::default(),
        permissions: Permissions::full(),
    };
    state.users.save(&admin).await?;
    info!(username, "Created initial admin user");

    Ok(admin.id)
}

/// Build the router: self-service API routes behind the authorization middleware.
pub fn build_router(state: &AppState) -> Router {
    let api_routes = Router::new()
        .route("/authentication/login", post(handlers::auth::login))
        .route("/authentication/logout", post(handlers::auth::logout))
        .route("/users/current", get(handlers::users::get_current_user))
        .route("/users/current/password", put(handlers::users::change_password))
        .route(
            "/users/current/totp",
            get(handlers::users::get_totp_status)
                .post(handlers::users::enable_totp)
                .delete(handlers::users::disable_totp),
        )
        .route("/users/current/totp/activate", post(handlers::users::activate_totp));

    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .layer(from_fn_with_state(state.clone(), authorization_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state.clone())
}

pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all services initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting gatehouse with configuration: {:#?}", redacted(&config));

        let users: Arc<dyn UserDirectory> = Arc::new(InMemoryUsers::new());
        let app_state = AppState::from_config(config.clone(), users)?;

        if let (Some(username), Some(password)) = (&config.admin.username, &config.admin.password) {
            create_initial_admin_user(&app_state, username, password).await?;
        }

        let router = build_router(&app_state);
        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("gatehouse listening on http://{}", bind_addr);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

/// The configuration with secrets blanked, for logging.
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    if config.security.jwt.secret.is_some() {
        config.security.jwt.secret = Some("<redacted>".to_string());
    }
    if config.admin.password.is_some() {
        config.admin.password = Some("<redacted>".to_string());
    }
    config
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{bearer, create_test_config};
    use axum::http::StatusCode;
    use serde_json::json;

    fn admin_config() -> Config {
        let mut config = create_test_config();
        config.admin.username = Some("admin".to_string());
        config.admin.password = Some("initial admin password".to_string());
        config
    }

    #[tokio::test]
    async fn test_healthz_is_anonymous() {
        let server = Application::new(create_test_config()).await.unwrap().into_test_server();

        let response = server.get("/healthz").await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.text(), "OK");

        server
            .method(axum::http::Method::HEAD, "/healthz")
            .await
            .assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unregistered_paths_require_a_token() {
        let server = Application::new(create_test_config()).await.unwrap().into_test_server();

        server.get("/api/hosts").await.assert_status(StatusCode::UNAUTHORIZED);
        server.get("/nowhere").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_bootstrap_and_login() {
        let server = Application::new(admin_config()).await.unwrap().into_test_server();

        let response = server
            .post("/api/authentication/login")
            .json(&json!({"username": "admin", "password": "initial admin password"}))
            .await;
        response.assert_status(StatusCode::OK);
        let token = response.json::<serde_json::Value>()["token"].as_str().unwrap().to_string();

        let response = server
            .get("/api/users/current")
            .add_header("authorization", bearer(&token))
            .await;
        response.assert_status(StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert_eq!(body["username"], "admin");
        assert_eq!(body["permissions"]["hosts"], "READ_WRITE");
        assert_eq!(body["permissions"]["traffic-stats"], "READ_WRITE");
    }

    #[tokio::test]
    async fn test_create_initial_admin_user_is_idempotent() {
        let users = Arc::new(InMemoryUsers::new());
        let state = AppState::from_config(create_test_config(), users.clone()).unwrap();

        let first = create_initial_admin_user(&state, "admin", "first password").await.unwrap();
        let second = create_initial_admin_user(&state, "admin", "second password").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(users.len(), 1);
        assert!(matches!(
            state.credentials.authenticate("admin", "second password", None).await.unwrap(),
            auth::credentials::AuthenticationOutcome::Success(_)
        ));
    }

    #[test]
    fn test_redacted_config_hides_secrets() {
        let config = admin_config();
        let shown = format!("{:?}", redacted(&config));

        assert!(!shown.contains("initial admin password"));
        assert!(!shown.contains(config.security.jwt.secret.as_deref().unwrap()));
    }

    #[test]
    fn test_from_config_rejects_bad_secret() {
        let mut config = create_test_config();
        config.security.jwt.secret = Some("short".to_string());

        assert!(matches!(
            AppState::from_config(config, Arc::new(InMemoryUsers::new())),
            Err(ConfigError::SecretLength { .. })
        ));
    }
}
