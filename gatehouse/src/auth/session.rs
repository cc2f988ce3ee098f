//! JWT session token issuance, validation, refresh and revocation.
//!
//! Tokens are HS512 signed and carry a snapshot of the user's permissions. The clock skew setting
//! is baked into the claims at issuance (`nbf` is moved back, `exp` forward), so validation
//! compares against the local clock with no further leeway.
//!
//! Lifecycle of a token: issued → valid → refresh-eligible once `now + refresh window` reaches
//! `exp` → expired, or revoked at any point. Revocation overrides everything else.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::prelude::RngExt;
use rand::rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::AuthError;
use super::revocation::RevokedTokens;
use crate::{
    config::{ConfigError, JwtConfig},
    types::{Permissions, TokenId, UserId, abbrev_uuid},
    users::{User, UserDirectory},
};

/// Fixed application identifier used as both `iss` and `aud`.
pub const TOKEN_ISSUER: &str = "gatehouse";
pub const TOKEN_AUDIENCE: &str = "gatehouse";

/// JWT session claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub iss: String,
    pub aud: String,
    pub nbf: i64,                 // Not before (issuance minus clock skew)
    pub iat: i64,                 // Issued at
    pub exp: i64,                 // Expiration time
    pub jti: TokenId,             // Token ID, the revocation key
    pub sub: UserId,              // Subject (user ID)
    pub username: String,         // Username
    pub permissions: Permissions, // Permissions at issuance
}

/// The authenticated identity of the current request.
///
/// Built by [`TokenService::validate`] and attached to the request extensions by the
/// authorization middleware. `user` is the record resolved at validation time, not the claims
/// snapshot.
#[derive(Debug, Clone)]
pub struct Subject {
    pub token_id: TokenId,
    pub user: User,
    pub claims: SessionClaims,
}

pub struct TokenService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    revoked: RevokedTokens,
    users: Arc<dyn UserDirectory>,
}

impl TokenService {
    /// Create the service, provisioning the signing secret.
    ///
    /// A missing secret is replaced by a random one, which means sessions do not survive a restart
    /// and are not shared between instances. A secret of any length other than
    /// [`crate::config::JWT_SECRET_LENGTH`] is an error.
    pub fn new(config: &JwtConfig, users: Arc<dyn UserDirectory>) -> Result<Self, ConfigError> {
        config.validate_secret()?;
        let secret = match config.explicit_secret() {
            Some(secret) => secret.to_string(),
            None => {
                warn!(
                    "security.jwt.secret is not set; using a random secret. Sessions will not survive a restart \
                     or be shared between instances. Configure an explicit 64 character secret."
                );
                generate_secret()
            }
        };

        let mut validation = Validation::new(Algorithm::HS512);
        // exp/nbf are checked against our own clock in `validate_at`
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud", "sub"]);

        Ok(Self {
            config: config.clone(),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            revoked: RevokedTokens::new(),
            users,
        })
    }

    /// Create a token for a user session
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        self.issue_at(user, Utc::now().timestamp())
    }

    /// Verify a token and resolve the user it was issued to.
    pub async fn validate(&self, token: &str) -> Result<Subject, AuthError> {
        self.validate_at(token, Utc::now().timestamp()).await
    }

    /// Renew the subject's token if it has entered the refresh window.
    ///
    /// Returns `None` while the token is still outside the window.
    pub fn refresh(&self, subject: &Subject) -> Result<Option<String>, AuthError> {
        self.refresh_at(&subject.claims, Utc::now().timestamp())
    }

    /// Invalidate a token before its natural expiry.
    pub fn revoke(&self, token_id: TokenId, expires_at: i64) {
        self.revoke_at(token_id, expires_at, Utc::now().timestamp());
    }

    pub fn is_revoked(&self, token_id: &TokenId) -> bool {
        self.revoked.is_revoked(token_id)
    }

    fn issue_at(&self, user: &User, now: i64) -> Result<String, AuthError> {
        let ttl = self.config.ttl_seconds()?;
        let skew = self.config.clock_skew_seconds()?;

        let claims = SessionClaims {
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
            nbf: now - skew,
            iat: now,
            exp: now + ttl + skew,
            jti: Uuid::new_v4(),
            sub: user.id,
            username: user.username.clone(),
            permissions: user.permissions,
        };

        debug!(user_id = %abbrev_uuid(&user.id), token_id = %abbrev_uuid(&claims.jti), "Issuing session token");
        self.sign(&claims)
    }

    #[instrument(skip_all)]
    async fn validate_at(&self, token: &str, now: i64) -> Result<Subject, AuthError> {
        let claims = self.decode(token)?;

        if now < claims.nbf || now >= claims.exp {
            debug!(token_id = %abbrev_uuid(&claims.jti), "Token outside its validity window");
            return Err(AuthError::InvalidToken);
        }

        if self.revoked.is_revoked(&claims.jti) {
            debug!(token_id = %abbrev_uuid(&claims.jti), "Token has been revoked");
            return Err(AuthError::InvalidToken);
        }

        let user = self
            .users
            .find_by_id(claims.sub)
            .await
            .map_err(AuthError::Internal)?
            .ok_or_else(|| {
                debug!(user_id = %abbrev_uuid(&claims.sub), "Token subject no longer exists");
                AuthError::InvalidToken
            })?;

        if !user.enabled {
            warn!(
                user_id = %abbrev_uuid(&user.id),
                token_id = %abbrev_uuid(&claims.jti),
                "Token presented for disabled user, revoking"
            );
            self.revoke_at(claims.jti, claims.exp, now);
            return Err(AuthError::InvalidToken);
        }

        Ok(Subject {
            token_id: claims.jti,
            user,
            claims,
        })
    }

    fn refresh_at(&self, claims: &SessionClaims, now: i64) -> Result<Option<String>, AuthError> {
        let window = self.config.refresh_window_seconds()?;
        let skew = self.config.clock_skew_seconds()?;

        if now + window < claims.exp {
            return Ok(None);
        }

        let renewed = SessionClaims {
            exp: now + window + skew,
            ..claims.clone()
        };
        debug!(token_id = %abbrev_uuid(&claims.jti), "Refreshing session token");
        self.sign(&renewed).map(Some)
    }

    /// Refreshed copies of a token share its `jti` and can outlive the copy being revoked. Every
    /// such copy was issued before now, so none expires later than `now + window + skew`; the
    /// entry is kept at least that long.
    fn revoke_at(&self, token_id: TokenId, expires_at: i64, now: i64) {
        let retain_until = match (self.config.refresh_window_seconds(), self.config.clock_skew_seconds()) {
            (Ok(window), Ok(skew)) => expires_at.max(now + window + skew),
            _ => expires_at,
        };
        self.revoked.revoke(token_id, retain_until, now);
    }

    fn sign(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS512), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("create JWT: {e}")))
    }

    fn decode(&self, token: &str) -> Result<SessionClaims, AuthError> {
        decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                // The cause stays in the logs; callers only learn the token is invalid
                debug!("Rejected session token: {e}");
                AuthError::InvalidToken
            })
    }
}

/// Random secret of exactly [`crate::config::JWT_SECRET_LENGTH`] characters.
fn generate_secret() -> String {
    // 48 bytes encode to 64 base64url characters
    let mut bytes = [0u8; 48];
    rng().fill(&mut bytes[..]);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
