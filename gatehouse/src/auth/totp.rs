//! Time-based one-time passwords for the second authentication factor.
//!
//! Codes are RFC 6238 standard: SHA-1, 6 digits, 30 second steps, and one step of tolerance on
//! either side of the current one.
//!
//! The provisioning label is `issuer:account`, so a `:` inside either part is replaced by `_`.
//! Labels never take part in code generation.

use anyhow::anyhow;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::users::User;

const DIGITS: usize = 6;
const SKEW_STEPS: u8 = 1;
const STEP_SECONDS: u64 = 30;

/// Builds provisioning URIs and checks codes against a user's shared secret.
#[derive(Debug, Clone)]
pub struct TotpVerifier {
    issuer: String,
}

impl TotpVerifier {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self { issuer: issuer.into() }
    }

    /// Generate a new secret for `user`, leaving it unvalidated.
    ///
    /// Returns the `otpauth://` provisioning URI for the authenticator app. The caller persists the
    /// user and is responsible for refusing to call this while TOTP is already enabled.
    pub fn enroll(&self, user: &mut User) -> anyhow::Result<String> {
        let secret = Secret::generate_secret();
        let secret_bytes = secret.to_bytes().map_err(|e| anyhow!("TOTP secret generation: {e}"))?;
        let totp = self.totp(secret_bytes, &user.username)?;

        user.totp.secret = Some(totp.get_secret_base32());
        user.totp.validated = false;

        Ok(totp.get_url())
    }

    /// Check `code` against the user's stored secret at unix time `now`.
    ///
    /// Returns `false` when no secret is stored or the stored secret cannot be decoded.
    pub fn check(&self, user: &User, code: &str, now: u64) -> bool {
        let Some(encoded) = user.totp.secret.as_deref().filter(|s| !s.trim().is_empty()) else {
            return false;
        };

        let totp = match Secret::Encoded(encoded.to_string())
            .to_bytes()
            .map_err(|e| anyhow!("decode TOTP secret: {e}"))
            .and_then(|bytes| self.totp(bytes, &user.username))
        {
            Ok(totp) => totp,
            Err(e) => {
                tracing::warn!(user_id = %user.id, "Unusable TOTP secret: {e:#}");
                return false;
            }
        };

        totp.check(code.trim(), now)
    }

    /// Activate a pending enrollment if `code` is valid. Wrong codes return `false`.
    pub fn activate(&self, user: &mut User, code: &str, now: u64) -> bool {
        if !self.check(user, code, now) {
            return false;
        }
        user.totp.validated = true;
        true
    }

    pub fn disable(user: &mut User) {
        user.totp.secret = None;
        user.totp.validated = false;
    }

    fn totp(&self, secret: Vec<u8>, account: &str) -> anyhow::Result<TOTP> {
        TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW_STEPS,
            STEP_SECONDS,
            secret,
            Some(label(&self.issuer)),
            label(account),
        )
        .map_err(|e| anyhow!("TOTP init error: {e}"))
    }
}

fn label(value: &str) -> String {
    value.replace(':', "_")
}

/// Current unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
