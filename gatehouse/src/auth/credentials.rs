//! Login authentication and the credential self-service operations.
//!
//! Password derivations are CPU bound and run on the blocking pool.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::{
    password::{HashedPassword, PasswordHasher},
    totp::{TotpVerifier, unix_now},
};
use crate::{
    config::{PasswordPolicyConfig, SecurityConfig},
    errors::{Error, Result},
    types::{UserId, abbrev_uuid},
    users::{User, UserDirectory},
};

/// Result of a login attempt.
///
/// Unknown usernames, disabled accounts and wrong passwords are all `Failure`. `MissingTotp` is
/// only returned once the password has been verified for an account with an active second factor
/// and the code is absent or wrong.
///
/// The record operations below write back only the fields they own (password or TOTP
/// enrollment) through the [`UserDirectory`] field updates, so concurrent changes to the rest of
/// the record survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationOutcome {
    Success(User),
    Failure,
    MissingTotp,
}

pub struct CredentialVerifier {
    hasher: PasswordHasher,
    totp: TotpVerifier,
    policy: PasswordPolicyConfig,
    users: Arc<dyn UserDirectory>,
}

impl CredentialVerifier {
    pub fn new(security: &SecurityConfig, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            hasher: PasswordHasher::new(security.user_password_hashing),
            totp: TotpVerifier::new(security.totp_issuer.clone()),
            policy: security.password_policy,
            users,
        }
    }

    #[instrument(skip_all)]
    pub async fn authenticate(&self, username: &str, password: &str, totp_code: Option<&str>) -> Result<AuthenticationOutcome> {
        let hasher = self.hasher;
        let password = password.to_owned();

        let Some(user) = self.users.find_by_username(username).await? else {
            // Same derivation cost as a real verification
            tokio::task::spawn_blocking(move || hasher.burn(&password))
                .await
                .map_err(|e| Error::Internal {
                    operation: format!("spawn password verification task: {e}"),
                })??;
            debug!("Login attempt for unknown username");
            return Ok(AuthenticationOutcome::Failure);
        };

        let hash = user.password_hash.clone();
        let salt = user.password_salt.clone();
        let is_valid = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash, &salt))
            .await
            .map_err(|e| Error::Internal {
                operation: format!("spawn password verification task: {e}"),
            })??;

        if !is_valid || !user.enabled {
            debug!(user_id = %abbrev_uuid(&user.id), enabled = user.enabled, "Login rejected");
            return Ok(AuthenticationOutcome::Failure);
        }

        if user.totp.is_enabled() {
            let Some(code) = totp_code.map(str::trim).filter(|code| !code.is_empty()) else {
                return Ok(AuthenticationOutcome::MissingTotp);
            };
            if !self.totp.check(&user, code, unix_now()) {
                debug!(user_id = %abbrev_uuid(&user.id), "Login rejected: wrong TOTP code");
                return Ok(AuthenticationOutcome::MissingTotp);
            }
        }

        info!(user_id = %abbrev_uuid(&user.id), "User authenticated");
        Ok(AuthenticationOutcome::Success(user))
    }

    /// Hash a password with a fresh salt, off the async runtime.
    pub async fn hash_password(&self, password: &str) -> Result<HashedPassword> {
        let hasher = self.hasher;
        let password = password.to_owned();
        let hashed = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| Error::Internal {
                operation: format!("spawn password hashing task: {e}"),
            })??;
        Ok(hashed)
    }

    /// Change a user's password after checking the current one.
    #[instrument(skip_all, fields(user_id = %abbrev_uuid(&user_id)))]
    pub async fn change_password(&self, user_id: UserId, current_password: &str, new_password: &str) -> Result<()> {
        let user = self.load(user_id).await?;

        let hasher = self.hasher;
        let current = current_password.to_owned();
        let (hash, salt) = (user.password_hash.clone(), user.password_salt.clone());
        let is_valid = tokio::task::spawn_blocking(move || hasher.verify(&current, &hash, &salt))
            .await
            .map_err(|e| Error::Internal {
                operation: format!("spawn password verification task: {e}"),
            })??;

        if !is_valid {
            return Err(Error::Validation {
                field: "current_password".to_string(),
                message: "Current password is incorrect".to_string(),
            });
        }

        self.check_policy(new_password)?;

        let hashed = self.hash_password(new_password).await?;
        found(self.users.update_password(user_id, &hashed.hash, &hashed.salt).await?)?;

        info!("Password changed");
        Ok(())
    }

    pub async fn totp_status(&self, user_id: UserId) -> Result<bool> {
        Ok(self.load(user_id).await?.totp.is_enabled())
    }

    /// Start TOTP enrollment and return the provisioning URI.
    ///
    /// Refused with a conflict while a validated secret is in place; an unvalidated enrollment is
    /// simply replaced.
    #[instrument(skip_all, fields(user_id = %abbrev_uuid(&user_id)))]
    pub async fn enable_totp(&self, user_id: UserId) -> Result<String> {
        let mut user = self.load(user_id).await?;
        if user.totp.is_enabled() {
            return Err(Error::Conflict {
                message: "Two-factor authentication is already enabled".to_string(),
            });
        }

        let url = self.totp.enroll(&mut user)?;
        found(self.users.update_totp(user_id, &user.totp).await?)?;
        debug!("TOTP enrollment started");
        Ok(url)
    }

    /// Confirm a pending enrollment. Returns `false` on a wrong code or when nothing is pending.
    #[instrument(skip_all, fields(user_id = %abbrev_uuid(&user_id)))]
    pub async fn activate_totp(&self, user_id: UserId, code: &str) -> Result<bool> {
        let mut user = self.load(user_id).await?;
        if !self.totp.activate(&mut user, code, unix_now()) {
            return Ok(false);
        }

        found(self.users.update_totp(user_id, &user.totp).await?)?;
        info!("TOTP activated");
        Ok(true)
    }

    #[instrument(skip_all, fields(user_id = %abbrev_uuid(&user_id)))]
    pub async fn disable_totp(&self, user_id: UserId) -> Result<()> {
        let mut user = self.load(user_id).await?;
        TotpVerifier::disable(&mut user);
        found(self.users.update_totp(user_id, &user.totp).await?)?;
        info!("TOTP disabled");
        Ok(())
    }

    fn check_policy(&self, password: &str) -> Result<()> {
        let length = password.chars().count();
        let message = if length < self.policy.min_length {
            format!("Password must be at least {} characters", self.policy.min_length)
        } else if length > self.policy.max_length {
            format!("Password must be no more than {} characters", self.policy.max_length)
        } else {
            return Ok(());
        };

        Err(Error::Validation {
            field: "new_password".to_string(),
            message,
        })
    }

    async fn load(&self, user_id: UserId) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(Error::Unauthenticated { message: None })
    }
}

/// The user disappeared between load and write.
fn found(updated: bool) -> Result<()> {
    if updated {
        Ok(())
    } else {
        Err(Error::Unauthenticated { message: None })
    }
}
