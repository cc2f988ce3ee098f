//! Password hashing and verification.
//!
//! Stored passwords are an iterated SHA-512 digest: the first round hashes `password ‖ salt`, each
//! following round hashes the previous digest. Salt size and round count come from
//! `security.user-password-hashing`; both the digest and the salt are stored base64 encoded.

use base64::{Engine as _, engine::general_purpose};
use rand::prelude::RngExt;
use rand::rng;
use sha2::{Digest, Sha512};

use crate::config::{ConfigError, PasswordHashingConfig};

/// SHA-512 output size in bytes
const DIGEST_LEN: usize = 64;

/// Failure to hash or verify a password. A simple mismatch is not an error.
#[derive(thiserror::Error, Debug)]
pub enum PasswordError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("stored {field} is not valid base64: {source}")]
    Malformed {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },
}

/// A freshly derived password hash and the salt it was derived with, both base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedPassword {
    pub hash: String,
    pub salt: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    config: PasswordHashingConfig,
}

impl PasswordHasher {
    pub fn new(config: PasswordHashingConfig) -> Self {
        Self { config }
    }

    /// Hash a password with a new random salt.
    pub fn hash(&self, password: &str) -> Result<HashedPassword, PasswordError> {
        let salt_size = self.config.salt_size()?;
        let iterations = self.config.iterations()?;

        let mut salt = vec![0u8; salt_size];
        rng().fill(&mut salt[..]);

        let digest = derive(password.as_bytes(), &salt, iterations);

        Ok(HashedPassword {
            hash: general_purpose::STANDARD.encode(digest),
            salt: general_purpose::STANDARD.encode(salt),
        })
    }

    /// Verify a password against a stored hash and salt.
    pub fn verify(&self, password: &str, hash: &str, salt: &str) -> Result<bool, PasswordError> {
        self.config.salt_size()?;
        let iterations = self.config.iterations()?;

        let expected = general_purpose::STANDARD
            .decode(hash)
            .map_err(|source| PasswordError::Malformed { field: "hash", source })?;
        let salt = general_purpose::STANDARD
            .decode(salt)
            .map_err(|source| PasswordError::Malformed { field: "salt", source })?;

        let actual = derive(password.as_bytes(), &salt, iterations);
        Ok(constant_time_eq(&actual, &expected))
    }

    /// Run a full verification against a dummy record and throw the result away.
    ///
    /// Used on login paths that fail before a real verification (unknown username) so both paths
    /// cost the same.
    pub fn burn(&self, password: &str) -> Result<(), PasswordError> {
        let salt = general_purpose::STANDARD.encode(vec![0u8; self.config.salt_size()?]);
        let hash = general_purpose::STANDARD.encode([0u8; DIGEST_LEN]);
        std::hint::black_box(self.verify(std::hint::black_box(password), &hash, &salt)?);
        Ok(())
    }
}

fn derive(password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut digest = Sha512::new().chain_update(password).chain_update(salt).finalize();
    for _ in 1..iterations {
        digest = Sha512::digest(digest);
    }
    digest.to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(PasswordHashingConfig {
            salt_size: Some(16),
            iterations: Some(25),
        })
    }

    #[test]
    fn test_password_hashing() {
        let hasher = hasher();
        let hashed = hasher.hash("test_password_123").unwrap();

        // Hash should not be empty
        assert!(!hashed.hash.is_empty());

        // Should verify correctly
        assert!(hasher.verify("test_password_123", &hashed.hash, &hashed.salt).unwrap());

        // Should fail with wrong input
        assert!(!hasher.verify("wrong_password", &hashed.hash, &hashed.salt).unwrap());
    }

    #[test]
    fn test_same_input_different_hashes() {
        let hasher = hasher();

        let first = hasher.hash("same_password").unwrap();
        let second = hasher.hash("same_password").unwrap();

        // Same input should produce different hashes due to salt
        assert_ne!(first.hash, second.hash);
        assert_ne!(first.salt, second.salt);

        // But both should verify correctly
        assert!(hasher.verify("same_password", &first.hash, &first.salt).unwrap());
        assert!(hasher.verify("same_password", &second.hash, &second.salt).unwrap());
    }

    #[test]
    fn test_salt_size_is_respected() {
        let hashed = hasher().hash("pw").unwrap();
        let salt = general_purpose::STANDARD.decode(&hashed.salt).unwrap();
        let digest = general_purpose::STANDARD.decode(&hashed.hash).unwrap();

        assert_eq!(salt.len(), 16);
        assert_eq!(digest.len(), DIGEST_LEN);
    }

    #[test]
    fn test_iteration_count_changes_digest() {
        let hashed = hasher().hash("pw").unwrap();
        let other = PasswordHasher::new(PasswordHashingConfig {
            salt_size: Some(16),
            iterations: Some(26),
        });

        assert!(!other.verify("pw", &hashed.hash, &hashed.salt).unwrap());
    }

    #[test]
    fn test_single_iteration_is_plain_salted_digest() {
        let digest = derive(b"pw", b"salt", 1);
        assert_eq!(digest, Sha512::digest(b"pwsalt").to_vec());
    }

    #[test]
    fn test_malformed_base64_is_an_error() {
        let hasher = hasher();
        let hashed = hasher.hash("pw").unwrap();

        assert!(matches!(
            hasher.verify("pw", "not base64!", &hashed.salt),
            Err(PasswordError::Malformed { field: "hash", .. })
        ));
        assert!(matches!(
            hasher.verify("pw", &hashed.hash, "%%%"),
            Err(PasswordError::Malformed { field: "salt", .. })
        ));
    }

    #[test]
    fn test_missing_configuration_is_an_error() {
        let hasher = PasswordHasher::new(PasswordHashingConfig::default());

        assert!(matches!(hasher.hash("pw"), Err(PasswordError::Config(ConfigError::Missing { .. }))));
        assert!(matches!(
            hasher.verify("pw", "AAAA", "AAAA"),
            Err(PasswordError::Config(ConfigError::Missing { .. }))
        ));
    }

    #[test]
    fn test_verify_requires_salt_size() {
        let hashed = hasher().hash("pw").unwrap();
        let hasher = PasswordHasher::new(PasswordHashingConfig {
            salt_size: None,
            iterations: Some(25),
        });

        assert!(matches!(
            hasher.verify("pw", &hashed.hash, &hashed.salt),
            Err(PasswordError::Config(ConfigError::Missing {
                key: "security.user-password-hashing.salt-size"
            }))
        ));
    }

    #[test]
    fn test_burn_runs_the_verification_path() {
        assert!(hasher().burn("pw").is_ok());

        // Same configuration requirements as a real verification
        let hasher = PasswordHasher::new(PasswordHashingConfig {
            salt_size: Some(16),
            iterations: None,
        });
        assert!(matches!(hasher.burn("pw"), Err(PasswordError::Config(ConfigError::Missing { .. }))));
    }
}
