//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `GATEHOUSE_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `GATEHOUSE_` override YAML values
//!
//! Keys are kebab-case. For nested values use double underscores in environment variables and
//! single underscores in place of dashes, e.g. `GATEHOUSE_SECURITY__JWT__TTL_SECONDS=3600` sets
//! `security.jwt.ttl-seconds`.
//!
//! ## Security keys
//!
//! | Key | Meaning | If absent |
//! |---|---|---|
//! | `security.jwt.secret` | 64 character signing secret | random ephemeral secret + warning |
//! | `security.jwt.ttl-seconds` | token lifetime | error at issuance |
//! | `security.jwt.clock-skew-seconds` | tolerance window | error at issuance |
//! | `security.jwt.refresh-window-seconds` | sliding refresh trigger | error at refresh |
//! | `security.user-password-hashing.salt-size` | salt bytes | error at hash/verify |
//! | `security.user-password-hashing.iterations` | digest rounds | error at hash/verify |
//!
//! The token and hashing values deliberately have no defaults: a deployment that forgets them
//! fails loudly on first use instead of running with values nobody chose. A secret of the wrong
//! length is rejected when the configuration is loaded.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Length in characters (and therefore bytes of key material) of an HS512 signing secret.
pub const JWT_SECRET_LENGTH: usize = 64;

/// Upper bound for every token duration (ten years).
pub const MAX_DURATION_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "GATEHOUSE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Missing or invalid configuration.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration key `{key}` is not set")]
    Missing { key: &'static str },

    #[error("configuration key `{key}` is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("`security.jwt.secret` must be exactly {JWT_SECRET_LENGTH} characters, got {actual}")]
    SecretLength { actual: usize },
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
    /// Initial administrator, created or updated on startup
    pub admin: AdminConfig,
    pub security: SecurityConfig,
}

/// Bootstrap administrator account.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct AdminConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SecurityConfig {
    pub jwt: JwtConfig,
    pub user_password_hashing: PasswordHashingConfig,
    pub password_policy: PasswordPolicyConfig,
    /// Issuer label shown by authenticator apps
    pub totp_issuer: String,
}

/// Session token settings. Durations are whole seconds.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct JwtConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub ttl_seconds: Option<u64>,
    pub clock_skew_seconds: Option<u64>,
    pub refresh_window_seconds: Option<u64>,
}

/// Iterated digest settings for stored passwords.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct PasswordHashingConfig {
    pub salt_size: Option<usize>,
    pub iterations: Option<u32>,
}

/// Rules applied when a user picks a new password.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct PasswordPolicyConfig {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            enable_otel_export: false,
            admin: AdminConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt: JwtConfig::default(),
            user_password_hashing: PasswordHashingConfig::default(),
            password_policy: PasswordPolicyConfig::default(),
            totp_issuer: "gatehouse".to_string(),
        }
    }
}

impl Default for PasswordPolicyConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
        }
    }
}

fn required<T: Copy>(value: Option<T>, key: &'static str) -> Result<T, ConfigError> {
    value.ok_or(ConfigError::Missing { key })
}

fn seconds(value: Option<u64>, key: &'static str) -> Result<i64, ConfigError> {
    let secs = required(value, key)?;
    if secs > MAX_DURATION_SECONDS {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("{secs} seconds exceeds the maximum of {MAX_DURATION_SECONDS}"),
        });
    }
    i64::try_from(secs).map_err(|_| ConfigError::Invalid {
        key,
        reason: format!("{secs} seconds is out of range"),
    })
}

impl JwtConfig {
    pub fn ttl_seconds(&self) -> Result<i64, ConfigError> {
        seconds(self.ttl_seconds, "security.jwt.ttl-seconds")
    }

    pub fn clock_skew_seconds(&self) -> Result<i64, ConfigError> {
        seconds(self.clock_skew_seconds, "security.jwt.clock-skew-seconds")
    }

    pub fn refresh_window_seconds(&self) -> Result<i64, ConfigError> {
        seconds(self.refresh_window_seconds, "security.jwt.refresh-window-seconds")
    }

    /// The configured secret, or `None` when it is absent or blank.
    pub fn explicit_secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Reject a secret that is set but not exactly [`JWT_SECRET_LENGTH`] characters long.
    pub fn validate_secret(&self) -> Result<(), ConfigError> {
        match self.explicit_secret() {
            Some(secret) if secret.chars().count() != JWT_SECRET_LENGTH => Err(ConfigError::SecretLength {
                actual: secret.chars().count(),
            }),
            _ => Ok(()),
        }
    }
}

impl PasswordHashingConfig {
    pub fn salt_size(&self) -> Result<usize, ConfigError> {
        let key = "security.user-password-hashing.salt-size";
        match required(self.salt_size, key)? {
            0 => Err(ConfigError::Invalid {
                key,
                reason: "salt size must be positive".to_string(),
            }),
            size => Ok(size),
        }
    }

    pub fn iterations(&self) -> Result<u32, ConfigError> {
        let key = "security.user-password-hashing.iterations";
        match required(self.iterations, key)? {
            0 => Err(ConfigError::Invalid {
                key,
                reason: "at least one iteration is required".to_string(),
            }),
            n => Ok(n),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency.
    ///
    /// Only values whose misconfiguration must stop startup are checked here. Missing token and
    /// hashing parameters surface at first use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let jwt = &self.security.jwt;
        jwt.validate_secret()?;
        if jwt.ttl_seconds.is_some() {
            jwt.ttl_seconds()?;
        }
        if jwt.clock_skew_seconds.is_some() {
            jwt.clock_skew_seconds()?;
        }
        if jwt.refresh_window_seconds.is_some() {
            jwt.refresh_window_seconds()?;
        }

        let hashing = &self.security.user_password_hashing;
        if hashing.salt_size.is_some() {
            hashing.salt_size()?;
        }
        if hashing.iterations.is_some() {
            hashing.iterations()?;
        }

        let policy = &self.security.password_policy;
        if policy.min_length < 1 {
            return Err(ConfigError::Invalid {
                key: "security.password-policy.min-length",
                reason: "must be at least 1".to_string(),
            });
        }
        if policy.min_length > policy.max_length {
            return Err(ConfigError::Invalid {
                key: "security.password-policy.min-length",
                reason: format!("{} cannot be greater than max-length ({})", policy.min_length, policy.max_length),
            });
        }

        if self.admin.username.is_some() != self.admin.password.is_some() {
            return Err(ConfigError::Invalid {
                key: "admin",
                reason: "username and password must be set together".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables override specific values; `_` stands in for `-`
            .merge(
                Env::prefixed("GATEHOUSE_")
                    .ignore(&["CONFIG"])
                    .split("__")
                    .map(|key| key.as_str().replace('_', "-").into()),
            )
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const SECRET: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn args(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_security_config_from_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                &format!(
                    r#"
security:
  jwt:
    secret: "{SECRET}"
    ttl-seconds: 3600
    clock-skew-seconds: 30
    refresh-window-seconds: 600
  user-password-hashing:
    salt-size: 32
    iterations: 1000
"#
                ),
            )?;

            let config = Config::load(&args("test.yaml"))?;
            let jwt = &config.security.jwt;

            assert_eq!(jwt.explicit_secret(), Some(SECRET));
            assert_eq!(jwt.ttl_seconds().unwrap(), 3600);
            assert_eq!(jwt.clock_skew_seconds().unwrap(), 30);
            assert_eq!(jwt.refresh_window_seconds().unwrap(), 600);
            assert_eq!(config.security.user_password_hashing.salt_size().unwrap(), 32);
            assert_eq!(config.security.user_password_hashing.iterations().unwrap(), 1000);
            // Defaults preserved
            assert_eq!(config.security.password_policy.min_length, 8);
            assert_eq!(config.port, 8090);

            Ok(())
        });
    }

    #[test]
    fn test_sample_config_loads() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", include_str!("../config.yaml"))?;

            let config = Config::load(&args("config.yaml"))?;

            assert_eq!(config.admin.username.as_deref(), Some("admin"));
            assert_eq!(config.security.jwt.explicit_secret(), None);
            assert!(config.security.jwt.refresh_window_seconds().is_ok());
            assert!(config.security.user_password_hashing.iterations().is_ok());

            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "port: 9000\n")?;

            jail.set_env("GATEHOUSE_HOST", "127.0.0.1");
            jail.set_env("GATEHOUSE_SECURITY__JWT__TTL_SECONDS", "120");
            jail.set_env("GATEHOUSE_SECURITY__USER_PASSWORD_HASHING__ITERATIONS", "7");

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 9000);
            assert_eq!(config.security.jwt.ttl_seconds().unwrap(), 120);
            assert_eq!(config.security.user_password_hashing.iterations().unwrap(), 7);

            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_short_secret() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "security:\n  jwt:\n    secret: too-short\n")?;

            let err = Config::load(&args("test.yaml")).unwrap_err();
            assert!(err.to_string().contains("exactly 64 characters"), "{err}");

            Ok(())
        });
    }

    #[test]
    fn test_missing_values_are_reported_by_key() {
        let config = Config::default();

        assert_eq!(
            config.security.jwt.ttl_seconds(),
            Err(ConfigError::Missing {
                key: "security.jwt.ttl-seconds"
            })
        );
        assert_eq!(
            config.security.user_password_hashing.salt_size(),
            Err(ConfigError::Missing {
                key: "security.user-password-hashing.salt-size"
            })
        );
        // Missing token/hashing values are not a startup error
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secret_length_validation() {
        let mut jwt = JwtConfig::default();
        assert!(jwt.validate_secret().is_ok(), "absent secret falls back to a generated one");

        jwt.secret = Some("   ".to_string());
        assert!(jwt.validate_secret().is_ok(), "blank secret counts as absent");

        jwt.secret = Some(format!("{SECRET}x"));
        assert_eq!(jwt.validate_secret(), Err(ConfigError::SecretLength { actual: 65 }));

        jwt.secret = Some(SECRET.to_string());
        assert!(jwt.validate_secret().is_ok());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let mut config = Config::default();
        config.security.user_password_hashing.iterations = Some(0);

        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_token_durations_are_bounded() {
        let mut config = Config::default();
        config.security.jwt.ttl_seconds = Some(MAX_DURATION_SECONDS);
        assert!(config.validate().is_ok());

        config.security.jwt.ttl_seconds = Some(u64::MAX);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "security.jwt.ttl-seconds",
                ..
            })
        ));

        config.security.jwt.ttl_seconds = Some(3600);
        config.security.jwt.refresh_window_seconds = Some(i64::MAX as u64);
        assert!(matches!(
            config.security.jwt.refresh_window_seconds(),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_password_policy_validation() {
        let mut config = Config::default();
        config.security.password_policy.min_length = 20;
        config.security.password_policy.max_length = 10;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "security.password-policy.min-length",
                ..
            })
        ));
    }

    #[test]
    fn test_admin_requires_both_fields() {
        let mut config = Config::default();
        config.admin.username = Some("admin".to_string());

        assert!(config.validate().is_err());

        config.admin.password = Some("correct horse battery".to_string());
        assert!(config.validate().is_ok());
    }
}
