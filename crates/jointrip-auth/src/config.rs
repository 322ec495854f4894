//! Authentication configuration.
//!
//! Configuration is an explicit value handed to the [`AuthService`] at
//! construction time. Durations use human-readable strings (`"24h"`,
//! `"30s"`) in TOML and environment variables.
//!
//! # Example (TOML)
//!
//! ```toml
//! issuer = "jointrip"
//! request_timeout = "10s"
//!
//! [tokens]
//! secret = "change-me"
//! access_token_lifetime = "24h"
//! refresh_token_lifetime = "7days"
//!
//! [sessions]
//! max_active_sessions = 5
//! refresh_window = "refresh_expiry"
//!
//! [identity]
//! client_id = "...apps.googleusercontent.com"
//! client_secret = "..."
//! redirect_url = "https://app.jointrip.example/auth/callback"
//! ```
//!
//! [`AuthService`]: crate::service::AuthService

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::identity::IdentityProviderConfig;
use crate::token::SigningAlgorithm;

/// Longest accepted token lifetime (ten years).
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Root authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Value of the `iss` claim in every token.
    pub issuer: String,

    /// Token signing and lifetimes.
    pub tokens: TokenConfig,

    /// Session quota and refresh rules.
    pub sessions: SessionConfig,

    /// External identity provider settings.
    pub identity: IdentityProviderConfig,

    /// Deadline applied to each collaborator call when the caller does not
    /// supply one.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "jointrip".to_string(),
            tokens: TokenConfig::default(),
            sessions: SessionConfig::default(),
            identity: IdentityProviderConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Token signing configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Shared HMAC secret. Required.
    pub secret: String,

    /// HMAC algorithm.
    pub algorithm: SigningAlgorithm,

    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// Clock skew tolerated when checking `exp` and `nbf`.
    #[serde(with = "humantime_serde")]
    pub leeway: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algorithm: SigningAlgorithm::HS256,
            access_token_lifetime: Duration::from_secs(24 * 3600), // 24 hours
            refresh_token_lifetime: Duration::from_secs(7 * 24 * 3600), // 7 days
            leeway: Duration::ZERO,
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .field("access_token_lifetime", &self.access_token_lifetime)
            .field("refresh_token_lifetime", &self.refresh_token_lifetime)
            .field("leeway", &self.leeway)
            .finish()
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of simultaneously active sessions per account.
    /// The oldest sessions are evicted on login once the limit is reached.
    pub max_active_sessions: usize,

    /// Which expiry bounds refresh of a session.
    pub refresh_window: RefreshWindow,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_active_sessions: 5,
            refresh_window: RefreshWindow::default(),
        }
    }
}

/// Which expiry bounds the refresh of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshWindow {
    /// Refresh is allowed until the refresh token itself expires.
    #[default]
    RefreshExpiry,
    /// Refresh is allowed only while the access token is still valid.
    AccessExpiry,
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration sources could not be read or merged.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the signing secret is empty.
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The issuer is empty
    /// - A token lifetime is zero or longer than [`MAX_TOKEN_LIFETIME`]
    /// - The access token lifetime is not shorter than the refresh lifetime
    /// - The session quota is zero
    /// - The request timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::InvalidValue(
                "issuer cannot be empty".to_string(),
            ));
        }

        if self.tokens.secret.is_empty() {
            return Err(ConfigError::Missing("tokens.secret".to_string()));
        }

        if self.tokens.access_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "access_token_lifetime must be > 0".to_string(),
            ));
        }

        if self.tokens.refresh_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "refresh_token_lifetime must be > 0".to_string(),
            ));
        }

        if self.tokens.refresh_token_lifetime > MAX_TOKEN_LIFETIME {
            return Err(ConfigError::InvalidValue(format!(
                "refresh_token_lifetime must be at most {MAX_TOKEN_LIFETIME:?}"
            )));
        }

        if self.tokens.access_token_lifetime >= self.tokens.refresh_token_lifetime {
            return Err(ConfigError::InvalidValue(format!(
                "access_token_lifetime ({:?}) must be shorter than refresh_token_lifetime ({:?})",
                self.tokens.access_token_lifetime, self.tokens.refresh_token_lifetime
            )));
        }

        if self.sessions.max_active_sessions == 0 {
            return Err(ConfigError::InvalidValue(
                "max_active_sessions must be > 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "request_timeout must be > 0".to_string(),
            ));
        }

        self.identity.validate()
    }
}

pub mod loader {
    //! Layered configuration loading.
    //!
    //! Sources, lowest precedence first:
    //! 1. Built-in defaults
    //! 2. A TOML file (explicit path, or `jointrip-auth.toml` if present)
    //! 3. Environment variables, e.g. `JOINTRIP__TOKENS__SECRET=...`

    use std::path::PathBuf;

    use ::config::{Config, Environment, File};

    use super::{AuthConfig, ConfigError};

    /// Default configuration file looked up in the working directory.
    pub const DEFAULT_CONFIG_FILE: &str = "jointrip-auth.toml";

    /// Loads and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` when a source cannot be parsed, or any
    /// error from [`AuthConfig::validate`].
    pub fn load_config(path: Option<&str>) -> Result<AuthConfig, ConfigError> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(ConfigError::Load(format!("config file not found: {p}")));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // e.g. JOINTRIP__SESSIONS__MAX_ACTIVE_SESSIONS=3
        builder = builder.add_source(
            Environment::with_prefix("JOINTRIP")
                .try_parsing(true)
                .separator("__"),
        );

        let cfg = builder
            .build()
            .map_err(|e| ConfigError::Load(format!("config build error: {e}")))?;
        let merged: AuthConfig = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::Load(format!("config deserialize error: {e}")))?;

        merged.validate()?;
        Ok(merged)
    }
}
