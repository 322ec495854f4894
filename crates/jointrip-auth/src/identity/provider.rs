//! Identity provider configuration.
//!
//! Defaults point at Google's OAuth 2.0 endpoints. Any provider speaking the
//! same authorization-code flow with a JSON userinfo endpoint can be
//! configured by overriding the endpoints.
//!
//! # Example
//!
//! ```ignore
//! use jointrip_auth::identity::IdentityProviderConfig;
//!
//! let config = IdentityProviderConfig::new(
//!     "client-id.apps.googleusercontent.com",
//!     "client-secret",
//!     "https://app.jointrip.example/auth/callback",
//! )
//! .with_scopes(vec!["openid", "email", "profile"]);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Google authorization endpoint.
pub const GOOGLE_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google token endpoint.
pub const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Google userinfo endpoint (v2).
pub const GOOGLE_USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Configuration of the external identity provider client.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityProviderConfig {
    /// OAuth client ID registered with the provider.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: String,

    /// Redirect URI registered with the provider.
    pub redirect_url: String,

    /// Authorization endpoint.
    pub authorization_endpoint: String,

    /// Token endpoint.
    pub token_endpoint: String,

    /// Userinfo endpoint.
    pub userinfo_endpoint: String,

    /// Scopes to request.
    pub scopes: Vec<String>,

    /// Additional query parameters for the authorization URL.
    pub extra_auth_params: BTreeMap<String, String>,

    /// HTTP timeout for token and userinfo requests.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for IdentityProviderConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: String::new(),
            authorization_endpoint: GOOGLE_AUTHORIZATION_ENDPOINT.to_string(),
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.to_string(),
            userinfo_endpoint: GOOGLE_USERINFO_ENDPOINT.to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/userinfo.email".to_string(),
                "https://www.googleapis.com/auth/userinfo.profile".to_string(),
            ],
            extra_auth_params: BTreeMap::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl IdentityProviderConfig {
    /// Creates a configuration with Google defaults and the given client.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: redirect_url.into(),
            ..Self::default()
        }
    }

    /// Sets the scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the authorization endpoint.
    #[must_use]
    pub fn with_authorization_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.authorization_endpoint = endpoint.into();
        self
    }

    /// Sets the token endpoint.
    #[must_use]
    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into();
        self
    }

    /// Sets the userinfo endpoint.
    #[must_use]
    pub fn with_userinfo_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.userinfo_endpoint = endpoint.into();
        self
    }

    /// Adds an extra authorization URL parameter.
    #[must_use]
    pub fn with_extra_auth_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.extra_auth_params.insert(key.into(), value.into());
        self
    }

    /// Sets the HTTP timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns `true` if enough is configured to run the authorization flow.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.redirect_url.is_empty()
    }

    /// Validates values that must hold even when the flow is not configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an empty scope list or a zero
    /// timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scopes.is_empty() {
            return Err(ConfigError::InvalidValue(
                "identity.scopes cannot be empty".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "identity.request_timeout must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for IdentityProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_url", &self.redirect_url)
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("userinfo_endpoint", &self.userinfo_endpoint)
            .field("scopes", &self.scopes)
            .field("extra_auth_params", &self.extra_auth_params)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_defaults() {
        let config = IdentityProviderConfig::default();
        assert_eq!(config.token_endpoint, GOOGLE_TOKEN_ENDPOINT);
        assert_eq!(config.userinfo_endpoint, GOOGLE_USERINFO_ENDPOINT);
        assert_eq!(config.scopes.len(), 2);
        assert!(!config.is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = IdentityProviderConfig::new("id", "secret", "https://app/cb")
            .with_scopes(vec!["openid", "email"])
            .with_extra_auth_param("hd", "jointrip.example")
            .with_request_timeout(Duration::from_secs(5));

        assert!(config.is_configured());
        assert_eq!(config.scopes, vec!["openid", "email"]);
        assert_eq!(
            config.extra_auth_params.get("hd").map(String::as_str),
            Some("jointrip.example")
        );
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_empty_scopes_rejected() {
        let config = IdentityProviderConfig::default().with_scopes(Vec::<String>::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = IdentityProviderConfig::new("id", "very-secret", "https://app/cb");
        assert!(!format!("{config:?}").contains("very-secret"));
    }
}
