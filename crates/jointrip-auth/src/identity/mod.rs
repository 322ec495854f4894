//! External identity exchange.
//!
//! The identity provider's authorization flow is an opaque capability: it
//! turns a one-time authorization code into provider tokens, and provider
//! tokens into a profile. The [`IdentityExchange`] trait is the seam; a
//! Google/OIDC implementation over HTTP lives in [`google`].

pub mod google;
pub mod provider;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

pub use google::GoogleIdentityExchange;
pub use provider::IdentityProviderConfig;

/// Errors raised by an identity provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum IdentityError {
    /// The authorization code could not be exchanged for tokens.
    #[error("Code exchange failed: {0}")]
    ExchangeFailed(String),

    /// The profile could not be fetched with the provider access token.
    #[error("Profile fetch failed: {0}")]
    ProfileFetchFailed(String),

    /// The provider client is misconfigured.
    #[error("Identity provider misconfigured: {0}")]
    Configuration(String),
}

impl IdentityError {
    /// Creates a new `ExchangeFailed` error.
    #[must_use]
    pub fn exchange_failed(message: impl Into<String>) -> Self {
        Self::ExchangeFailed(message.into())
    }

    /// Creates a new `ProfileFetchFailed` error.
    #[must_use]
    pub fn profile_fetch_failed(message: impl Into<String>) -> Self {
        Self::ProfileFetchFailed(message.into())
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Tokens returned by the provider's token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct ExternalTokens {
    /// Provider access token, used to fetch the profile.
    pub access_token: String,
    /// Provider refresh token, when offline access was granted.
    pub refresh_token: Option<String>,
}

impl fmt::Debug for ExternalTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Identity attributes reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProfile {
    /// Stable subject identifier at the provider.
    pub external_id: String,
    /// E-mail address.
    pub email: String,
    /// Whether the provider has verified the e-mail address.
    pub email_verified: bool,
    /// Given (first) name.
    pub given_name: String,
    /// Family (last) name.
    pub family_name: String,
    /// Profile picture URL.
    pub picture_url: Option<String>,
}

/// Turns an external authorization code into a verified external identity.
///
/// Implementations must be thread-safe (`Send + Sync`). Callers bound each
/// call with their own deadline; implementations need not.
#[async_trait]
pub trait IdentityExchange: Send + Sync {
    /// Builds the URL the user is redirected to for consent.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Configuration` if the URL cannot be built.
    fn authorization_url(&self, state: &str) -> Result<Url, IdentityError>;

    /// Exchanges a one-time authorization code for provider tokens.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::ExchangeFailed` on any transport or provider
    /// error.
    async fn exchange_code(&self, code: &str) -> Result<ExternalTokens, IdentityError>;

    /// Fetches the profile of the user owning `access_token`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::ProfileFetchFailed` on any transport or
    /// provider error.
    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, IdentityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_error_display() {
        assert_eq!(
            IdentityError::exchange_failed("invalid_grant").to_string(),
            "Code exchange failed: invalid_grant"
        );
        assert_eq!(
            IdentityError::profile_fetch_failed("HTTP 401").to_string(),
            "Profile fetch failed: HTTP 401"
        );
    }

    #[test]
    fn test_external_tokens_debug_redacted() {
        let tokens = ExternalTokens {
            access_token: "ya29.secret".to_string(),
            refresh_token: Some("1//refresh".to_string()),
        };
        let debug = format!("{tokens:?}");
        assert!(!debug.contains("ya29.secret"));
        assert!(!debug.contains("1//refresh"));
    }
}
