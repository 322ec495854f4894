//! Google (and generic OIDC) authorization-code client.
//!
//! # Flow
//!
//! 1. **Authorization URL** - the user is redirected to the provider with
//!    offline access and forced consent, so a provider refresh token is
//!    always returned
//! 2. **Code exchange** - form POST to the token endpoint
//! 3. **Profile fetch** - bearer GET to the userinfo endpoint
//!
//! Userinfo responses are accepted in Google v2 shape (`id`,
//! `verified_email`) as well as standard OIDC shape (`sub`,
//! `email_verified`).

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{ExternalProfile, ExternalTokens, IdentityError, IdentityExchange};
use super::provider::IdentityProviderConfig;

/// HTTP client for the Google OAuth 2.0 authorization-code flow.
#[derive(Debug, Clone)]
pub struct GoogleIdentityExchange {
    http_client: reqwest::Client,
    authorization_endpoint: Url,
    token_endpoint: Url,
    userinfo_endpoint: Url,
    config: IdentityProviderConfig,
}

impl GoogleIdentityExchange {
    /// Creates a client from provider configuration.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Configuration` if the client id or redirect
    /// URL is missing, an endpoint is not a valid URL, or the HTTP client
    /// cannot be built.
    pub fn new(config: IdentityProviderConfig) -> Result<Self, IdentityError> {
        if config.client_id.is_empty() {
            return Err(IdentityError::configuration("client_id is required"));
        }
        if config.redirect_url.is_empty() {
            return Err(IdentityError::configuration("redirect_url is required"));
        }
        Url::parse(&config.redirect_url)
            .map_err(|e| IdentityError::configuration(format!("redirect_url: {e}")))?;

        let authorization_endpoint = parse_endpoint("authorization_endpoint", &config.authorization_endpoint)?;
        let token_endpoint = parse_endpoint("token_endpoint", &config.token_endpoint)?;
        let userinfo_endpoint = parse_endpoint("userinfo_endpoint", &config.userinfo_endpoint)?;

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| IdentityError::configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            authorization_endpoint,
            token_endpoint,
            userinfo_endpoint,
            config,
        })
    }

    /// Returns the provider configuration.
    #[must_use]
    pub fn config(&self) -> &IdentityProviderConfig {
        &self.config
    }
}

fn parse_endpoint(name: &str, value: &str) -> Result<Url, IdentityError> {
    Url::parse(value).map_err(|e| IdentityError::configuration(format!("{name}: {e}")))
}

#[async_trait]
impl IdentityExchange for GoogleIdentityExchange {
    fn authorization_url(&self, state: &str) -> Result<Url, IdentityError> {
        let mut url = self.authorization_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &self.config.redirect_url)
                .append_pair("scope", &self.config.scopes.join(" "))
                .append_pair("state", state)
                .append_pair("access_type", "offline")
                .append_pair("prompt", "consent");

            for (key, value) in &self.config.extra_auth_params {
                query.append_pair(key, value);
            }
        }

        tracing::debug!(endpoint = %self.authorization_endpoint, "Built authorization URL");

        Ok(url)
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalTokens, IdentityError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_url.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        tracing::debug!(
            endpoint = %self.token_endpoint,
            "Exchanging authorization code with token endpoint"
        );

        let response = self
            .http_client
            .post(self.token_endpoint.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| IdentityError::exchange_failed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if let Ok(oauth_error) = serde_json::from_str::<OAuthErrorResponse>(&body) {
                return Err(IdentityError::exchange_failed(match oauth_error.error_description {
                    Some(description) => format!("{}: {}", oauth_error.error, description),
                    None => oauth_error.error,
                }));
            }

            return Err(IdentityError::exchange_failed(format!(
                "HTTP {status} - {body}"
            )));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            IdentityError::exchange_failed(format!("Failed to parse token response: {e}"))
        })?;

        if token_response.access_token.is_empty() {
            return Err(IdentityError::exchange_failed(
                "token response has an empty access_token",
            ));
        }

        Ok(ExternalTokens {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token.filter(|t| !t.is_empty()),
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, IdentityError> {
        let response = self
            .http_client
            .get(self.userinfo_endpoint.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| IdentityError::profile_fetch_failed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(IdentityError::profile_fetch_failed(format!(
                "Userinfo request failed: HTTP {}",
                response.status()
            )));
        }

        let userinfo: UserInfoResponse = response.json().await.map_err(|e| {
            IdentityError::profile_fetch_failed(format!("Failed to parse userinfo response: {e}"))
        })?;

        tracing::debug!(external_id = %userinfo.id, "Fetched provider profile");

        Ok(ExternalProfile {
            external_id: userinfo.id,
            email: userinfo.email,
            email_verified: userinfo.verified_email,
            given_name: userinfo.given_name,
            family_name: userinfo.family_name,
            picture_url: userinfo.picture.filter(|p| !p.is_empty()),
        })
    }
}

/// OAuth token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// OAuth error response.
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Userinfo response in Google v2 or OIDC shape.
#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    #[serde(alias = "sub")]
    id: String,
    #[serde(default)]
    email: String,
    #[serde(default, alias = "email_verified")]
    verified_email: bool,
    #[serde(default)]
    given_name: String,
    #[serde(default)]
    family_name: String,
    #[serde(default)]
    picture: Option<String>,
}
