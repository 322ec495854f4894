//! JWT token codec.
//!
//! Every login mints two HMAC-signed JWTs from the same configured secret:
//! a short-lived **access** token and a long-lived **refresh** token. Both
//! carry the account id as subject and a `typ` discriminator so that one can
//! never be accepted where the other is expected.
//!
//! ## Example
//!
//! ```ignore
//! use jointrip_auth::token::{TokenCodec, TokenKind};
//!
//! let codec = TokenCodec::new("jointrip", &config.tokens)?;
//! let issued = codec.issue(account_id)?;
//!
//! let subject = codec.verify(&issued.access_token, TokenKind::Access)?;
//! assert_eq!(subject, account_id);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::{ConfigError, TokenConfig};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while issuing or verifying tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The signature does not match the configured key or algorithm.
    #[error("Invalid token signature")]
    BadSignature,

    /// The token discriminator does not match the validation context.
    #[error("Wrong token type: expected {expected}, got {actual}")]
    WrongType {
        /// The kind the caller asked for.
        expected: TokenKind,
        /// The kind embedded in the token.
        actual: TokenKind,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token's not-before time is in the future.
    #[error("Token not yet valid")]
    NotYetValid,

    /// The token cannot be parsed or carries invalid claims.
    #[error("Malformed token: {message}")]
    Malformed {
        /// Description of what could not be parsed.
        message: String,
    },

    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    Encoding {
        /// Description of the encoding error.
        message: String,
    },
}

impl TokenError {
    /// Creates a new `Malformed` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates a new `Encoding` error.
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Returns `true` if the failure is on the issuing side rather than
    /// caused by the presented token.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Encoding { .. })
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName => Self::BadSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidIssuer => Self::malformed("issuer mismatch"),
            ErrorKind::MissingRequiredClaim(claim) => {
                Self::malformed(format!("missing required claim: {claim}"))
            }
            _ => Self::malformed(err.to_string()),
        }
    }
}

// ============================================================================
// Token Kind
// ============================================================================

/// Discriminator embedded in every token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived credential authorizing API requests.
    Access,
    /// Long-lived credential used only to mint a new access token.
    Refresh,
}

impl TokenKind {
    /// Returns the discriminator value as written into the `typ` claim.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(Self::Access),
            "refresh" => Ok(Self::Refresh),
            other => Err(format!("unknown token kind '{other}'")),
        }
    }
}

// ============================================================================
// Signing Algorithm
// ============================================================================

/// Supported HMAC signing algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256.
    #[default]
    HS256,
    /// HMAC with SHA-384.
    HS384,
    /// HMAC with SHA-512.
    HS512,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::HS256 => Algorithm::HS256,
            Self::HS384 => Algorithm::HS384,
            Self::HS512 => Algorithm::HS512,
        }
    }

    /// Returns the algorithm name as used in JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Claims
// ============================================================================

/// Claims carried by access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// Issuer.
    pub iss: String,

    /// Subject (account id).
    pub sub: String,

    /// Token discriminator.
    pub typ: TokenKind,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Not before (Unix timestamp).
    pub nbf: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Unique token id.
    pub jti: String,
}

/// A freshly minted token pair.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    /// Signed access token.
    pub access_token: String,
    /// Signed refresh token.
    pub refresh_token: String,
    /// When the access token stops validating.
    pub access_expires_at: OffsetDateTime,
    /// When the refresh token stops validating.
    pub refresh_expires_at: OffsetDateTime,
}

// ============================================================================
// Codec
// ============================================================================

/// Issues and verifies typed tokens with one process-wide secret.
///
/// The codec is `Send + Sync` and intended to be shared behind an `Arc`.
pub struct TokenCodec {
    algorithm: SigningAlgorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_lifetime: time::Duration,
    refresh_lifetime: time::Duration,
    leeway: i64,
}

impl TokenCodec {
    /// Builds a codec from the token configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` when the secret is empty and
    /// `ConfigError::InvalidValue` when a lifetime does not fit.
    pub fn new(issuer: impl Into<String>, config: &TokenConfig) -> Result<Self, ConfigError> {
        if config.secret.is_empty() {
            return Err(ConfigError::Missing("tokens.secret".to_string()));
        }

        let access_lifetime = time::Duration::try_from(config.access_token_lifetime)
            .map_err(|e| ConfigError::InvalidValue(format!("access_token_lifetime: {e}")))?;
        let refresh_lifetime = time::Duration::try_from(config.refresh_token_lifetime)
            .map_err(|e| ConfigError::InvalidValue(format!("refresh_token_lifetime: {e}")))?;
        let leeway = i64::try_from(config.leeway.as_secs())
            .map_err(|e| ConfigError::InvalidValue(format!("leeway: {e}")))?;

        Ok(Self {
            algorithm: config.algorithm,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: issuer.into(),
            access_lifetime,
            refresh_lifetime,
            leeway,
        })
    }

    /// Returns the issuer written into every token.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the signing algorithm.
    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Mints an access/refresh pair for `account_id`, issued now.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if signing fails.
    pub fn issue(&self, account_id: Uuid) -> Result<IssuedTokens, TokenError> {
        self.issue_at(account_id, OffsetDateTime::now_utc())
    }

    /// Mints an access/refresh pair as if issued at `now`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if signing fails.
    pub fn issue_at(
        &self,
        account_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<IssuedTokens, TokenError> {
        let (access_token, access_expires_at) =
            self.sign(account_id, TokenKind::Access, now, self.access_lifetime)?;
        let (refresh_token, refresh_expires_at) =
            self.sign(account_id, TokenKind::Refresh, now, self.refresh_lifetime)?;

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Verifies `token` as a token of kind `expected` and returns its subject.
    ///
    /// # Errors
    ///
    /// Returns `BadSignature`, `WrongType`, `Expired`, `NotYetValid`, or
    /// `Malformed`.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Uuid, TokenError> {
        self.verify_at(token, expected, OffsetDateTime::now_utc())
    }

    /// Verifies `token` against an explicit current time.
    ///
    /// # Errors
    ///
    /// See [`TokenCodec::verify`].
    pub fn verify_at(
        &self,
        token: &str,
        expected: TokenKind,
        now: OffsetDateTime,
    ) -> Result<Uuid, TokenError> {
        let claims = self.decode_claims(token)?;

        if claims.typ != expected {
            return Err(TokenError::WrongType {
                expected,
                actual: claims.typ,
            });
        }

        let now = now.unix_timestamp();
        if now >= claims.exp.saturating_add(self.leeway) {
            return Err(TokenError::Expired);
        }
        if claims.nbf > now.saturating_add(self.leeway) {
            return Err(TokenError::NotYetValid);
        }

        Uuid::parse_str(&claims.sub)
            .map_err(|e| TokenError::malformed(format!("subject is not a valid id: {e}")))
    }

    /// Checks the signature and returns the raw claims without enforcing
    /// kind or lifetime. Intended for diagnostics only.
    ///
    /// # Errors
    ///
    /// Returns `BadSignature` or `Malformed`.
    pub fn inspect(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.decode_claims(token)
    }

    fn sign(
        &self,
        account_id: Uuid,
        kind: TokenKind,
        now: OffsetDateTime,
        lifetime: time::Duration,
    ) -> Result<(String, OffsetDateTime), TokenError> {
        let iat = now.unix_timestamp();
        let exp = now
            .checked_add(lifetime)
            .ok_or_else(|| TokenError::encoding(format!("{kind} token expiry out of range")))?
            .unix_timestamp();
        let expires_at = OffsetDateTime::from_unix_timestamp(exp)
            .map_err(|e| TokenError::encoding(e.to_string()))?;

        let claims = TokenClaims {
            iss: self.issuer.clone(),
            sub: account_id.to_string(),
            typ: kind,
            iat,
            nbf: iat,
            exp,
            jti: Uuid::new_v4().to_string(),
        };

        let header = Header::new(self.algorithm.to_jwt_algorithm());
        let token = encode(&header, &claims, &self.encoding_key)
            .map_err(|e| TokenError::encoding(e.to_string()))?;

        Ok((token, expires_at))
    }

    fn decode_claims(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(self.algorithm.to_jwt_algorithm());
        validation.set_issuer(&[&self.issuer]);
        // Lifetime is checked by the caller against an explicit clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = ["exp", "nbf", "sub", "iss"]
            .into_iter()
            .map(String::from)
            .collect::<HashSet<_>>();

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("access_lifetime", &self.access_lifetime)
            .field("refresh_lifetime", &self.refresh_lifetime)
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config(secret: &str) -> TokenConfig {
        TokenConfig {
            secret: secret.to_string(),
            access_token_lifetime: Duration::from_secs(3600),
            refresh_token_lifetime: Duration::from_secs(7 * 24 * 3600),
            ..TokenConfig::default()
        }
    }

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new("jointrip", &config(secret)).unwrap()
    }

    #[test]
    fn test_issue_verify_roundtrip() {
        let codec = codec("k1-secret");
        let account_id = Uuid::new_v4();

        let issued = codec.issue(account_id).unwrap();
        assert_ne!(issued.access_token, issued.refresh_token);
        assert!(issued.access_expires_at < issued.refresh_expires_at);

        let subject = codec.verify(&issued.access_token, TokenKind::Access).unwrap();
        assert_eq!(subject, account_id);

        let subject = codec
            .verify(&issued.refresh_token, TokenKind::Refresh)
            .unwrap();
        assert_eq!(subject, account_id);
    }

    #[test]
    fn test_lifetimes_are_independent() {
        let codec = codec("k1-secret");
        let now = OffsetDateTime::now_utc();
        let issued = codec.issue_at(Uuid::new_v4(), now).unwrap();

        assert_eq!(
            issued.access_expires_at.unix_timestamp(),
            now.unix_timestamp() + 3600
        );
        assert_eq!(
            issued.refresh_expires_at.unix_timestamp(),
            now.unix_timestamp() + 7 * 24 * 3600
        );
    }

    #[test]
    fn test_type_confusion_rejected() {
        let codec = codec("k1-secret");
        let issued = codec.issue(Uuid::new_v4()).unwrap();

        let err = codec
            .verify(&issued.access_token, TokenKind::Refresh)
            .unwrap_err();
        assert!(matches!(
            err,
            TokenError::WrongType {
                expected: TokenKind::Refresh,
                actual: TokenKind::Access
            }
        ));

        let err = codec
            .verify(&issued.refresh_token, TokenKind::Access)
            .unwrap_err();
        assert!(matches!(err, TokenError::WrongType { .. }));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let k1 = codec("k1-secret");
        let k2 = codec("k2-secret");

        let issued = k1.issue(Uuid::new_v4()).unwrap();
        let err = k2.verify(&issued.access_token, TokenKind::Access).unwrap_err();
        assert!(matches!(err, TokenError::BadSignature));
    }

    #[test]
    fn test_foreign_algorithm_rejected() {
        let hs256 = codec("shared-secret");
        let hs512 = TokenCodec::new(
            "jointrip",
            &TokenConfig {
                algorithm: SigningAlgorithm::HS512,
                ..config("shared-secret")
            },
        )
        .unwrap();

        let issued = hs512.issue(Uuid::new_v4()).unwrap();
        let err = hs256
            .verify(&issued.access_token, TokenKind::Access)
            .unwrap_err();
        assert!(matches!(err, TokenError::BadSignature));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let ours = codec("shared-secret");
        let theirs = TokenCodec::new("someone-else", &config("shared-secret")).unwrap();

        let issued = theirs.issue(Uuid::new_v4()).unwrap();
        let err = ours.verify(&issued.access_token, TokenKind::Access).unwrap_err();
        assert!(matches!(err, TokenError::Malformed { .. }));
    }

    #[test]
    fn test_expired_token_rejected() {
        let codec = codec("k1-secret");
        let issued_at = OffsetDateTime::now_utc() - time::Duration::hours(2);
        let issued = codec.issue_at(Uuid::new_v4(), issued_at).unwrap();

        let err = codec
            .verify(&issued.access_token, TokenKind::Access)
            .unwrap_err();
        assert!(matches!(err, TokenError::Expired));

        // The refresh token lives for a week and is still fine.
        assert!(
            codec
                .verify(&issued.refresh_token, TokenKind::Refresh)
                .is_ok()
        );
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let codec = codec("k1-secret");
        let now = OffsetDateTime::now_utc();
        let issued = codec.issue_at(Uuid::new_v4(), now).unwrap();

        let last_valid = issued.access_expires_at - time::Duration::seconds(1);
        assert!(
            codec
                .verify_at(&issued.access_token, TokenKind::Access, last_valid)
                .is_ok()
        );

        let err = codec
            .verify_at(&issued.access_token, TokenKind::Access, issued.access_expires_at)
            .unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[test]
    fn test_not_yet_valid_rejected() {
        let codec = codec("k1-secret");
        let future = OffsetDateTime::now_utc() + time::Duration::minutes(10);
        let issued = codec.issue_at(Uuid::new_v4(), future).unwrap();

        let err = codec
            .verify(&issued.access_token, TokenKind::Access)
            .unwrap_err();
        assert!(matches!(err, TokenError::NotYetValid));
    }

    #[test]
    fn test_leeway_tolerates_clock_skew() {
        let lenient = TokenCodec::new(
            "jointrip",
            &TokenConfig {
                leeway: Duration::from_secs(60),
                ..config("k1-secret")
            },
        )
        .unwrap();
        let future = OffsetDateTime::now_utc() + time::Duration::seconds(30);
        let issued = lenient.issue_at(Uuid::new_v4(), future).unwrap();

        assert!(
            lenient
                .verify(&issued.access_token, TokenKind::Access)
                .is_ok()
        );
    }

    #[test]
    fn test_malformed_token_rejected() {
        let codec = codec("k1-secret");
        for garbage in ["", "not-a-jwt", "a.b.c"] {
            let err = codec.verify(garbage, TokenKind::Access).unwrap_err();
            assert!(
                matches!(err, TokenError::Malformed { .. }),
                "expected Malformed for {garbage:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_tokens_are_unique_within_one_second() {
        let codec = codec("k1-secret");
        let account_id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let first = codec.issue_at(account_id, now).unwrap();
        let second = codec.issue_at(account_id, now).unwrap();
        assert_ne!(first.access_token, second.access_token);
        assert_ne!(first.refresh_token, second.refresh_token);
    }

    #[test]
    fn test_inspect_exposes_claims() {
        let codec = codec("k1-secret");
        let account_id = Uuid::new_v4();
        let issued = codec.issue(account_id).unwrap();

        let claims = codec.inspect(&issued.refresh_token).unwrap();
        assert_eq!(claims.iss, "jointrip");
        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.typ, TokenKind::Refresh);
        assert_eq!(claims.nbf, claims.iat);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_out_of_range_expiry_is_an_error() {
        let codec = TokenCodec::new(
            "jointrip",
            &TokenConfig {
                refresh_token_lifetime: Duration::from_secs(400_000 * 365 * 24 * 3600),
                ..config("secret")
            },
        )
        .unwrap();

        let err = codec.issue(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, TokenError::Encoding { .. }), "got {err:?}");
        assert!(err.is_server_error());
    }

    #[test]
    fn test_empty_secret_rejected() {
        let err = TokenCodec::new("jointrip", &config("")).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_claims_serialization() {
        let claims = TokenClaims {
            iss: "jointrip".to_string(),
            sub: "abc".to_string(),
            typ: TokenKind::Access,
            iat: 1_700_000_000,
            nbf: 1_700_000_000,
            exp: 1_700_003_600,
            jti: "id".to_string(),
        };
        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("\"typ\":\"access\""));
        assert!(json.contains("\"iss\":\"jointrip\""));
    }

    #[test]
    fn test_debug_hides_keys() {
        let codec = codec("super-secret-value");
        let debug = format!("{codec:?}");
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("HS256"));
    }
}
