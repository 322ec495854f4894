//! Authentication error types.
//!
//! This module defines the error taxonomy surfaced by the [`AuthService`]
//! and its collaborators. Each component owns a narrower error type
//! ([`TokenError`], [`StorageError`], [`IdentityError`],
//! [`ProfileUpdateError`]) which is wrapped here without losing its source.
//!
//! [`AuthService`]: crate::service::AuthService

use std::fmt;

use crate::account::profile::ProfileUpdateError;
use crate::identity::IdentityError;
use crate::storage::StorageError;
use crate::token::TokenError;

/// Errors that can occur during authentication and session operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Token verification or issuance failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The identity provider could not authenticate the user.
    ///
    /// The provider failure is kept as the error source for logging only;
    /// the display form stays opaque.
    #[error("Authentication failed")]
    AuthenticationFailed(#[source] IdentityError),

    /// The identity provider reports the e-mail address as unverified.
    #[error("Email address is not verified by the identity provider")]
    EmailNotVerified,

    /// The external profile lacks a field required to create an account.
    #[error("Invalid profile: {message}")]
    InvalidProfile {
        /// Description of the missing or invalid field.
        message: String,
    },

    /// An account with the same external identity or e-mail already exists.
    #[error("Duplicate identity: {message}")]
    DuplicateIdentity {
        /// Which identity attribute collided.
        message: String,
    },

    /// No session matches the presented token.
    #[error("Session not found")]
    SessionNotFound,

    /// The session is inactive or past its expiry.
    #[error("Session is invalid or expired")]
    SessionInvalid,

    /// The session belongs to a different account than the token subject.
    #[error("Token subject does not match session owner")]
    SubjectMismatch,

    /// The token subject no longer resolves to an active account.
    #[error("Account not found")]
    AccountNotFound,

    /// The request is malformed or missing required data.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// A partial profile update could not be built.
    #[error(transparent)]
    ProfileUpdate(#[from] ProfileUpdateError),

    /// A storage backend operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A collaborator call exceeded the request deadline.
    #[error("Operation timed out: {operation}")]
    Timeout {
        /// The collaborator operation that timed out.
        operation: &'static str,
    },

    /// The request was cancelled by the caller.
    #[error("Operation cancelled: {operation}")]
    Cancelled {
        /// The collaborator operation that was interrupted.
        operation: &'static str,
    },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `AuthenticationFailed` error wrapping a provider failure.
    #[must_use]
    pub fn authentication_failed(source: IdentityError) -> Self {
        Self::AuthenticationFailed(source)
    }

    /// Creates a new `InvalidProfile` error.
    #[must_use]
    pub fn invalid_profile(message: impl Into<String>) -> Self {
        Self::InvalidProfile {
            message: message.into(),
        }
    }

    /// Creates a new `DuplicateIdentity` error.
    #[must_use]
    pub fn duplicate_identity(message: impl Into<String>) -> Self {
        Self::DuplicateIdentity {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(operation: &'static str) -> Self {
        Self::Timeout { operation }
    }

    /// Creates a new `Cancelled` error.
    #[must_use]
    pub fn cancelled(operation: &'static str) -> Self {
        Self::Cancelled { operation }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns the underlying provider failure, if any.
    #[must_use]
    pub fn identity_error(&self) -> Option<&IdentityError> {
        match self {
            Self::AuthenticationFailed(source) => Some(source),
            _ => None,
        }
    }

    /// Returns `true` if the caller sent something that can never succeed as-is.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Token(_)
                | Self::AuthenticationFailed(_)
                | Self::EmailNotVerified
                | Self::InvalidProfile { .. }
                | Self::SessionNotFound
                | Self::SessionInvalid
                | Self::SubjectMismatch
                | Self::AccountNotFound
                | Self::InvalidRequest { .. }
                | Self::ProfileUpdate(_)
        ) && !self.is_server_error()
    }

    /// Returns `true` if the failure originates on the server side.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        match self {
            Self::Token(err) => err.is_server_error(),
            Self::Storage(_)
            | Self::DuplicateIdentity { .. }
            | Self::Timeout { .. }
            | Self::Configuration { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if a caller may retry an idempotent operation.
    ///
    /// Login is not idempotent and must not be retried blindly even when
    /// this returns `true`.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Storage(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Token(_) => ErrorCategory::Token,
            Self::AuthenticationFailed(_) => ErrorCategory::Upstream,
            Self::EmailNotVerified => ErrorCategory::Authentication,
            Self::InvalidProfile { .. } => ErrorCategory::Validation,
            Self::DuplicateIdentity { .. } => ErrorCategory::Infrastructure,
            Self::SessionNotFound => ErrorCategory::Session,
            Self::SessionInvalid => ErrorCategory::Session,
            Self::SubjectMismatch => ErrorCategory::Token,
            Self::AccountNotFound => ErrorCategory::Authentication,
            Self::InvalidRequest { .. } => ErrorCategory::Validation,
            Self::ProfileUpdate(_) => ErrorCategory::Validation,
            Self::Storage(_) => ErrorCategory::Infrastructure,
            Self::Timeout { .. } => ErrorCategory::Infrastructure,
            Self::Cancelled { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }
}

/// Categories of authentication errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Identity verification failed.
    Authentication,
    /// Token verification failed or a token was misused.
    Token,
    /// Session lookup or validity failed.
    Session,
    /// Request validation errors.
    Validation,
    /// The identity provider failed.
    Upstream,
    /// Storage, deadline, or cancellation failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Token => write!(f, "token"),
            Self::Session => write!(f, "session"),
            Self::Validation => write!(f, "validation"),
            Self::Upstream => write!(f, "upstream"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}
