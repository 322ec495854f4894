//! # jointrip-auth
//!
//! Authentication and session-lifecycle engine for JoinTrip.
//!
//! This crate provides:
//! - Exchange of an external identity provider's authorization code for
//!   first-party credentials
//! - Signed, typed, expiring access and refresh tokens
//! - Per-account session quotas with deterministic eviction
//! - Partial profile updates with typed field mutations
//!
//! ## Modules
//!
//! - [`config`] - Authentication configuration and layered loading
//! - [`token`] - Token issuance and verification
//! - [`session`] - Session entity and lifecycle rules
//! - [`account`] - Account entity and profile updates
//! - [`identity`] - Identity provider contract and Google client
//! - [`storage`] - Storage traits for sessions and accounts
//! - [`context`] - Per-request deadline and cancellation
//! - [`service`] - The [`AuthService`] orchestrator

pub mod account;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod service;
pub mod session;
pub mod storage;
pub mod token;

pub use account::{
    Account, Gender, PrivacyLevel, ProfileField, ProfileUpdate, ProfileUpdateError, TravelStyle,
    UnknownFieldPolicy,
};
pub use config::{AuthConfig, ConfigError, RefreshWindow, SessionConfig, TokenConfig};
pub use context::RequestContext;
pub use error::{AuthError, ErrorCategory};
pub use identity::{
    ExternalProfile, ExternalTokens, GoogleIdentityExchange, IdentityError, IdentityExchange,
    IdentityProviderConfig,
};
pub use service::{AuthService, AuthServiceBuilder, LoginResult, RefreshResult};
pub use session::{ClientInfo, Session};
pub use storage::{
    AccountStorage, AtomicProfileStorage, SessionStorage, StorageError, StorageResult,
};
pub use token::{IssuedTokens, SigningAlgorithm, TokenClaims, TokenCodec, TokenError, TokenKind};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use jointrip_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::account::{Account, ProfileField, ProfileUpdate, UnknownFieldPolicy};
    pub use crate::config::AuthConfig;
    pub use crate::context::RequestContext;
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::identity::{ExternalProfile, ExternalTokens, IdentityError, IdentityExchange};
    pub use crate::service::{AuthService, LoginResult, RefreshResult};
    pub use crate::session::{ClientInfo, Session};
    pub use crate::storage::{AccountStorage, SessionStorage, StorageError, StorageResult};
    pub use crate::token::{TokenCodec, TokenError, TokenKind};
}
