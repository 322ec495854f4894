//! Storage traits for sessions and accounts.
//!
//! This module defines storage interfaces for:
//!
//! - Authentication sessions ([`SessionStorage`])
//! - Local accounts ([`AccountStorage`]), with the optional
//!   [`AtomicProfileStorage`] capability
//!
//! # Implementations
//!
//! Storage implementations are provided in separate crates:
//!
//! - `jointrip-auth-memory` - in-process storage for tests and single-node
//!   deployments

pub mod account;
pub mod session;

pub use account::{AccountStorage, AtomicProfileStorage};
pub use session::SessionStorage;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors returned by storage backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The record does not exist.
    #[error("Record not found")]
    NotFound,

    /// A unique value (such as a token) is already stored.
    #[error("Duplicate value for {field}")]
    Duplicate {
        /// Which unique value collided.
        field: String,
    },

    /// An active account already holds this external identity or e-mail.
    #[error("Identity already registered: {field}")]
    DuplicateIdentity {
        /// Which identity attribute collided.
        field: String,
    },

    /// The record changed since it was read.
    #[error("Version conflict: expected {expected}, found {actual}")]
    Conflict {
        /// Version the caller read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// The backend failed.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Creates a new `Duplicate` error.
    #[must_use]
    pub fn duplicate(field: impl Into<String>) -> Self {
        Self::Duplicate {
            field: field.into(),
        }
    }

    /// Creates a new `DuplicateIdentity` error.
    #[must_use]
    pub fn duplicate_identity(field: impl Into<String>) -> Self {
        Self::DuplicateIdentity {
            field: field.into(),
        }
    }

    /// Creates a new `Backend` error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Returns `true` if repeating the operation may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Conflict { .. })
    }
}
