//! Account registry storage traits.
//!
//! The registry maps external identities to local accounts. A backend may
//! additionally implement [`AtomicProfileStorage`] to apply partial profile
//! updates in a single atomic step; the [`AuthService`] asks for this
//! capability once, when it is built, through
//! [`AccountStorage::atomic_profile`].
//!
//! [`AuthService`]: crate::service::AuthService

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::StorageResult;
use crate::account::{Account, ProfileUpdate};

/// Storage trait for local accounts.
///
/// # Uniqueness
///
/// The external id and the e-mail address are each unique among *active*
/// accounts. Usernames are not checked.
#[async_trait]
pub trait AccountStorage: Send + Sync {
    /// Stores a new account.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::DuplicateIdentity` if an active account
    /// already holds the external id or e-mail address.
    async fn create(&self, account: &Account) -> StorageResult<()>;

    /// Finds an account by id, in any state.
    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Account>>;

    /// Finds the active account holding an external identity.
    async fn find_by_external_id(&self, external_id: &str) -> StorageResult<Option<Account>>;

    /// Finds the active account holding an e-mail address.
    async fn find_by_email(&self, email: &str) -> StorageResult<Option<Account>>;

    /// Finds an account by username, in any state.
    async fn find_by_username(&self, username: &str) -> StorageResult<Option<Account>>;

    /// Replaces a stored account.
    ///
    /// # Errors
    ///
    /// - `StorageError::NotFound` if the account does not exist
    /// - `StorageError::DuplicateIdentity` if the new external id or e-mail
    ///   is held by another active account
    async fn update(&self, account: &Account) -> StorageResult<()>;

    /// Soft-deletes an account.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the account does not exist.
    async fn deactivate(&self, id: Uuid, at: OffsetDateTime) -> StorageResult<()>;

    /// Lists accounts ordered by creation time.
    async fn list(&self, limit: usize, offset: usize) -> StorageResult<Vec<Account>>;

    /// Returns `true` if an active account holds the e-mail address.
    async fn exists_by_email(&self, email: &str) -> StorageResult<bool>;

    /// Returns `true` if any account holds the username.
    async fn exists_by_username(&self, username: &str) -> StorageResult<bool>;

    /// Returns the atomic profile-update capability, if this backend has it.
    fn atomic_profile(self: Arc<Self>) -> Option<Arc<dyn AtomicProfileStorage>> {
        None
    }
}

/// Optional capability: apply a partial profile update atomically.
#[async_trait]
pub trait AtomicProfileStorage: Send + Sync {
    /// Applies `update` to the stored account and returns the result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the account does not exist.
    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
        at: OffsetDateTime,
    ) -> StorageResult<Account>;
}
