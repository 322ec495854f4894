//! Authentication session storage trait.
//!
//! # Implementation Notes
//!
//! Implementations should:
//!
//! - Keep access and refresh tokens globally unique across sessions
//! - Make every operation atomic per record
//! - Bump [`Session::version`] on every successful `update`
//!
//! # Security Considerations
//!
//! - Never log access or refresh tokens
//! - Lookups by token must be exact matches

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::StorageResult;
use crate::config::RefreshWindow;
use crate::session::Session;

/// Storage trait for authentication sessions.
///
/// Sessions are created on login, rotated on refresh, deactivated on logout
/// or quota eviction, and removed only by logout-all.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Stores a new session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Duplicate` if the id, access token, or refresh
    /// token is already stored.
    async fn create(&self, session: &Session) -> StorageResult<()>;

    /// Finds a session by id, in any state.
    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Session>>;

    /// Finds a session by its current access token, in any state.
    async fn find_by_access_token(&self, token: &str) -> StorageResult<Option<Session>>;

    /// Finds a session by its current refresh token, in any state.
    async fn find_by_refresh_token(&self, token: &str) -> StorageResult<Option<Session>>;

    /// Lists active sessions of an account.
    ///
    /// Expired-but-active sessions are included. The result is ordered by
    /// `created_at` ascending, ties broken by `id` ascending.
    async fn list_active_by_account(&self, account_id: Uuid) -> StorageResult<Vec<Session>>;

    /// Replaces a stored session.
    ///
    /// The caller's [`Session::version`] must match the stored version; the
    /// stored version is incremented on success and returned.
    ///
    /// # Errors
    ///
    /// - `StorageError::NotFound` if the session no longer exists
    /// - `StorageError::Conflict` if the session changed since it was read
    /// - `StorageError::Duplicate` if a new token collides with another
    ///   session
    async fn update(&self, session: &Session) -> StorageResult<u64>;

    /// Advances `last_used_at` without a version check.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session no longer exists.
    async fn touch(&self, id: Uuid, at: OffsetDateTime) -> StorageResult<()>;

    /// Deletes a session. Deleting a missing session is not an error.
    async fn delete(&self, id: Uuid) -> StorageResult<()>;

    /// Deletes every session of an account, returning how many were removed.
    async fn delete_by_account(&self, account_id: Uuid) -> StorageResult<u64>;

    /// Counts live sessions of an account: active and still refreshable at
    /// `now` under `window` (see [`Session::is_refreshable_at`]).
    async fn count_active_by_account(
        &self,
        account_id: Uuid,
        now: OffsetDateTime,
        window: RefreshWindow,
    ) -> StorageResult<u64>;

    /// Deactivates every active session that can no longer be refreshed at
    /// `now` under `window`, stamping `last_used_at`. Returns how many were
    /// deactivated.
    async fn deactivate_expired(
        &self,
        now: OffsetDateTime,
        window: RefreshWindow,
    ) -> StorageResult<u64>;
}
