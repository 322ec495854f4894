//! Authentication session entity.
//!
//! A session binds one issued access/refresh token pair to an account and
//! records where the login came from. Sessions move through three states:
//!
//! - **Active-Valid**: active and before the access expiry
//! - **Active-Expired**: active but past the access expiry
//! - **Inactive**: logged out or evicted; terminal
//!
//! Sessions are never reactivated.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::config::RefreshWindow;
use crate::error::AuthError;
use crate::identity::ExternalTokens;
use crate::token::IssuedTokens;

/// Where a login request came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Originating network address.
    pub ip_address: Option<String>,
    /// Client descriptor, typically the `User-Agent` header.
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// Creates client info from an address and a descriptor.
    #[must_use]
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: Some(ip_address.into()),
            user_agent: Some(user_agent.into()),
        }
    }
}

/// A persisted authentication session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session id. UUIDv7, so ids sort in creation order.
    pub id: Uuid,

    /// Owning account.
    pub account_id: Uuid,

    /// Current access token.
    pub access_token: String,

    /// Current refresh token.
    pub refresh_token: String,

    /// Provider access token obtained at login.
    pub external_access_token: String,

    /// Provider refresh token obtained at login.
    pub external_refresh_token: Option<String>,

    /// When the current access token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// When the current refresh token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,

    /// Originating network address.
    pub ip_address: Option<String>,

    /// Client descriptor.
    pub user_agent: Option<String>,

    /// Cleared on logout or eviction.
    pub active: bool,

    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the session was last used.
    #[serde(with = "time::serde::rfc3339")]
    pub last_used_at: OffsetDateTime,

    /// Store version for optimistic concurrency. Maintained by the store.
    pub version: u64,
}

impl Session {
    /// Creates a new active session for a freshly issued token pair.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` if the account id is nil or a
    /// local token is empty.
    pub fn new(
        account_id: Uuid,
        tokens: &IssuedTokens,
        external: ExternalTokens,
        client: ClientInfo,
        now: OffsetDateTime,
    ) -> AuthResult<Self> {
        if account_id.is_nil() {
            return Err(AuthError::invalid_request("account id is required"));
        }
        if tokens.access_token.is_empty() {
            return Err(AuthError::invalid_request("access token is required"));
        }
        if tokens.refresh_token.is_empty() {
            return Err(AuthError::invalid_request("refresh token is required"));
        }

        Ok(Self {
            id: Uuid::now_v7(),
            account_id,
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            external_access_token: external.access_token,
            external_refresh_token: external.refresh_token,
            expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
            ip_address: client.ip_address,
            user_agent: client.user_agent,
            active: true,
            created_at: now,
            last_used_at: now,
            version: 0,
        })
    }

    /// Replaces both tokens and their expiries.
    pub fn rotate(&mut self, tokens: &IssuedTokens, now: OffsetDateTime) {
        self.access_token = tokens.access_token.clone();
        self.refresh_token = tokens.refresh_token.clone();
        self.expires_at = tokens.access_expires_at;
        self.refresh_expires_at = tokens.refresh_expires_at;
        self.last_used_at = now;
    }

    /// Advances the last-used timestamp.
    pub fn touch(&mut self, now: OffsetDateTime) {
        self.last_used_at = now;
    }

    /// Marks the session inactive.
    pub fn deactivate(&mut self, now: OffsetDateTime) {
        self.active = false;
        self.last_used_at = now;
    }

    /// Returns `true` once the access token has expired.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Returns `true` if the session is active and not expired.
    #[must_use]
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        self.active && !self.is_expired_at(now)
    }

    /// Returns `true` if the session may be refreshed at `now`.
    #[must_use]
    pub fn is_refreshable_at(&self, now: OffsetDateTime, window: RefreshWindow) -> bool {
        let deadline = match window {
            RefreshWindow::RefreshExpiry => self.refresh_expires_at,
            RefreshWindow::AccessExpiry => self.expires_at,
        };
        self.active && now < deadline
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("account_id", &self.account_id)
            .field("expires_at", &self.expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .field("ip_address", &self.ip_address)
            .field("user_agent", &self.user_agent)
            .field("active", &self.active)
            .field("created_at", &self.created_at)
            .field("last_used_at", &self.last_used_at)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;

    fn issued(now: OffsetDateTime, suffix: &str) -> IssuedTokens {
        IssuedTokens {
            access_token: format!("access-{suffix}"),
            refresh_token: format!("refresh-{suffix}"),
            access_expires_at: now + Duration::hours(1),
            refresh_expires_at: now + Duration::days(7),
        }
    }

    fn external() -> ExternalTokens {
        ExternalTokens {
            access_token: "ya29".to_string(),
            refresh_token: None,
        }
    }

    fn session(now: OffsetDateTime) -> Session {
        Session::new(
            Uuid::new_v4(),
            &issued(now, "1"),
            external(),
            ClientInfo::new("10.0.0.1", "test-agent"),
            now,
        )
        .unwrap()
    }

    #[test]
    fn test_new_session() {
        let now = OffsetDateTime::now_utc();
        let session = session(now);

        assert!(session.active);
        assert_eq!(session.created_at, now);
        assert_eq!(session.last_used_at, now);
        assert_eq!(session.version, 0);
        assert_eq!(session.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(session.id.get_version_num(), 7);
        assert!(session.is_valid_at(now));
    }

    #[test]
    fn test_new_session_rejects_nil_account() {
        let now = OffsetDateTime::now_utc();
        let err = Session::new(
            Uuid::nil(),
            &issued(now, "1"),
            external(),
            ClientInfo::default(),
            now,
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));
    }

    #[test]
    fn test_new_session_rejects_empty_tokens() {
        let now = OffsetDateTime::now_utc();
        let mut tokens = issued(now, "1");
        tokens.refresh_token.clear();

        let err = Session::new(
            Uuid::new_v4(),
            &tokens,
            external(),
            ClientInfo::default(),
            now,
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));
    }

    #[test]
    fn test_session_ids_sort_by_creation() {
        let now = OffsetDateTime::now_utc();
        let first = session(now);
        let second = session(now);
        assert!(first.id < second.id);
    }

    #[test]
    fn test_expiry_boundary() {
        let now = OffsetDateTime::now_utc();
        let session = session(now);

        assert!(!session.is_expired_at(session.expires_at - Duration::seconds(1)));
        assert!(session.is_expired_at(session.expires_at));
        assert!(!session.is_valid_at(session.expires_at));
    }

    #[test]
    fn test_rotate_replaces_tokens() {
        let now = OffsetDateTime::now_utc();
        let mut session = session(now);
        let later = now + Duration::minutes(30);

        session.rotate(&issued(later, "2"), later);
        assert_eq!(session.access_token, "access-2");
        assert_eq!(session.refresh_token, "refresh-2");
        assert_eq!(session.expires_at, later + Duration::hours(1));
        assert_eq!(session.last_used_at, later);
        assert_eq!(session.created_at, now);
    }

    #[test]
    fn test_deactivate() {
        let now = OffsetDateTime::now_utc();
        let mut session = session(now);
        let later = now + Duration::minutes(1);

        session.deactivate(later);
        assert!(!session.active);
        assert_eq!(session.last_used_at, later);
        assert!(!session.is_valid_at(later));
        assert!(!session.is_refreshable_at(later, RefreshWindow::RefreshExpiry));
    }

    #[test]
    fn test_refresh_window() {
        let now = OffsetDateTime::now_utc();
        let session = session(now);
        let after_access_expiry = now + Duration::hours(2);

        assert!(session.is_refreshable_at(after_access_expiry, RefreshWindow::RefreshExpiry));
        assert!(!session.is_refreshable_at(after_access_expiry, RefreshWindow::AccessExpiry));
        assert!(!session.is_refreshable_at(now + Duration::days(8), RefreshWindow::RefreshExpiry));
    }

    #[test]
    fn test_debug_hides_tokens() {
        let session = session(OffsetDateTime::now_utc());
        let debug = format!("{session:?}");
        assert!(!debug.contains("access-1"));
        assert!(!debug.contains("ya29"));
    }
}
