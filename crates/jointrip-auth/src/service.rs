//! Authentication orchestrator.
//!
//! [`AuthService`] coordinates the token codec, the session and account
//! stores, and the identity provider to implement:
//!
//! - **Login** - exchange an authorization code for a local session
//! - **Refresh** - rotate a session's token pair
//! - **Logout / logout-all** - end one or every session of an account
//! - **Validation** - resolve an access token to its account
//!
//! plus profile updates and the expired-session reaper hook.
//!
//! # Session quota
//!
//! Before a new session is stored, the oldest live sessions of the account
//! are deactivated so that at most `max_active_sessions` remain live after
//! the insert. A session is live while it can still be refreshed under
//! [`RefreshWindow`](crate::config::RefreshWindow). Counting and evicting
//! are separate store calls, so concurrent logins of one account may
//! transiently exceed the limit.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use jointrip_auth::{AuthService, RequestContext};
//!
//! let service = AuthService::builder(config)
//!     .with_session_storage(Arc::new(sessions))
//!     .with_account_storage(Arc::new(accounts))
//!     .with_identity_exchange(Arc::new(google))
//!     .build()?;
//!
//! let ctx = RequestContext::new();
//! let login = service.login(&ctx, "auth-code", client_info).await?;
//! let account = service.validate_token(&ctx, &login.access_token).await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::AuthResult;
use crate::account::{Account, ProfileUpdate};
use crate::config::{AuthConfig, SessionConfig};
use crate::context::RequestContext;
use crate::error::AuthError;
use crate::identity::{ExternalProfile, IdentityError, IdentityExchange};
use crate::session::{ClientInfo, Session};
use crate::storage::{
    AccountStorage, AtomicProfileStorage, SessionStorage, StorageError, StorageResult,
};
use crate::token::{TokenCodec, TokenKind};

// ============================================================================
// Results
// ============================================================================

/// Credentials returned by a successful login.
#[derive(Clone, Serialize)]
pub struct LoginResult {
    /// The logged-in account.
    pub account: Account,
    /// Access token for API requests.
    pub access_token: String,
    /// Refresh token for [`AuthService::refresh_token`].
    pub refresh_token: String,
    /// When the access token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Credentials returned by a successful refresh.
#[derive(Clone, Serialize)]
pub struct RefreshResult {
    /// New access token.
    pub access_token: String,
    /// New refresh token. The presented one no longer resolves.
    pub refresh_token: String,
    /// When the new access token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl fmt::Debug for LoginResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResult")
            .field("account", &self.account.id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for RefreshResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshResult")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`AuthService`].
pub struct AuthServiceBuilder {
    config: AuthConfig,
    sessions: Option<Arc<dyn SessionStorage>>,
    accounts: Option<Arc<dyn AccountStorage>>,
    identity: Option<Arc<dyn IdentityExchange>>,
}

impl AuthServiceBuilder {
    /// Sets the session store.
    #[must_use]
    pub fn with_session_storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.sessions = Some(storage);
        self
    }

    /// Sets the account registry.
    #[must_use]
    pub fn with_account_storage(mut self, storage: Arc<dyn AccountStorage>) -> Self {
        self.accounts = Some(storage);
        self
    }

    /// Sets the identity provider.
    #[must_use]
    pub fn with_identity_exchange(mut self, identity: Arc<dyn IdentityExchange>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Validates the configuration and builds the service.
    ///
    /// The account registry is asked for the atomic profile-update
    /// capability here, once.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the configuration is invalid or
    /// a collaborator is missing.
    pub fn build(self) -> AuthResult<AuthService> {
        self.config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        let sessions = self
            .sessions
            .ok_or_else(|| AuthError::configuration("session storage is required"))?;
        let accounts = self
            .accounts
            .ok_or_else(|| AuthError::configuration("account storage is required"))?;
        let identity = self
            .identity
            .ok_or_else(|| AuthError::configuration("identity exchange is required"))?;

        let codec = TokenCodec::new(self.config.issuer.clone(), &self.config.tokens)
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        let atomic_profiles = Arc::clone(&accounts).atomic_profile();

        tracing::info!(
            issuer = %self.config.issuer,
            algorithm = %codec.algorithm(),
            max_active_sessions = self.config.sessions.max_active_sessions,
            atomic_profile_updates = atomic_profiles.is_some(),
            "Auth service initialized"
        );

        Ok(AuthService {
            codec,
            sessions,
            accounts,
            atomic_profiles,
            identity,
            session_config: self.config.sessions,
            request_timeout: self.config.request_timeout,
        })
    }
}

// ============================================================================
// Service
// ============================================================================

/// Authentication and session-lifecycle engine.
///
/// Every operation takes a [`RequestContext`]; when the caller sets no
/// deadline, the configured `request_timeout` applies to the whole
/// operation.
pub struct AuthService {
    codec: TokenCodec,
    sessions: Arc<dyn SessionStorage>,
    accounts: Arc<dyn AccountStorage>,
    atomic_profiles: Option<Arc<dyn AtomicProfileStorage>>,
    identity: Arc<dyn IdentityExchange>,
    session_config: SessionConfig,
    request_timeout: Duration,
}

impl AuthService {
    /// Starts building a service from configuration.
    #[must_use]
    pub fn builder(config: AuthConfig) -> AuthServiceBuilder {
        AuthServiceBuilder {
            config,
            sessions: None,
            accounts: None,
            identity: None,
        }
    }

    /// Returns the token codec.
    #[must_use]
    pub fn token_codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Returns `true` if profile updates go through the registry's atomic
    /// capability.
    #[must_use]
    pub fn has_atomic_profile_updates(&self) -> bool {
        self.atomic_profiles.is_some()
    }

    /// Builds the identity provider consent URL.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` for an empty state and
    /// `AuthError::Configuration` if the provider client is misconfigured.
    pub fn authorization_url(&self, state: &str) -> AuthResult<Url> {
        if state.is_empty() {
            return Err(AuthError::invalid_request("state is required"));
        }
        self.identity
            .authorization_url(state)
            .map_err(|e| match e {
                IdentityError::Configuration(message) => AuthError::configuration(message),
                other => AuthError::authentication_failed(other),
            })
    }

    /// Logs a user in with an authorization code.
    ///
    /// # Errors
    ///
    /// - `AuthenticationFailed` if the code exchange or profile fetch fails
    /// - `EmailNotVerified` if the provider has not verified the e-mail
    /// - `InvalidProfile` if a new account cannot be built from the profile
    /// - `DuplicateIdentity` if account creation collides and the winner
    ///   cannot be found
    /// - `Storage`, `Timeout`, or `Cancelled` from collaborator calls
    pub async fn login(
        &self,
        ctx: &RequestContext,
        code: &str,
        client: ClientInfo,
    ) -> AuthResult<LoginResult> {
        if code.is_empty() {
            return Err(AuthError::invalid_request("authorization code is required"));
        }
        let ctx = ctx.or_timeout(self.request_timeout);

        let external = ctx
            .run("exchange_code", self.identity.exchange_code(code))
            .await?
            .map_err(|e| {
                tracing::warn!(error = %e, "Authorization code exchange failed");
                AuthError::authentication_failed(e)
            })?;

        let profile = ctx
            .run(
                "fetch_profile",
                self.identity.fetch_profile(&external.access_token),
            )
            .await?
            .map_err(|e| {
                tracing::warn!(error = %e, "Profile fetch failed");
                AuthError::authentication_failed(e)
            })?;

        if !profile.email_verified {
            tracing::warn!(
                external_id = %profile.external_id,
                "Login rejected: e-mail not verified by provider"
            );
            return Err(AuthError::EmailNotVerified);
        }

        let now = OffsetDateTime::now_utc();
        let account = self.resolve_account(&ctx, &profile, now).await?;

        let tokens = self.codec.issue_at(account.id, now)?;

        self.enforce_session_quota(&ctx, account.id, now).await?;

        let session = Session::new(account.id, &tokens, external, client, now)?;
        storage_call(&ctx, "create_session", self.sessions.create(&session)).await?;

        tracing::info!(
            account_id = %account.id,
            session_id = %session.id,
            "User logged in"
        );

        Ok(LoginResult {
            account,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.access_expires_at,
        })
    }

    /// Rotates the token pair of the session holding `refresh_token`.
    ///
    /// # Errors
    ///
    /// - `Token` if the token does not verify as a refresh token
    /// - `SessionNotFound` if no session holds the token
    /// - `SessionInvalid` if the session is inactive or outside the refresh
    ///   window
    /// - `SubjectMismatch` if the session belongs to another account
    /// - `Storage(Conflict)` if a concurrent refresh won
    pub async fn refresh_token(
        &self,
        ctx: &RequestContext,
        refresh_token: &str,
    ) -> AuthResult<RefreshResult> {
        let ctx = ctx.or_timeout(self.request_timeout);
        let now = OffsetDateTime::now_utc();

        let account_id = self
            .codec
            .verify_at(refresh_token, TokenKind::Refresh, now)?;

        let mut session = storage_call(
            &ctx,
            "find_session",
            self.sessions.find_by_refresh_token(refresh_token),
        )
        .await?
        .ok_or(AuthError::SessionNotFound)?;

        if !session.is_refreshable_at(now, self.session_config.refresh_window) {
            tracing::debug!(session_id = %session.id, "Refresh rejected: session not refreshable");
            return Err(AuthError::SessionInvalid);
        }

        if session.account_id != account_id {
            tracing::warn!(
                session_id = %session.id,
                account_id = %account_id,
                "Refresh rejected: token subject does not own session"
            );
            return Err(AuthError::SubjectMismatch);
        }

        let tokens = self.codec.issue_at(account_id, now)?;
        session.rotate(&tokens, now);
        session.version =
            storage_call(&ctx, "update_session", self.sessions.update(&session)).await?;

        tracing::info!(
            account_id = %account_id,
            session_id = %session.id,
            "Session refreshed"
        );

        Ok(RefreshResult {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.access_expires_at,
        })
    }

    /// Ends the session holding `access_token`.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if no session holds the token.
    pub async fn logout(&self, ctx: &RequestContext, access_token: &str) -> AuthResult<()> {
        let ctx = ctx.or_timeout(self.request_timeout);

        let mut session = storage_call(
            &ctx,
            "find_session",
            self.sessions.find_by_access_token(access_token),
        )
        .await?
        .ok_or(AuthError::SessionNotFound)?;

        session.deactivate(OffsetDateTime::now_utc());
        storage_call(&ctx, "update_session", self.sessions.update(&session)).await?;

        tracing::info!(
            account_id = %session.account_id,
            session_id = %session.id,
            "User logged out"
        );

        Ok(())
    }

    /// Removes every session of an account, returning how many were removed.
    pub async fn logout_all(&self, ctx: &RequestContext, account_id: Uuid) -> AuthResult<u64> {
        let ctx = ctx.or_timeout(self.request_timeout);

        let removed = storage_call(
            &ctx,
            "delete_sessions",
            self.sessions.delete_by_account(account_id),
        )
        .await?;

        tracing::info!(account_id = %account_id, removed, "User logged out of all sessions");

        Ok(removed)
    }

    /// Resolves an access token to its account.
    ///
    /// # Errors
    ///
    /// - `Token` if the token does not verify as an access token
    /// - `SessionNotFound` if no session holds the token
    /// - `SessionInvalid` if the session is inactive or expired
    /// - `SubjectMismatch` if the session belongs to another account
    /// - `AccountNotFound` if the account is missing or deactivated
    pub async fn validate_token(
        &self,
        ctx: &RequestContext,
        access_token: &str,
    ) -> AuthResult<Account> {
        let ctx = ctx.or_timeout(self.request_timeout);
        let now = OffsetDateTime::now_utc();

        let account_id = self
            .codec
            .verify_at(access_token, TokenKind::Access, now)?;

        let session = storage_call(
            &ctx,
            "find_session",
            self.sessions.find_by_access_token(access_token),
        )
        .await?
        .ok_or(AuthError::SessionNotFound)?;

        if !session.is_valid_at(now) {
            return Err(AuthError::SessionInvalid);
        }

        if session.account_id != account_id {
            tracing::warn!(
                session_id = %session.id,
                account_id = %account_id,
                "Validation rejected: token subject does not own session"
            );
            return Err(AuthError::SubjectMismatch);
        }

        if let Err(e) = storage_call(&ctx, "touch_session", self.sessions.touch(session.id, now)).await
        {
            tracing::warn!(session_id = %session.id, error = %e, "Failed to update session last-used time");
        }

        let account = storage_call(&ctx, "find_account", self.accounts.find_by_id(account_id))
            .await?
            .filter(|account| account.active)
            .ok_or(AuthError::AccountNotFound)?;

        Ok(account)
    }

    /// Replaces an account record.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account does not exist.
    pub async fn update_account(&self, ctx: &RequestContext, account: &Account) -> AuthResult<()> {
        let ctx = ctx.or_timeout(self.request_timeout);

        storage_call(&ctx, "update_account", self.accounts.update(account))
            .await
            .map_err(account_not_found)
    }

    /// Applies a partial profile update and returns the updated account.
    ///
    /// Uses the registry's atomic capability when available, otherwise
    /// reads, modifies, and writes the account. An empty update changes
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account does not exist.
    pub async fn update_profile(
        &self,
        ctx: &RequestContext,
        account_id: Uuid,
        update: &ProfileUpdate,
    ) -> AuthResult<Account> {
        let ctx = ctx.or_timeout(self.request_timeout);
        let now = OffsetDateTime::now_utc();

        if update.is_empty() {
            return storage_call(&ctx, "find_account", self.accounts.find_by_id(account_id))
                .await?
                .ok_or(AuthError::AccountNotFound);
        }

        let account = match &self.atomic_profiles {
            Some(atomic) => storage_call(
                &ctx,
                "update_profile",
                atomic.update_profile(account_id, update, now),
            )
            .await
            .map_err(account_not_found)?,
            None => {
                let mut account =
                    storage_call(&ctx, "find_account", self.accounts.find_by_id(account_id))
                        .await?
                        .ok_or(AuthError::AccountNotFound)?;
                update.apply(&mut account, now);
                storage_call(&ctx, "update_account", self.accounts.update(&account))
                    .await
                    .map_err(account_not_found)?;
                account
            }
        };

        tracing::debug!(
            account_id = %account_id,
            fields = update.len(),
            "Profile updated"
        );

        Ok(account)
    }

    /// Deactivates every session that can no longer be refreshed under the
    /// configured window, returning how many were affected.
    ///
    /// Intended to be called periodically by an external scheduler.
    pub async fn deactivate_expired_sessions(&self, ctx: &RequestContext) -> AuthResult<u64> {
        let ctx = ctx.or_timeout(self.request_timeout);

        let count = storage_call(
            &ctx,
            "deactivate_expired_sessions",
            self.sessions.deactivate_expired(
                OffsetDateTime::now_utc(),
                self.session_config.refresh_window,
            ),
        )
        .await?;

        if count > 0 {
            tracing::info!(deactivated = count, "Deactivated expired sessions");
        }

        Ok(count)
    }

    /// Finds or creates the account for an external profile.
    async fn resolve_account(
        &self,
        ctx: &RequestContext,
        profile: &ExternalProfile,
        now: OffsetDateTime,
    ) -> AuthResult<Account> {
        if let Some(account) = self.find_by_external_id(ctx, &profile.external_id).await? {
            return self.record_login(ctx, account, now).await;
        }

        let account = Account::from_profile(profile, now)?;
        match storage_call(ctx, "create_account", self.accounts.create(&account)).await {
            Ok(()) => {
                tracing::info!(account_id = %account.id, "Created account for new identity");
                Ok(account)
            }
            Err(AuthError::Storage(StorageError::DuplicateIdentity { field })) => {
                // Lost a race with a concurrent first login; use the winner.
                tracing::debug!(%field, "Account creation collided; re-reading");
                match self.find_by_external_id(ctx, &profile.external_id).await? {
                    Some(account) => self.record_login(ctx, account, now).await,
                    None => Err(AuthError::duplicate_identity(field)),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn find_by_external_id(
        &self,
        ctx: &RequestContext,
        external_id: &str,
    ) -> AuthResult<Option<Account>> {
        storage_call(
            ctx,
            "find_account",
            self.accounts.find_by_external_id(external_id),
        )
        .await
    }

    async fn record_login(
        &self,
        ctx: &RequestContext,
        mut account: Account,
        now: OffsetDateTime,
    ) -> AuthResult<Account> {
        account.record_login(now);
        storage_call(ctx, "update_account", self.accounts.update(&account)).await?;
        Ok(account)
    }

    /// Deactivates the oldest live sessions so that one more fits.
    ///
    /// A session is live while it can still be refreshed under the
    /// configured window; an access-expired session that may be refreshed
    /// counts against the quota.
    async fn enforce_session_quota(
        &self,
        ctx: &RequestContext,
        account_id: Uuid,
        now: OffsetDateTime,
    ) -> AuthResult<()> {
        let max = self.session_config.max_active_sessions;
        let window = self.session_config.refresh_window;

        let count = storage_call(
            ctx,
            "count_sessions",
            self.sessions.count_active_by_account(account_id, now, window),
        )
        .await?;
        if count < max as u64 {
            return Ok(());
        }

        let live: Vec<Session> = storage_call(
            ctx,
            "list_sessions",
            self.sessions.list_active_by_account(account_id),
        )
        .await?
        .into_iter()
        .filter(|session| session.is_refreshable_at(now, window))
        .collect();
        let evict = live.len().saturating_sub(max - 1);

        for mut session in live.into_iter().take(evict) {
            session.deactivate(now);
            storage_call(ctx, "evict_session", self.sessions.update(&session)).await?;
            tracing::debug!(session_id = %session.id, "Evicted session");
        }

        tracing::info!(
            account_id = %account_id,
            evicted = evict,
            max_active_sessions = max,
            "Session quota enforced"
        );

        Ok(())
    }
}

impl fmt::Debug for AuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("codec", &self.codec)
            .field("session_config", &self.session_config)
            .field("atomic_profile_updates", &self.atomic_profiles.is_some())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

/// Runs a storage call under `ctx`, folding both error layers into
/// [`AuthError`].
async fn storage_call<T, F>(ctx: &RequestContext, operation: &'static str, fut: F) -> AuthResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    Ok(ctx.run(operation, fut).await??)
}

fn account_not_found(err: AuthError) -> AuthError {
    match err {
        AuthError::Storage(StorageError::NotFound) => AuthError::AccountNotFound,
        other => other,
    }
}
