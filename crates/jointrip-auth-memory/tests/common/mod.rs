//! Shared fixtures for orchestrator tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jointrip_auth::account::Account;
use jointrip_auth::config::AuthConfig;
use jointrip_auth::identity::{ExternalProfile, ExternalTokens, IdentityError, IdentityExchange};
use jointrip_auth::service::AuthService;
use jointrip_auth::storage::{AccountStorage, StorageResult};
use jointrip_auth_memory::{InMemoryAccountStorage, InMemorySessionStorage};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

pub const SECRET: &str = "integration-test-secret";

/// Identity provider that maps authorization codes to canned profiles.
#[derive(Default)]
pub struct StubIdentityExchange {
    profiles: Mutex<HashMap<String, ExternalProfile>>,
    fail_profile_fetch: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl StubIdentityExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `code` resolve to `profile`.
    pub fn register(&self, code: &str, profile: ExternalProfile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(code.to_string(), profile);
    }

    pub fn fail_profile_fetch(&self, fail: bool) {
        self.fail_profile_fetch.store(fail, Ordering::SeqCst);
    }

    /// Delays every code exchange.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl IdentityExchange for StubIdentityExchange {
    fn authorization_url(&self, state: &str) -> Result<Url, IdentityError> {
        let mut url = Url::parse("https://idp.example/authorize")
            .map_err(|e| IdentityError::configuration(e.to_string()))?;
        url.query_pairs_mut().append_pair("state", state);
        Ok(url)
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalTokens, IdentityError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if !self.profiles.lock().unwrap().contains_key(code) {
            return Err(IdentityError::exchange_failed("invalid_grant"));
        }
        Ok(ExternalTokens {
            access_token: format!("provider-{code}"),
            refresh_token: Some(format!("provider-refresh-{code}")),
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, IdentityError> {
        if self.fail_profile_fetch.load(Ordering::SeqCst) {
            return Err(IdentityError::profile_fetch_failed("HTTP 401"));
        }
        let code = access_token
            .strip_prefix("provider-")
            .ok_or_else(|| IdentityError::profile_fetch_failed("unknown token"))?;
        self.profiles
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or_else(|| IdentityError::profile_fetch_failed("unknown token"))
    }
}

/// Account registry whose first external-id lookup misses, as if a
/// concurrent login created the account in between.
pub struct RacingAccountStorage {
    inner: InMemoryAccountStorage,
    missed: AtomicBool,
}

impl RacingAccountStorage {
    pub fn new(inner: InMemoryAccountStorage) -> Self {
        Self {
            inner,
            missed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl AccountStorage for RacingAccountStorage {
    async fn create(&self, account: &Account) -> StorageResult<()> {
        self.inner.create(account).await
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Account>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> StorageResult<Option<Account>> {
        if !self.missed.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_by_external_id(external_id).await
    }

    async fn find_by_email(&self, email: &str) -> StorageResult<Option<Account>> {
        self.inner.find_by_email(email).await
    }

    async fn find_by_username(&self, username: &str) -> StorageResult<Option<Account>> {
        self.inner.find_by_username(username).await
    }

    async fn update(&self, account: &Account) -> StorageResult<()> {
        self.inner.update(account).await
    }

    async fn deactivate(&self, id: Uuid, at: OffsetDateTime) -> StorageResult<()> {
        self.inner.deactivate(id, at).await
    }

    async fn list(&self, limit: usize, offset: usize) -> StorageResult<Vec<Account>> {
        self.inner.list(limit, offset).await
    }

    async fn exists_by_email(&self, email: &str) -> StorageResult<bool> {
        self.inner.exists_by_email(email).await
    }

    async fn exists_by_username(&self, username: &str) -> StorageResult<bool> {
        self.inner.exists_by_username(username).await
    }
}

pub fn config(max_active_sessions: usize) -> AuthConfig {
    let mut config = AuthConfig::default();
    config.tokens.secret = SECRET.to_string();
    config.sessions.max_active_sessions = max_active_sessions;
    config
}

pub fn profile(external_id: &str, email: &str) -> ExternalProfile {
    ExternalProfile {
        external_id: external_id.to_string(),
        email: email.to_string(),
        email_verified: true,
        given_name: "Ada".to_string(),
        family_name: "Lovelace".to_string(),
        picture_url: Some("https://photos.example/ada.jpg".to_string()),
    }
}

pub struct Harness {
    pub service: AuthService,
    pub sessions: Arc<InMemorySessionStorage>,
    pub accounts: Arc<InMemoryAccountStorage>,
    pub identity: Arc<StubIdentityExchange>,
}

impl Harness {
    pub fn new(config: AuthConfig) -> Self {
        Self::build(config, false)
    }

    pub fn with_atomic_profiles(config: AuthConfig) -> Self {
        Self::build(config, true)
    }

    fn build(config: AuthConfig, atomic: bool) -> Self {
        let sessions = Arc::new(InMemorySessionStorage::new());
        let accounts =
            Arc::new(InMemoryAccountStorage::new().with_atomic_profile_updates(atomic));
        let identity = Arc::new(StubIdentityExchange::new());

        let service = AuthService::builder(config)
            .with_session_storage(sessions.clone())
            .with_account_storage(accounts.clone())
            .with_identity_exchange(identity.clone())
            .build()
            .unwrap();

        Self {
            service,
            sessions,
            accounts,
            identity,
        }
    }
}
