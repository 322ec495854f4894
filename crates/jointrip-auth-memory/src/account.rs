//! In-memory account registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jointrip_auth::account::{Account, ProfileUpdate};
use jointrip_auth::storage::{AccountStorage, AtomicProfileStorage, StorageError, StorageResult};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Account registry backed by a hash map.
///
/// The atomic profile-update capability is off by default so that callers
/// exercise the read-modify-write path; enable it with
/// [`InMemoryAccountStorage::with_atomic_profile_updates`].
#[derive(Debug, Default)]
pub struct InMemoryAccountStorage {
    accounts: RwLock<HashMap<Uuid, Account>>,
    atomic_profile_updates: bool,
}

impl InMemoryAccountStorage {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the atomic profile-update capability.
    #[must_use]
    pub fn with_atomic_profile_updates(mut self, enabled: bool) -> Self {
        self.atomic_profile_updates = enabled;
        self
    }

    /// Returns the number of stored accounts, in any state.
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    /// Returns `true` if no accounts are stored.
    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

/// Fails if another active account holds the external id or e-mail.
fn check_identity(accounts: &HashMap<Uuid, Account>, candidate: &Account) -> StorageResult<()> {
    if !candidate.active {
        return Ok(());
    }
    for other in accounts.values() {
        if other.id == candidate.id || !other.active {
            continue;
        }
        if other.external_id == candidate.external_id {
            return Err(StorageError::duplicate_identity("external_id"));
        }
        if other.email.eq_ignore_ascii_case(&candidate.email) {
            return Err(StorageError::duplicate_identity("email"));
        }
    }
    Ok(())
}

fn find_active<'a>(
    accounts: &'a HashMap<Uuid, Account>,
    predicate: impl Fn(&Account) -> bool,
) -> Option<&'a Account> {
    accounts.values().find(|a| a.active && predicate(a))
}

#[async_trait]
impl AccountStorage for InMemoryAccountStorage {
    async fn create(&self, account: &Account) -> StorageResult<()> {
        let mut accounts = self.accounts.write().await;

        if accounts.contains_key(&account.id) {
            return Err(StorageError::duplicate("id"));
        }
        check_identity(&accounts, account)?;

        accounts.insert(account.id, account.clone());
        tracing::trace!(account_id = %account.id, "Stored account");
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Account>> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> StorageResult<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(find_active(&accounts, |a| a.external_id == external_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StorageResult<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(find_active(&accounts, |a| a.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StorageResult<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn update(&self, account: &Account) -> StorageResult<()> {
        let mut accounts = self.accounts.write().await;

        if !accounts.contains_key(&account.id) {
            return Err(StorageError::NotFound);
        }
        check_identity(&accounts, account)?;

        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn deactivate(&self, id: Uuid, at: OffsetDateTime) -> StorageResult<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(StorageError::NotFound)?;
        account.deactivate(at);
        Ok(())
    }

    async fn list(&self, limit: usize, offset: usize) -> StorageResult<Vec<Account>> {
        let accounts = self.accounts.read().await;
        let mut all: Vec<&Account> = accounts.values().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all.into_iter().skip(offset).take(limit).cloned().collect())
    }

    async fn exists_by_email(&self, email: &str) -> StorageResult<bool> {
        let accounts = self.accounts.read().await;
        Ok(find_active(&accounts, |a| a.email.eq_ignore_ascii_case(email)).is_some())
    }

    async fn exists_by_username(&self, username: &str) -> StorageResult<bool> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().any(|a| a.username == username))
    }

    fn atomic_profile(self: Arc<Self>) -> Option<Arc<dyn AtomicProfileStorage>> {
        if self.atomic_profile_updates {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl AtomicProfileStorage for InMemoryAccountStorage {
    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
        at: OffsetDateTime,
    ) -> StorageResult<Account> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(StorageError::NotFound)?;
        update.apply(account, at);
        Ok(account.clone())
    }
}

#[cfg(test)]
mod tests {
    use jointrip_auth::account::ProfileField;
    use jointrip_auth::identity::ExternalProfile;
    use time::Duration;
    use tokio_test::assert_err;

    use super::*;

    fn account(external_id: &str, email: &str, now: OffsetDateTime) -> Account {
        let profile = ExternalProfile {
            external_id: external_id.to_string(),
            email: email.to_string(),
            email_verified: true,
            given_name: "Ada".to_string(),
            family_name: "Lovelace".to_string(),
            picture_url: None,
        };
        Account::from_profile(&profile, now).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = InMemoryAccountStorage::new();
        let now = OffsetDateTime::now_utc();
        let ada = account("g-1", "ada@example.com", now);
        store.create(&ada).await.unwrap();

        assert_eq!(store.find_by_id(ada.id).await.unwrap(), Some(ada.clone()));
        assert_eq!(
            store.find_by_external_id("g-1").await.unwrap().map(|a| a.id),
            Some(ada.id)
        );
        assert_eq!(
            store
                .find_by_email("ADA@example.com")
                .await
                .unwrap()
                .map(|a| a.id),
            Some(ada.id)
        );
        assert_eq!(
            store
                .find_by_username(&ada.username)
                .await
                .unwrap()
                .map(|a| a.id),
            Some(ada.id)
        );
        assert!(store.exists_by_email("ada@example.com").await.unwrap());
        assert!(store.exists_by_username(&ada.username).await.unwrap());
        assert!(!store.exists_by_username("nobody").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_identity_rejected() {
        let store = InMemoryAccountStorage::new();
        let now = OffsetDateTime::now_utc();
        store
            .create(&account("g-1", "ada@example.com", now))
            .await
            .unwrap();

        let err = assert_err!(store.create(&account("g-1", "other@example.com", now)).await);
        assert_eq!(err, StorageError::duplicate_identity("external_id"));

        let err = assert_err!(store.create(&account("g-2", "ada@example.com", now)).await);
        assert_eq!(err, StorageError::duplicate_identity("email"));
    }

    #[tokio::test]
    async fn test_deactivated_identity_can_be_reused() {
        let store = InMemoryAccountStorage::new();
        let now = OffsetDateTime::now_utc();
        let old = account("g-1", "ada@example.com", now);
        store.create(&old).await.unwrap();
        store.deactivate(old.id, now).await.unwrap();

        assert!(store.find_by_external_id("g-1").await.unwrap().is_none());
        assert!(!store.exists_by_email("ada@example.com").await.unwrap());
        assert!(!store.find_by_id(old.id).await.unwrap().unwrap().active);

        let new = account("g-1", "ada@example.com", now);
        store.create(&new).await.unwrap();
        assert_eq!(
            store.find_by_external_id("g-1").await.unwrap().map(|a| a.id),
            Some(new.id)
        );
    }

    #[tokio::test]
    async fn test_update() {
        let store = InMemoryAccountStorage::new();
        let now = OffsetDateTime::now_utc();
        let mut ada = account("g-1", "ada@example.com", now);

        assert_eq!(
            store.update(&ada).await.unwrap_err(),
            StorageError::NotFound
        );

        store.create(&ada).await.unwrap();
        ada.bio = "Analyst".to_string();
        store.update(&ada).await.unwrap();
        assert_eq!(store.find_by_id(ada.id).await.unwrap().unwrap().bio, "Analyst");

        let grace = account("g-2", "grace@example.com", now);
        store.create(&grace).await.unwrap();
        let mut stolen = grace.clone();
        stolen.email = "ada@example.com".to_string();
        assert_eq!(
            store.update(&stolen).await.unwrap_err(),
            StorageError::duplicate_identity("email")
        );
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let store = InMemoryAccountStorage::new();
        let now = OffsetDateTime::now_utc();
        let mut ids = Vec::new();
        for i in 0..5 {
            let a = account(
                &format!("g-{i}"),
                &format!("user{i}@example.com"),
                now + Duration::seconds(i),
            );
            ids.push(a.id);
            store.create(&a).await.unwrap();
        }

        let page: Vec<Uuid> = store
            .list(2, 1)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(page, vec![ids[1], ids[2]]);
        assert_eq!(store.list(10, 4).await.unwrap().len(), 1);
        assert_eq!(store.len().await, 5);
    }

    #[tokio::test]
    async fn test_atomic_capability_flag() {
        let plain = Arc::new(InMemoryAccountStorage::new());
        assert!(plain.atomic_profile().is_none());

        let atomic = Arc::new(InMemoryAccountStorage::new().with_atomic_profile_updates(true));
        assert!(atomic.atomic_profile().is_some());
    }

    #[tokio::test]
    async fn test_update_profile_atomically() {
        let store = InMemoryAccountStorage::new().with_atomic_profile_updates(true);
        let now = OffsetDateTime::now_utc();
        let ada = account("g-1", "ada@example.com", now);
        store.create(&ada).await.unwrap();

        let later = now + Duration::minutes(1);
        let update = ProfileUpdate::new().with(ProfileField::Location("London".to_string()));
        let updated = store.update_profile(ada.id, &update, later).await.unwrap();

        assert_eq!(updated.location, "London");
        assert_eq!(updated.updated_at, later);
        assert_eq!(store.find_by_id(ada.id).await.unwrap(), Some(updated));

        assert_eq!(
            store
                .update_profile(Uuid::new_v4(), &update, later)
                .await
                .unwrap_err(),
            StorageError::NotFound
        );
    }
}
