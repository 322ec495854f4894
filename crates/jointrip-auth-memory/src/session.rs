//! In-memory session store.

use std::collections::HashMap;

use async_trait::async_trait;
use jointrip_auth::config::RefreshWindow;
use jointrip_auth::session::Session;
use jointrip_auth::storage::{SessionStorage, StorageError, StorageResult};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct SessionTables {
    sessions: HashMap<Uuid, Session>,
    by_access_token: HashMap<String, Uuid>,
    by_refresh_token: HashMap<String, Uuid>,
}

impl SessionTables {
    fn lookup(&self, index: &HashMap<String, Uuid>, token: &str) -> Option<Session> {
        index
            .get(token)
            .and_then(|id| self.sessions.get(id))
            .cloned()
    }

    /// Fails if `token` is indexed for a session other than `owner`.
    fn check_unique(
        index: &HashMap<String, Uuid>,
        token: &str,
        owner: Uuid,
        field: &str,
    ) -> StorageResult<()> {
        match index.get(token) {
            Some(existing) if *existing != owner => Err(StorageError::duplicate(field)),
            _ => Ok(()),
        }
    }

    fn unindex(&mut self, session: &Session) {
        self.by_access_token.remove(&session.access_token);
        self.by_refresh_token.remove(&session.refresh_token);
    }

    fn index(&mut self, session: &Session) {
        self.by_access_token
            .insert(session.access_token.clone(), session.id);
        self.by_refresh_token
            .insert(session.refresh_token.clone(), session.id);
    }

    fn remove(&mut self, id: Uuid) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        self.unindex(&session);
        Some(session)
    }
}

/// Session store backed by hash maps, with token indexes.
#[derive(Debug, Default)]
pub struct InMemorySessionStorage {
    tables: RwLock<SessionTables>,
}

impl InMemorySessionStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions, in any state.
    pub async fn len(&self) -> usize {
        self.tables.read().await.sessions.len()
    }

    /// Returns `true` if no sessions are stored.
    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn create(&self, session: &Session) -> StorageResult<()> {
        let mut tables = self.tables.write().await;

        if tables.sessions.contains_key(&session.id) {
            return Err(StorageError::duplicate("id"));
        }
        if tables.by_access_token.contains_key(&session.access_token) {
            return Err(StorageError::duplicate("access_token"));
        }
        if tables.by_refresh_token.contains_key(&session.refresh_token) {
            return Err(StorageError::duplicate("refresh_token"));
        }

        tables.index(session);
        tables.sessions.insert(session.id, session.clone());

        tracing::trace!(session_id = %session.id, "Stored session");
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn find_by_access_token(&self, token: &str) -> StorageResult<Option<Session>> {
        let tables = self.tables.read().await;
        Ok(tables.lookup(&tables.by_access_token, token))
    }

    async fn find_by_refresh_token(&self, token: &str) -> StorageResult<Option<Session>> {
        let tables = self.tables.read().await;
        Ok(tables.lookup(&tables.by_refresh_token, token))
    }

    async fn list_active_by_account(&self, account_id: Uuid) -> StorageResult<Vec<Session>> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<Session> = tables
            .sessions
            .values()
            .filter(|s| s.account_id == account_id && s.active)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(sessions)
    }

    async fn update(&self, session: &Session) -> StorageResult<u64> {
        let mut tables = self.tables.write().await;

        let stored = tables
            .sessions
            .get(&session.id)
            .ok_or(StorageError::NotFound)?;
        if stored.version != session.version {
            return Err(StorageError::Conflict {
                expected: session.version,
                actual: stored.version,
            });
        }

        SessionTables::check_unique(
            &tables.by_access_token,
            &session.access_token,
            session.id,
            "access_token",
        )?;
        SessionTables::check_unique(
            &tables.by_refresh_token,
            &session.refresh_token,
            session.id,
            "refresh_token",
        )?;

        let previous = tables.remove(session.id).ok_or(StorageError::NotFound)?;
        let mut updated = session.clone();
        updated.version = previous.version + 1;
        tables.index(&updated);
        tables.sessions.insert(updated.id, updated.clone());

        Ok(updated.version)
    }

    async fn touch(&self, id: Uuid, at: OffsetDateTime) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        let session = tables.sessions.get_mut(&id).ok_or(StorageError::NotFound)?;
        session.touch(at);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StorageResult<()> {
        self.tables.write().await.remove(id);
        Ok(())
    }

    async fn delete_by_account(&self, account_id: Uuid) -> StorageResult<u64> {
        let mut tables = self.tables.write().await;
        let ids: Vec<Uuid> = tables
            .sessions
            .values()
            .filter(|s| s.account_id == account_id)
            .map(|s| s.id)
            .collect();

        for id in &ids {
            tables.remove(*id);
        }

        Ok(ids.len() as u64)
    }

    async fn count_active_by_account(
        &self,
        account_id: Uuid,
        now: OffsetDateTime,
        window: RefreshWindow,
    ) -> StorageResult<u64> {
        let tables = self.tables.read().await;
        let count = tables
            .sessions
            .values()
            .filter(|s| s.account_id == account_id && s.is_refreshable_at(now, window))
            .count();
        Ok(count as u64)
    }

    async fn deactivate_expired(
        &self,
        now: OffsetDateTime,
        window: RefreshWindow,
    ) -> StorageResult<u64> {
        let mut tables = self.tables.write().await;
        let mut count = 0;

        for session in tables.sessions.values_mut() {
            if session.active && !session.is_refreshable_at(now, window) {
                session.deactivate(now);
                session.version += 1;
                count += 1;
            }
        }

        Ok(count)
    }
}
