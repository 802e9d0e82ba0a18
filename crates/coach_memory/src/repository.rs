//! Session repository: an in-process cache over an injected `SessionStore`,
//! with one async lock per user id.
//!
//! Callers hold the guard from [`SessionRepository::lock_user`] for a whole
//! turn, so concurrent messages from the same user run one after another.
//! Different users never contend.

use anyhow::Result;
use coach_core::{Session, SessionStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

pub struct SessionRepository {
    store: Arc<dyn SessionStore>,
    cache: RwLock<HashMap<String, Session>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the per-user critical section.
    ///
    /// Entries nobody holds or waits on are pruned here, so the lock table
    /// only grows with concurrently active users.
    pub async fn lock_user(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|id, lock| id == user_id || Arc::strong_count(lock) > 1);
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Cached session, falling back to the store and re-caching on a hit.
    pub async fn get(&self, user_id: &str) -> Result<Option<Session>> {
        if let Some(session) = self.cache.read().await.get(user_id) {
            return Ok(Some(session.clone()));
        }

        let fetched = self.store.fetch_by_user_id(user_id).await?;
        if let Some(ref session) = fetched {
            tracing::debug!(user = %user_id, "Session re-cached from store");
            self.cache
                .write()
                .await
                .insert(user_id.to_string(), session.clone());
        }
        Ok(fetched)
    }

    /// Insert a new session and read it back from the store.
    ///
    /// Returns `None` if the store does not hand the row back, which the
    /// orchestrator reports to the user as an apology.
    pub async fn create(&self, session: Session) -> Result<Option<Session>> {
        let user_id = session.user_id.clone();
        self.store.insert(&session).await?;
        self.cache.write().await.remove(&user_id);
        self.get(&user_id).await
    }

    /// Replace whatever session exists for the user with `session`.
    pub async fn replace(&self, session: Session) -> Result<Option<Session>> {
        let user_id = session.user_id.clone();
        if self.store.fetch_by_user_id(&user_id).await?.is_some() {
            self.store.update(&user_id, &session).await?;
            self.cache.write().await.remove(&user_id);
            self.get(&user_id).await
        } else {
            self.create(session).await
        }
    }

    /// Persist a full snapshot.
    ///
    /// The cache is written first: if the store write fails the in-process
    /// state keeps the mutation and the error propagates.
    pub async fn save(&self, session: &mut Session) -> Result<()> {
        session.touch();
        self.cache
            .write()
            .await
            .insert(session.user_id.clone(), session.clone());
        self.store.update(&session.user_id, session).await
    }

    /// Number of per-user lock entries currently tracked.
    pub async fn tracked_locks(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Drop a cached entry; the next `get` reloads from the store.
    pub async fn evict(&self, user_id: &str) {
        self.cache.write().await.remove(user_id);
    }
}
