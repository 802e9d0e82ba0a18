//! Process-local implementation of the storage traits.
//!
//! Backs `--ephemeral` runs and tests. Nothing survives a restart.

use anyhow::Result;
use async_trait::async_trait;
use coach_core::{ChatLog, ChatTurn, CoachError, Exercise, ExerciseCatalog, Role, Session, SessionStore};
use rand::seq::IndexedRandom;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

pub struct InMemoryStore {
    sessions: RwLock<HashMap<String, Session>>,
    history: RwLock<Vec<ChatTurn>>,
    exercises: RwLock<Vec<Exercise>>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_exercises(vec![
            exercise(1, "Brisk Walk", "A 20 minute walk."),
            exercise(2, "Squats", "Three sets of ten bodyweight squats."),
            exercise(3, "Plank", "Hold a forearm plank for 30 seconds."),
            exercise(4, "Stretching", "A 10 minute stretching routine."),
        ])
    }

    pub fn with_exercises(exercises: Vec<Exercise>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
            exercises: RwLock::new(exercises),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent session write fail, to exercise error paths.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoachError::external(
                "memory",
                anyhow::anyhow!("writes disabled"),
            )
            .into());
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn exercise(id: i64, name: &str, description: &str) -> Exercise {
    Exercise {
        id,
        name: name.to_string(),
        description: description.to_string(),
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn insert(&self, session: &Session) -> Result<()> {
        self.check_writable()?;
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.user_id) {
            anyhow::bail!("session for {} already exists", session.user_id);
        }
        sessions.insert(session.user_id.clone(), session.clone());
        Ok(())
    }

    async fn fetch_by_user_id(&self, user_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(user_id).cloned())
    }

    async fn update(&self, user_id: &str, session: &Session) -> Result<()> {
        self.check_writable()?;
        match self.sessions.write().await.get_mut(user_id) {
            Some(slot) => {
                *slot = session.clone();
                Ok(())
            }
            None => Err(CoachError::not_found("session", user_id).into()),
        }
    }
}

#[async_trait]
impl ChatLog for InMemoryStore {
    async fn append(&self, user_id: &str, role: Role, content: &str) -> Result<()> {
        self.history.write().await.push(ChatTurn {
            user_id: user_id.to_string(),
            role,
            content: content.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        });
        Ok(())
    }

    async fn fetch_ordered(&self, user_id: &str) -> Result<Vec<ChatTurn>> {
        let mut turns: Vec<ChatTurn> = self
            .history
            .read()
            .await
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        turns.sort_by_key(|t| t.timestamp);
        Ok(turns)
    }
}

#[async_trait]
impl ExerciseCatalog for InMemoryStore {
    async fn fetch_random(&self) -> Result<Exercise> {
        let exercises = self.exercises.read().await;
        let pick = {
            let mut rng = rand::rng();
            exercises.choose(&mut rng).cloned()
        };
        pick.ok_or_else(|| CoachError::not_found("exercise", "random").into())
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Exercise> {
        self.exercises
            .read()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| CoachError::not_found("exercise", id).into())
    }
}
