pub mod config;
pub mod error;
pub mod motivation;
pub mod persuasion;
pub mod session;

pub use config::CoachConfig;
pub use error::CoachError;
pub use motivation::classify_motivation;
pub use session::{ChatTurn, Exercise, Role, Route, Session};

use async_trait::async_trait;

/// Durable storage for persuasion sessions, one row per user.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &Session) -> anyhow::Result<()>;
    async fn fetch_by_user_id(&self, user_id: &str) -> anyhow::Result<Option<Session>>;
    /// Overwrite the stored snapshot for `user_id`.
    async fn update(&self, user_id: &str, session: &Session) -> anyhow::Result<()>;
}

/// Append-only transcript of every turn exchanged with a user.
#[async_trait]
pub trait ChatLog: Send + Sync {
    async fn append(&self, user_id: &str, role: Role, content: &str) -> anyhow::Result<()>;
    /// All turns for `user_id`, oldest first.
    async fn fetch_ordered(&self, user_id: &str) -> anyhow::Result<Vec<ChatTurn>>;
}

#[async_trait]
pub trait ExerciseCatalog: Send + Sync {
    async fn fetch_random(&self) -> anyhow::Result<Exercise>;
    async fn fetch_by_id(&self, id: i64) -> anyhow::Result<Exercise>;
}
