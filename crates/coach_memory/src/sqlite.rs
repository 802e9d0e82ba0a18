use anyhow::{Context, Result};
use async_trait::async_trait;
use coach_core::session::RouteTable;
use coach_core::{ChatLog, ChatTurn, CoachError, Exercise, ExerciseCatalog, Role, Session, SessionStore};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;

/// Exercises seeded into an empty catalog.
const DEFAULT_EXERCISES: &[(&str, &str)] = &[
    ("Brisk Walk", "A 20 minute walk at a pace that makes talking slightly harder."),
    ("Squats", "Three sets of ten bodyweight squats, feet shoulder-width apart."),
    ("Plank", "Hold a forearm plank for 30 seconds, three times."),
    ("Stair Climbing", "Walk up and down a flight of stairs for 10 minutes."),
    ("Wall Push-ups", "Two sets of twelve push-ups against a wall."),
    ("Stretching", "A 10 minute full-body stretching routine."),
    ("Cycling", "A 30 minute easy bike ride, outdoors or stationary."),
];

fn store_err(e: sqlx::Error) -> CoachError {
    CoachError::external("sqlite", e.into())
}

/// SQLite-backed session store, chat-history log and exercise catalog.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref().display().to_string();
        let in_memory = path == ":memory:";
        let db_url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}?mode=rwc", path)
        };

        // An in-memory database lives and dies with its connection, so the
        // pool must hold exactly one that never expires.
        let mut options = SqlitePoolOptions::new();
        if in_memory {
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options
            .connect(&db_url)
            .await
            .map_err(store_err)
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;
        store.seed_exercises().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                user_id TEXT PRIMARY KEY,
                y_c REAL NOT NULL,
                y_p REAL NOT NULL,
                strategy_weights TEXT NOT NULL,
                selected_strategies TEXT NOT NULL,
                strategy_index_chosen INTEGER,
                specific_strategy_index INTEGER NOT NULL,
                persuasion_attempt INTEGER NOT NULL,
                failed_persuasion_count INTEGER NOT NULL,
                current_exercise TEXT NOT NULL,
                awaiting_feedback INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create sessions table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create chat_history table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_history_user_ts ON chat_history(user_id, timestamp)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create chat_history index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS exercises (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create exercises table")?;

        Ok(())
    }

    async fn seed_exercises(&self) -> Result<()> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM exercises")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count exercises")?
            .get("n");
        if count > 0 {
            return Ok(());
        }
        for (name, description) in DEFAULT_EXERCISES {
            self.add_exercise(name, description).await?;
        }
        tracing::info!("Seeded {} default exercises", DEFAULT_EXERCISES.len());
        Ok(())
    }

    /// Add an exercise to the catalog, or update its description if the
    /// name already exists. Returns the exercise id.
    pub async fn add_exercise(&self, name: &str, description: &str) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO exercises (name, description) VALUES (?, ?) \
             ON CONFLICT(name) DO UPDATE SET description = excluded.description \
             RETURNING id",
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)
        .with_context(|| format!("Failed to add exercise '{}'", name))?;
        Ok(row.get("id"))
    }

    pub async fn count_exercises(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM exercises")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)
            .context("Failed to count exercises")?;
        Ok(row.get("n"))
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session> {
        let weights: String = row.get("strategy_weights");
        let flags: String = row.get("selected_strategies");
        let strategy_weights: RouteTable<f64> =
            serde_json::from_str(&weights).context("Failed to deserialize strategy weights")?;
        let selected_strategies: RouteTable<u8> =
            serde_json::from_str(&flags).context("Failed to deserialize strategy flags")?;
        let chosen: Option<i64> = row.get("strategy_index_chosen");
        let specific: i64 = row.get("specific_strategy_index");
        let attempt: i64 = row.get("persuasion_attempt");
        let failed: i64 = row.get("failed_persuasion_count");
        let awaiting: i64 = row.get("awaiting_feedback");

        let strategy_index_chosen = chosen
            .map(usize::try_from)
            .transpose()
            .context("strategy_index_chosen out of range")?;
        let specific_strategy_index =
            u8::try_from(specific).context("specific_strategy_index out of range")?;
        let persuasion_attempt =
            u32::try_from(attempt).context("persuasion_attempt out of range")?;
        let failed_persuasion_count =
            u32::try_from(failed).context("failed_persuasion_count out of range")?;

        Ok(Session {
            user_id: row.get("user_id"),
            y_c: row.get("y_c"),
            y_p: row.get("y_p"),
            strategy_weights,
            selected_strategies,
            strategy_index_chosen,
            specific_strategy_index,
            persuasion_attempt,
            failed_persuasion_count,
            current_exercise: row.get("current_exercise"),
            awaiting_feedback: awaiting != 0,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn row_to_exercise(row: &sqlx::sqlite::SqliteRow) -> Exercise {
        Exercise {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
        }
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn insert(&self, session: &Session) -> Result<()> {
        let weights = serde_json::to_string(&session.strategy_weights)
            .context("Failed to serialize strategy weights")?;
        let flags = serde_json::to_string(&session.selected_strategies)
            .context("Failed to serialize strategy flags")?;

        sqlx::query(
            "INSERT INTO sessions (user_id, y_c, y_p, strategy_weights, selected_strategies, \
             strategy_index_chosen, specific_strategy_index, persuasion_attempt, \
             failed_persuasion_count, current_exercise, awaiting_feedback, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.user_id)
        .bind(session.y_c)
        .bind(session.y_p)
        .bind(&weights)
        .bind(&flags)
        .bind(session.strategy_index_chosen.map(|i| i as i64))
        .bind(i64::from(session.specific_strategy_index))
        .bind(i64::from(session.persuasion_attempt))
        .bind(i64::from(session.failed_persuasion_count))
        .bind(&session.current_exercise)
        .bind(i64::from(session.awaiting_feedback))
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)
        .with_context(|| format!("Failed to insert session for {}", session.user_id))?;

        tracing::debug!(user = %session.user_id, "Session inserted");
        Ok(())
    }

    async fn fetch_by_user_id(&self, user_id: &str) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)
            .context("Failed to query sessions")?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn update(&self, user_id: &str, session: &Session) -> Result<()> {
        let weights = serde_json::to_string(&session.strategy_weights)
            .context("Failed to serialize strategy weights")?;
        let flags = serde_json::to_string(&session.selected_strategies)
            .context("Failed to serialize strategy flags")?;

        let result = sqlx::query(
            "UPDATE sessions SET y_c = ?, y_p = ?, strategy_weights = ?, selected_strategies = ?, \
             strategy_index_chosen = ?, specific_strategy_index = ?, persuasion_attempt = ?, \
             failed_persuasion_count = ?, current_exercise = ?, awaiting_feedback = ?, \
             created_at = ?, updated_at = ? \
             WHERE user_id = ?",
        )
        .bind(session.y_c)
        .bind(session.y_p)
        .bind(&weights)
        .bind(&flags)
        .bind(session.strategy_index_chosen.map(|i| i as i64))
        .bind(i64::from(session.specific_strategy_index))
        .bind(i64::from(session.persuasion_attempt))
        .bind(i64::from(session.failed_persuasion_count))
        .bind(&session.current_exercise)
        .bind(i64::from(session.awaiting_feedback))
        .bind(session.created_at)
        .bind(session.updated_at)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)
        .with_context(|| format!("Failed to update session for {}", user_id))?;

        if result.rows_affected() == 0 {
            return Err(CoachError::not_found("session", user_id).into());
        }
        tracing::trace!(user = %user_id, "Session updated");
        Ok(())
    }
}

#[async_trait]
impl ChatLog for SqliteStore {
    async fn append(&self, user_id: &str, role: Role, content: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query("INSERT INTO chat_history (user_id, role, content, timestamp) VALUES (?, ?, ?, ?)")
            .bind(user_id)
            .bind(role.as_str())
            .bind(content)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(store_err)
            .context("Failed to append chat turn")?;
        Ok(())
    }

    async fn fetch_ordered(&self, user_id: &str) -> Result<Vec<ChatTurn>> {
        let rows = sqlx::query(
            "SELECT user_id, role, content, timestamp FROM chat_history \
             WHERE user_id = ? ORDER BY timestamp ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)
        .context("Failed to query chat history")?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in rows {
            let role: String = row.get("role");
            turns.push(ChatTurn {
                user_id: row.get("user_id"),
                role: role.parse()?,
                content: row.get("content"),
                timestamp: row.get("timestamp"),
            });
        }
        Ok(turns)
    }
}

#[async_trait]
impl ExerciseCatalog for SqliteStore {
    async fn fetch_random(&self) -> Result<Exercise> {
        let row = sqlx::query("SELECT id, name, description FROM exercises ORDER BY RANDOM() LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)
            .context("Failed to draw a random exercise")?;

        match row {
            Some(row) => Ok(Self::row_to_exercise(&row)),
            None => Err(CoachError::not_found("exercise", "random").into()),
        }
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Exercise> {
        let row = sqlx::query("SELECT id, name, description FROM exercises WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)
            .context("Failed to query exercise")?;

        match row {
            Some(row) => Ok(Self::row_to_exercise(&row)),
            None => Err(CoachError::not_found("exercise", id).into()),
        }
    }
}
