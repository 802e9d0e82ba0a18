use crate::sqlite::SqliteStore;
use crate::SessionRepository;
use coach_core::persuasion::{route, select_strategy, update_weights};
use coach_core::{ChatLog, CoachError, ExerciseCatalog, Role, Session, SessionStore};
use std::sync::Arc;

async fn memory_store() -> SqliteStore {
    SqliteStore::new(":memory:")
        .await
        .expect("Failed to create store")
}

#[tokio::test]
async fn test_session_roundtrip_after_weight_update() {
    let store = memory_store().await;
    let mut session = Session::new("alice", "Squats", 0.5);
    store.insert(&session).await.unwrap();

    // Drive a few decisions so every field moves away from its default.
    route(&mut session, 0.5, true);
    session.strategy_weights.central = vec![0.31, 0.72, 0.1, 0.55, 0.049];
    select_strategy(&mut session);
    session.advance_phrasing_variant();
    update_weights(&mut session, false);
    select_strategy(&mut session);
    update_weights(&mut session, true);
    session.persuasion_attempt = 2;
    session.failed_persuasion_count = 2;
    session.awaiting_feedback = true;
    store.update("alice", &session).await.unwrap();

    let loaded = store.fetch_by_user_id("alice").await.unwrap().unwrap();
    assert_eq!(loaded.y_c, session.y_c);
    assert_eq!(loaded.y_p, session.y_p);
    assert_eq!(loaded.strategy_weights, session.strategy_weights);
    assert_eq!(loaded.selected_strategies, session.selected_strategies);
    assert_eq!(loaded.strategy_index_chosen, session.strategy_index_chosen);
    assert_eq!(loaded.specific_strategy_index, session.specific_strategy_index);
    assert_eq!(loaded, session);
}

#[tokio::test]
async fn test_fetch_missing_session() {
    let store = memory_store().await;
    assert!(store.fetch_by_user_id("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn test_corrupt_counters_are_rejected() {
    let store = memory_store().await;
    store
        .insert(&Session::new("mallory", "Squats", 0.5))
        .await
        .unwrap();
    sqlx::query("UPDATE sessions SET persuasion_attempt = -1 WHERE user_id = ?")
        .bind("mallory")
        .execute(store.pool())
        .await
        .unwrap();

    let err = store.fetch_by_user_id("mallory").await.unwrap_err();
    assert!(format!("{:#}", err).contains("persuasion_attempt out of range"));

    sqlx::query(
        "UPDATE sessions SET persuasion_attempt = 0, specific_strategy_index = 300 \
         WHERE user_id = ?",
    )
    .bind("mallory")
    .execute(store.pool())
    .await
    .unwrap();
    let err = store.fetch_by_user_id("mallory").await.unwrap_err();
    assert!(format!("{:#}", err).contains("specific_strategy_index out of range"));
}

#[tokio::test]
async fn test_update_missing_session_is_not_found() {
    let store = memory_store().await;
    let err = store
        .update("ghost", &Session::new("ghost", "Plank", 0.5))
        .await
        .unwrap_err();
    assert!(matches!(
        CoachError::find(&err),
        Some(CoachError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_duplicate_insert_fails() {
    let store = memory_store().await;
    let s = Session::new("bob", "Plank", 0.5);
    store.insert(&s).await.unwrap();
    assert!(store.insert(&s).await.is_err());
}

#[tokio::test]
async fn test_chat_history_ordered_per_user() {
    let store = memory_store().await;
    store.append("alice", Role::System, "Try squats today?").await.unwrap();
    store.append("bob", Role::User, "hello").await.unwrap();
    store.append("alice", Role::User, "what for?").await.unwrap();
    store.append("alice", Role::Assistant, "Strong legs!").await.unwrap();

    let turns = store.fetch_ordered("alice").await.unwrap();
    let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    assert_eq!(turns[1].content, "what for?");
    assert!(turns.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    assert_eq!(store.fetch_ordered("bob").await.unwrap().len(), 1);
    assert!(store.fetch_ordered("carol").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_catalog_seeded_and_lookup() {
    let store = memory_store().await;
    assert!(store.count_exercises().await.unwrap() > 1);

    let random = store.fetch_random().await.unwrap();
    let by_id = store.fetch_by_id(random.id).await.unwrap();
    assert_eq!(random, by_id);

    let err = store.fetch_by_id(9999).await.unwrap_err();
    assert!(matches!(
        CoachError::find(&err),
        Some(CoachError::NotFound { what: "exercise", .. })
    ));
}

#[tokio::test]
async fn test_add_exercise_upserts_by_name() {
    let store = memory_store().await;
    let before = store.count_exercises().await.unwrap();
    let id = store.add_exercise("Jump Rope", "Five minutes of skipping.").await.unwrap();
    let again = store.add_exercise("Jump Rope", "Ten minutes.").await.unwrap();
    assert_eq!(id, again);
    assert_eq!(store.count_exercises().await.unwrap(), before + 1);
    assert_eq!(store.fetch_by_id(id).await.unwrap().description, "Ten minutes.");
}

#[tokio::test]
async fn test_file_backed_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coach.db");

    {
        let store = SqliteStore::new(&path).await.unwrap();
        let repo = SessionRepository::new(Arc::new(store) as Arc<dyn SessionStore>);
        let mut s = repo
            .create(Session::new("alice", "Plank", 0.5))
            .await
            .unwrap()
            .unwrap();
        s.persuasion_attempt = 4;
        repo.save(&mut s).await.unwrap();
    }

    let store = SqliteStore::new(&path).await.unwrap();
    let loaded = store.fetch_by_user_id("alice").await.unwrap().unwrap();
    assert_eq!(loaded.persuasion_attempt, 4);
    assert_eq!(loaded.current_exercise, "Plank");
}
