//! Conversation orchestrator: one call per inbound user message.
//!
//! Every turn runs inside the user's critical section from
//! [`SessionRepository::lock_user`]. Mutations are persisted before any
//! external call that can fail, and nothing is rolled back on error.

use crate::api_types::{Message, Role as ApiRole};
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts;
use anyhow::{Context, Result};
use coach_core::config::PersuasionConfig;
use coach_core::motivation::{classify_motivation, AGREES};
use coach_core::persuasion::{route, select_strategy, update_weights};
use coach_core::session::{Route, Strategy};
use coach_core::{ChatLog, ChatTurn, CoachError, Exercise, ExerciseCatalog, Role, Session};
use coach_memory::SessionRepository;
use serde::Serialize;
use std::sync::Arc;

/// Which branch of the state machine produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Opened,
    Confirmed,
    ExerciseSwitched,
    GaveUp,
    Persuaded,
    Apology,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub content: String,
    pub outcome: TurnOutcome,
    /// Opening message, when this turn created the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opening: Option<String>,
    pub exercise: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
}

impl TurnReply {
    fn new(content: impl Into<String>, outcome: TurnOutcome, exercise: Option<&str>) -> Self {
        Self {
            content: content.into(),
            outcome,
            opening: None,
            exercise: exercise.map(str::to_string),
            route: None,
            strategy: None,
        }
    }
}

pub struct Orchestrator {
    repository: Arc<SessionRepository>,
    chat_log: Arc<dyn ChatLog>,
    catalog: Arc<dyn ExerciseCatalog>,
    client: Box<dyn LlmClient>,
    params: CompletionParams,
    settings: PersuasionConfig,
}

impl Orchestrator {
    pub fn new(
        repository: Arc<SessionRepository>,
        chat_log: Arc<dyn ChatLog>,
        catalog: Arc<dyn ExerciseCatalog>,
        client: Box<dyn LlmClient>,
        settings: PersuasionConfig,
    ) -> Self {
        Self {
            repository,
            chat_log,
            catalog,
            client,
            params: CompletionParams::default(),
            settings,
        }
    }

    pub fn with_params(mut self, params: CompletionParams) -> Self {
        self.params = params;
        self
    }

    /// Explicit new-session request: replaces any existing session with a
    /// fresh one and returns the opening message.
    #[tracing::instrument(skip(self))]
    pub async fn start_session(&self, user_id: &str) -> Result<TurnReply> {
        let _guard = self.repository.lock_user(user_id).await;
        match self.open_session(user_id, true).await? {
            Some((session, opening)) => Ok(TurnReply::new(
                opening,
                TurnOutcome::Opened,
                Some(&session.current_exercise),
            )),
            None => self.apology(user_id).await,
        }
    }

    /// Ordered transcript for `user_id`.
    pub async fn history(&self, user_id: &str) -> Result<Vec<ChatTurn>> {
        self.chat_log.fetch_ordered(user_id).await
    }

    /// Current session snapshot, if any.
    pub async fn session(&self, user_id: &str) -> Result<Option<Session>> {
        self.repository.get(user_id).await
    }

    /// Process one user message and produce the coach's reply.
    #[tracing::instrument(skip(self, text))]
    pub async fn handle_message(&self, user_id: &str, text: &str) -> Result<TurnReply> {
        if user_id.trim().is_empty() {
            return Err(CoachError::Validation("user id must not be empty".into()).into());
        }
        if text.trim().is_empty() {
            return Err(CoachError::Validation("message must not be empty".into()).into());
        }

        let _guard = self.repository.lock_user(user_id).await;

        let mut opening = None;
        let mut session = match self.repository.get(user_id).await? {
            Some(session) => session,
            None => match self.open_session(user_id, false).await? {
                Some((session, message)) => {
                    opening = Some(message);
                    session
                }
                None => {
                    self.chat_log.append(user_id, Role::User, text).await?;
                    return self.apology(user_id).await;
                }
            },
        };

        self.chat_log.append(user_id, Role::User, text).await?;
        let motivation = classify_motivation(text);

        if session.awaiting_feedback {
            update_weights(&mut session, motivation == AGREES);
            session.awaiting_feedback = false;
            self.repository.save(&mut session).await?;
        }

        let mut reply = self.advance(&mut session, text, motivation).await?;
        reply.opening = opening;
        Ok(reply)
    }

    async fn advance(&self, session: &mut Session, text: &str, motivation: f64) -> Result<TurnReply> {
        let user_id = session.user_id.clone();

        if motivation == AGREES {
            tracing::info!(user = %user_id, exercise = %session.current_exercise, "User agreed");
            return self
                .reply(
                    &user_id,
                    TurnReply::new(
                        prompts::CONFIRMATION_REPLY,
                        TurnOutcome::Confirmed,
                        Some(&session.current_exercise),
                    ),
                )
                .await;
        }

        let first_decision = session.persuasion_attempt == 0;
        session.failed_persuasion_count += 1;
        session.persuasion_attempt += 1;
        self.repository.save(session).await?;

        let attempt = session.persuasion_attempt;
        if attempt == self.settings.switch_attempt {
            let exercise = self.draw_other_exercise(&session.current_exercise).await?;
            tracing::info!(
                user = %user_id,
                from = %session.current_exercise,
                to = %exercise.name,
                "Switching exercise"
            );
            session.switch_exercise(&exercise.name);
            self.repository.save(session).await?;
            return self
                .reply(
                    &user_id,
                    TurnReply::new(
                        prompts::switch_message(&exercise),
                        TurnOutcome::ExerciseSwitched,
                        Some(&exercise.name),
                    ),
                )
                .await;
        }

        if attempt >= self.settings.give_up_attempt {
            tracing::info!(user = %user_id, attempt, "Giving up on persuasion");
            return self
                .reply(
                    &user_id,
                    TurnReply::new(
                        prompts::GIVE_UP_REPLY,
                        TurnOutcome::GaveUp,
                        Some(&session.current_exercise),
                    ),
                )
                .await;
        }

        let chosen_route = route(session, motivation, first_decision);
        let strategy = select_strategy(session);
        let variant = session.advance_phrasing_variant();
        self.repository.save(session).await?;

        let prompt = prompts::persuasion_prompt(text, &session.current_exercise, strategy, variant);
        let transcript = self.chat_log.fetch_ordered(&user_id).await?;
        let content = self.complete(&transcript, &prompt).await?;

        session.awaiting_feedback = true;
        self.repository.save(session).await?;

        let mut reply = TurnReply::new(content, TurnOutcome::Persuaded, Some(&session.current_exercise));
        reply.route = Some(chosen_route);
        reply.strategy = Some(strategy);
        self.reply(&user_id, reply).await
    }

    /// Create (or, when `replace` is set, reset) the user's session around a
    /// random exercise and log the opening message.
    async fn open_session(&self, user_id: &str, replace: bool) -> Result<Option<(Session, String)>> {
        let exercise = self
            .catalog
            .fetch_random()
            .await
            .context("Failed to draw an opening exercise")?;
        let fresh = Session::new(user_id, &exercise.name, self.settings.initial_weight);

        let stored = if replace {
            self.repository.replace(fresh).await?
        } else {
            self.repository.create(fresh).await?
        };
        let Some(session) = stored else {
            tracing::warn!(user = %user_id, "Session missing right after creation");
            return Ok(None);
        };

        let opening = prompts::opening_message(&exercise);
        self.chat_log.append(user_id, Role::System, &opening).await?;
        tracing::info!(user = %user_id, exercise = %exercise.name, "Session opened");
        Ok(Some((session, opening)))
    }

    async fn draw_other_exercise(&self, current: &str) -> Result<Exercise> {
        for _ in 0..self.settings.max_exercise_redraws.max(1) {
            let candidate = self.catalog.fetch_random().await?;
            if candidate.name != current {
                return Ok(candidate);
            }
        }
        Err(CoachError::not_found("exercise", format!("other than {}", current)).into())
    }

    async fn complete(&self, transcript: &[ChatTurn], prompt: &str) -> Result<String> {
        // The coach's own opening lines are shown to the user, so they count
        // as assistant turns for the model.
        let mut messages: Vec<Message> = transcript
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::User => ApiRole::User,
                    Role::System | Role::Assistant => ApiRole::Assistant,
                };
                Message::text(role, turn.content.clone())
            })
            .collect();
        messages.push(Message::text(ApiRole::User, prompt));

        let response = self
            .client
            .complete(prompts::SYSTEM_PROMPT, messages, self.params.clone())
            .await
            .map_err(|e| CoachError::external("chat completion", e))?;
        Ok(prompts::sanitize_reply(&response.joined_text()))
    }

    async fn reply(&self, user_id: &str, reply: TurnReply) -> Result<TurnReply> {
        self.chat_log
            .append(user_id, Role::Assistant, &reply.content)
            .await?;
        Ok(reply)
    }

    async fn apology(&self, user_id: &str) -> Result<TurnReply> {
        self.reply(
            user_id,
            TurnReply::new(prompts::APOLOGY_REPLY, TurnOutcome::Apology, None),
        )
        .await
    }
}
