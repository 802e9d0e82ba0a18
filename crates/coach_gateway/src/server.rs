use crate::types::{ErrorBody, GatewayResponse, HistoryResponse, MessageRequest, SessionRequest};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use coach_core::CoachError;
use coach_reasoning::Orchestrator;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

/// Shared state for the gateway server.
#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
}

/// The gateway HTTP server.
///
/// - `POST /message`: one coach turn
/// - `POST /session`: start (or restart) a session
/// - `GET /history/:user_id`: ordered transcript
/// - `GET /health`: health check
pub struct GatewayServer {
    orchestrator: Arc<Orchestrator>,
    host: String,
    port: u16,
}

impl GatewayServer {
    pub fn new(orchestrator: Arc<Orchestrator>, host: &str, port: u16) -> Self {
        Self {
            orchestrator,
            host: host.to_string(),
            port,
        }
    }

    fn router(&self) -> Router {
        router(self.orchestrator.clone())
    }

    /// Start the server. This spawns a background task and returns the join handle.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        let app = self.router();
        let addr = format!("{}:{}", self.host, self.port);

        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(&addr).await {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!("Gateway failed to bind {}: {}", addr, e);
                    return;
                }
            };
            tracing::info!("Gateway listening on {}", addr);
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Gateway server error: {}", e);
            }
        })
    }
}

fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/message", post(handle_message))
        .route("/session", post(start_session))
        .route("/history/:user_id", get(history))
        .layer(CorsLayer::permissive())
        .with_state(AppState { orchestrator })
}

// ============================================================================
// Errors
// ============================================================================

/// Handler error: maps the coach error taxonomy onto HTTP status codes.
struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match CoachError::find(&self.0) {
            Some(CoachError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Some(CoachError::Validation(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Gateway request failed: {:#}", self.0);
        } else {
            tracing::debug!("Gateway request rejected ({}): {:#}", status, self.0);
        }
        let body = ErrorBody {
            error: format!("{:#}", self.0),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Route handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

/// POST /message
async fn handle_message(
    State(state): State<AppState>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<GatewayResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    tracing::debug!(%request_id, user = %req.user_id, "Gateway message");
    let reply = state
        .orchestrator
        .handle_message(&req.user_id, &req.message)
        .await?;
    Ok(Json(GatewayResponse::new(request_id, reply)))
}

/// POST /session
async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Result<Json<GatewayResponse>, ApiError> {
    if req.user_id.trim().is_empty() {
        return Err(ApiError(
            CoachError::Validation("user id must not be empty".into()).into(),
        ));
    }
    let request_id = Uuid::new_v4();
    let reply = state.orchestrator.start_session(&req.user_id).await?;
    Ok(Json(GatewayResponse::new(request_id, reply)))
}

/// GET /history/:user_id
async fn history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let turns = state.orchestrator.history(&user_id).await?;
    Ok(Json(HistoryResponse { user_id, turns }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::config::PersuasionConfig;
    use coach_core::{ChatLog, ExerciseCatalog, SessionStore};
    use coach_memory::{InMemoryStore, SessionRepository};
    use coach_reasoning::providers::MockProvider;
    use coach_reasoning::TurnOutcome;

    fn state() -> AppState {
        let store = Arc::new(InMemoryStore::new());
        let repository = Arc::new(SessionRepository::new(store.clone() as Arc<dyn SessionStore>));
        let orchestrator = Orchestrator::new(
            repository,
            store.clone() as Arc<dyn ChatLog>,
            store as Arc<dyn ExerciseCatalog>,
            Box::new(MockProvider::new("gateway-test")),
            PersuasionConfig::default(),
        );
        AppState {
            orchestrator: Arc::new(orchestrator),
        }
    }

    fn message(user: &str, text: &str) -> Json<MessageRequest> {
        Json(MessageRequest {
            user_id: user.into(),
            message: text.into(),
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let result = health().await;
        assert_eq!(result, "ok");
    }

    #[tokio::test]
    async fn test_gateway_server_creates() {
        let server = GatewayServer::new(state().orchestrator, "127.0.0.1", 0);
        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.port, 0);
        let _ = server.router();
    }

    #[tokio::test]
    async fn test_message_returns_reply() {
        let Json(resp) = handle_message(State(state()), message("alice", "tell me more"))
            .await
            .ok()
            .unwrap();
        assert_eq!(resp.reply.outcome, TurnOutcome::Persuaded);
        assert!(resp.reply.opening.is_some());
        assert!(resp.reply.content.contains("Mock gateway-test"));
    }

    #[tokio::test]
    async fn test_empty_message_is_bad_request() {
        let err = handle_message(State(state()), message("alice", ""))
            .await
            .err()
            .unwrap();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_session_then_history() {
        let state = state();
        let Json(resp) = start_session(
            State(state.clone()),
            Json(SessionRequest {
                user_id: "bob".into(),
            }),
        )
        .await
        .ok()
        .unwrap();
        assert_eq!(resp.reply.outcome, TurnOutcome::Opened);

        handle_message(State(state.clone()), message("bob", "yes"))
            .await
            .ok()
            .unwrap();

        let Json(hist) = history(State(state), Path("bob".to_string()))
            .await
            .ok()
            .unwrap();
        assert_eq!(hist.turns.len(), 3);
        assert_eq!(hist.turns[0].content, resp.reply.content);
    }

    #[test]
    fn test_error_status_mapping() {
        let not_found = ApiError(CoachError::not_found("exercise", "7").into());
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let upstream = ApiError(
            CoachError::external("chat completion", anyhow::anyhow!("timeout")).into(),
        );
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);

        let wrapped = ApiError(
            anyhow::Error::from(CoachError::Validation("bad".into())).context("while parsing"),
        );
        assert_eq!(wrapped.status(), StatusCode::BAD_REQUEST);

        let plain = ApiError(anyhow::anyhow!("boom"));
        assert_eq!(plain.status(), StatusCode::BAD_GATEWAY);
    }
}
