use coach_core::ChatTurn;
use coach_reasoning::TurnReply;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbound chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub user_id: String,
    /// Message body text.
    #[serde(alias = "body")]
    pub message: String,
}

/// Explicit new-session request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub user_id: String,
}

/// Coach reply sent back through the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayResponse {
    /// Generated per request, echoed in the server log.
    pub request_id: Uuid,
    #[serde(flatten)]
    pub reply: TurnReply,
}

impl GatewayResponse {
    pub fn new(request_id: Uuid, reply: TurnReply) -> Self {
        Self { request_id, reply }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub user_id: String,
    pub turns: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_request_accepts_body_alias() {
        let json = r#"{"user_id":"alice","body":"hello"}"#;
        let req: MessageRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.user_id, "alice");
        assert_eq!(req.message, "hello");
    }

    #[test]
    fn test_message_request_requires_user() {
        let json = r#"{"message":"hello"}"#;
        assert!(serde_json::from_str::<MessageRequest>(json).is_err());
    }
}
