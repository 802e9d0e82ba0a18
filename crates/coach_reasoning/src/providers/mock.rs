//! Mock LLM provider: deterministic responses for running without API keys.

use crate::api_types::{Message, MessagesResponse};
use crate::llm::{CompletionParams, LlmClient};
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct MockProvider {
    model: String,
}

impl MockProvider {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        messages: Vec<Message>,
        _params: CompletionParams,
    ) -> Result<MessagesResponse> {
        let last = messages
            .last()
            .map(|m| m.joined_text())
            .unwrap_or_default();
        Ok(MessagesResponse::text(format!(
            "(Mock {} Response) {} turns received; last prompt was {} chars.",
            self.model,
            messages.len(),
            last.chars().count()
        )))
    }
}
