use crate::api_types::{Message, MessagesResponse, Role};
use crate::llm::{CompletionParams, LlmClient};
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

/// OpenAI-compatible `/chat/completions` client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(model: &str, base_url: Option<&str>) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
        let base_url = base_url
            .map(str::to_string)
            .or_else(|| env::var("OPENAI_BASE_URL").ok())
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()?,
            api_key,
            base_url,
            model: model.to_string(),
        })
    }
}

/// OpenAI puts the system prompt in front as a `system` message.
fn to_openai_messages(system: &str, messages: &[Message]) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    out.push(json!({ "role": "system", "content": system }));
    for msg in messages {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        out.push(json!({ "role": role, "content": msg.joined_text() }));
    }
    out
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    #[tracing::instrument(skip(self, system, messages, params), fields(model = %self.model))]
    async fn complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> Result<MessagesResponse> {
        let payload = json!({
            "model": self.model,
            "messages": to_openai_messages(system, &messages),
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .context("Failed to send request to OpenAI")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API Error ({}): {}", status, error_text);
        }

        let resp_json: Value = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;
        parse_chat_completion(&resp_json)
    }
}

fn parse_chat_completion(resp_json: &Value) -> Result<MessagesResponse> {
    let choice = resp_json["choices"]
        .get(0)
        .context("OpenAI response has no choices")?;
    let text = choice["message"]["content"].as_str().unwrap_or_default();
    let mut response = MessagesResponse::text(text);
    response.stop_reason = choice["finish_reason"].as_str().map(str::to_string);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_goes_first() {
        let msgs = vec![
            Message::text(Role::Assistant, "Try a plank?"),
            Message::text(Role::User, "why"),
        ];
        let out = to_openai_messages("be kind", &msgs);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0]["role"], "system");
        assert_eq!(out[0]["content"], "be kind");
        assert_eq!(out[1]["role"], "assistant");
        assert_eq!(out[2]["content"], "why");
    }

    #[test]
    fn test_parse_chat_completion() {
        let body = json!({
            "choices": [{
                "message": {"role": "assistant", "content": "A plank takes 30 seconds."},
                "finish_reason": "stop"
            }]
        });
        let resp = parse_chat_completion(&body).unwrap();
        assert_eq!(resp.joined_text(), "A plank takes 30 seconds.");
        assert_eq!(resp.stop_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_parse_without_choices_fails() {
        assert!(parse_chat_completion(&json!({"choices": []})).is_err());
    }
}
