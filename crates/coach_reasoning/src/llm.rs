use crate::api_types::{Message, MessagesResponse};
use crate::providers::{AnthropicClient, MockProvider, OpenAiClient};
use anyhow::Result;
use async_trait::async_trait;
use coach_core::config::LlmConfig;

/// Parameters for one completion request.
#[derive(Debug, Clone)]
pub struct CompletionParams {
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.7,
        }
    }
}

impl From<&LlmConfig> for CompletionParams {
    fn from(cfg: &LlmConfig) -> Self {
        Self {
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature.clamp(0.0, 2.0),
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate one assistant utterance for `system` + the ordered transcript.
    async fn complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> Result<MessagesResponse>;
}

/// Build the client named by `cfg.provider`.
pub fn create_client(cfg: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    let client: Box<dyn LlmClient> = match cfg.provider.as_str() {
        "openai" => Box::new(OpenAiClient::new(&cfg.model, cfg.base_url.as_deref())?),
        "anthropic" => Box::new(AnthropicClient::new(&cfg.model, cfg.base_url.as_deref())?),
        "mock" => Box::new(MockProvider::new(&cfg.model)),
        other => anyhow::bail!("Unknown LLM provider: {}", other),
    };
    tracing::info!("LLM provider: {} ({})", cfg.provider, cfg.model);
    Ok(client)
}
