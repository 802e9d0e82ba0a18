pub mod api_types;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod providers;

pub use llm::{create_client, CompletionParams, LlmClient};
pub use orchestrator::{Orchestrator, TurnOutcome, TurnReply};
