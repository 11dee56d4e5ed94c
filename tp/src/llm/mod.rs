//! LLM completion collaborator
//!
//! One adapter per provider behind the [`LlmClient`] trait, plus helpers every
//! caller uses: an explicit per-call timeout and lenient structured-output
//! parsing (tool call payload first, JSON in text second).

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod openai;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use types::{
    CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage, ToolCall, ToolDefinition,
};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config
///
/// Supports "anthropic" and "openai" providers.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicClient::from_config(config)?)),
        "openai" => Ok(Arc::new(OpenAIClient::from_config(config)?)),
        other => Err(LlmError::NotConfigured(format!(
            "Unknown LLM provider: '{}'. Supported: anthropic, openai",
            other
        ))),
    }
}

/// Run one completion bounded by `timeout`
pub async fn complete_with_timeout(
    llm: &dyn LlmClient,
    request: CompletionRequest,
    timeout: Duration,
) -> Result<CompletionResponse, LlmError> {
    debug!(timeout_ms = timeout.as_millis() as u64, "complete_with_timeout: called");
    match tokio::time::timeout(timeout, llm.complete(request)).await {
        Ok(result) => result,
        Err(_) => {
            debug!("complete_with_timeout: timed out");
            Err(LlmError::Timeout(timeout))
        }
    }
}

/// Pull a JSON object out of model output
///
/// Accepts bare JSON, fenced ```json blocks, and JSON surrounded by prose.
pub fn parse_json_payload(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed)
        && value.is_object()
    {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<serde_json::Value>(&trimmed[start..=end])
        .ok()
        .filter(|v| v.is_object())
}

/// Structured output of a response: the named tool call's input, else JSON in the text
pub fn structured_output(response: &CompletionResponse, tool_name: &str) -> Option<serde_json::Value> {
    if let Some(input) = response.tool_input(tool_name) {
        return Some(input.clone());
    }
    response.text_content().and_then(parse_json_payload)
}
