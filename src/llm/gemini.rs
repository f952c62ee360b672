//! Gemini backend, built on rig-core's Gemini client.

use std::sync::Arc;

use rig::client::CompletionClient;
use rig::providers::gemini;
use secrecy::ExposeSecret;
use serde_json::{Value, json};

use super::{FinishReason, LlmProvider, RigAdapter};
use crate::config::GeminiConfig;
use crate::error::LlmError;

const PROVIDER: &str = "gemini";

/// Create the Gemini provider described by `config`.
///
/// When a thinking budget is configured it is sent on every request.
/// 2.5-series models count thinking tokens against `maxOutputTokens`, so a
/// small output cap without a budget of 0 can end in `MAX_TOKENS` with no text.
pub fn create_gemini_provider(config: &GeminiConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let client = gemini::Client::builder()
        .api_key(config.api_key.expose_secret())
        .base_url(&config.base_url)
        .build()
        .map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: format!("Failed to create Gemini client: {e}"),
        })?;

    let model = client.completion_model(&config.model);
    let mut adapter = RigAdapter::new(model, &config.model, PROVIDER)
        .with_timeout(config.request_timeout)
        .with_finish_reason(finish_reason);
    if let Some(budget) = config.thinking_budget {
        adapter = adapter.with_additional_params(thinking_params(budget));
    }
    tracing::info!(model = %config.model, thinking_budget = ?config.thinking_budget, "Using Gemini");
    Ok(Arc::new(adapter))
}

/// `generationConfig` fragment carrying the thinking budget.
pub fn thinking_params(budget: u32) -> Value {
    json!({ "generationConfig": { "thinkingConfig": { "thinkingBudget": budget } } })
}

/// Map a raw `generateContent` response to a stop reason.
///
/// A prompt blocked before generation has no candidates but carries
/// `promptFeedback.blockReason`.
pub fn finish_reason(raw: &Value) -> FinishReason {
    let Some(candidate) = raw["candidates"].get(0) else {
        if raw["promptFeedback"]["blockReason"].is_string() {
            return FinishReason::ContentFilter;
        }
        return FinishReason::Unknown;
    };
    match candidate["finishReason"].as_str() {
        Some("STOP") | None => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII") => {
            FinishReason::ContentFilter
        }
        Some(_) => FinishReason::Unknown,
    }
}
