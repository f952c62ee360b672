//! LLM integration for intent classification.
//!
//! The classifier depends only on [`LlmProvider`]. HTTP transport goes
//! through rig-core; [`RigAdapter`] bridges rig's `CompletionModel` to our
//! trait and [`create_gemini_provider`] builds the production backend.

pub mod gemini;
mod rig_adapter;

pub use gemini::create_gemini_provider;
pub use rig_adapter::{FinishReasonFn, RigAdapter};

use async_trait::async_trait;

use crate::error::LlmError;

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    /// Output was cut off by the token limit.
    Length,
    /// Output (or the prompt) was blocked by a safety filter.
    ContentFilter,
    Unknown,
}

/// Single-turn completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub finish_reason: FinishReason,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}
