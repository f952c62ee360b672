//! Bridges a rig-core `CompletionModel` to our [`LlmProvider`] trait.

use std::time::Duration;

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel};
use serde_json::Value;

use super::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use crate::error::LlmError;

/// Reads the stop reason out of a provider's raw response body.
pub type FinishReasonFn = fn(&Value) -> FinishReason;

/// Adapter that wraps any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    provider: &'static str,
    additional_params: Option<Value>,
    timeout: Option<Duration>,
    finish_reason: FinishReasonFn,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &'static str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider,
            additional_params: None,
            timeout: None,
            finish_reason: |_| FinishReason::Stop,
        }
    }

    /// Provider-specific request fields merged into every call.
    pub fn with_additional_params(mut self, params: Value) -> Self {
        self.additional_params = Some(params);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_finish_reason(mut self, finish_reason: FinishReasonFn) -> Self {
        self.finish_reason = finish_reason;
        self
    }

    fn request_failed(&self, reason: impl Into<String>) -> LlmError {
        LlmError::RequestFailed {
            provider: self.provider.to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut builder = self.model.completion_request(request.prompt.as_str());
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }
        if let Some(params) = &self.additional_params {
            builder = builder.additional_params(params.clone());
        }
        let call = self.model.completion(builder.build());

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| self.request_failed(format!("timed out after {limit:?}")))?,
            None => call.await,
        };
        let response = result.map_err(|e| self.request_failed(e.to_string()))?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|item| match item {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect();

        let raw = serde_json::to_value(&response.raw_response).unwrap_or(Value::Null);
        let finish_reason = (self.finish_reason)(&raw);

        tracing::debug!(
            model = %self.model_name,
            finish_reason = ?finish_reason,
            "Completion received"
        );
        Ok(CompletionResponse {
            content,
            finish_reason,
        })
    }
}
