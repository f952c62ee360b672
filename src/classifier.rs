//! Intent classifier. Maps a reply to one of two emotional registers.
//!
//! The language model is a black box behind [`LlmProvider`]. Whatever it
//! returns is normalized to a closed label set; anything unusable is retried
//! under a bounded [`RetryPolicy`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::ClassifierError;
use crate::llm::{CompletionRequest, FinishReason, LlmProvider};
use crate::mail::text::collapse_whitespace;
use crate::store::Intent;

/// Reply text beyond this is not sent to the model.
const MAX_PROMPT_REPLY_CHARS: usize = 2000;

const CLASSIFY_TEMPERATURE: f32 = 0.0;

const CLASSIFY_MAX_TOKENS: u32 = 32;

pub struct IntentClassifier {
    llm: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self { llm, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Classify a reply.
    ///
    /// Empty input fails immediately with [`ClassifierError::InvalidInput`].
    /// Transport errors, empty/truncated/blocked output and unrecognized
    /// labels are retried up to `max_attempts` times with a fixed pause.
    pub async fn classify(&self, text: &str) -> Result<Intent, ClassifierError> {
        let normalized = collapse_whitespace(text);
        if normalized.is_empty() {
            return Err(ClassifierError::InvalidInput);
        }
        let prompt = build_prompt(&normalized);

        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.attempt(&prompt).await {
                Ok(intent) => {
                    debug!(attempt, intent = %intent, "Reply classified");
                    return Ok(intent);
                }
                Err(reason) => {
                    warn!(
                        attempt,
                        max_attempts,
                        model = %self.llm.model_name(),
                        reason = %reason,
                        "Classification attempt failed"
                    );
                    last_error = reason;
                }
            }
            if attempt < max_attempts && !self.policy.backoff.is_zero() {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        Err(ClassifierError::Exhausted {
            attempts: max_attempts,
            last_error,
        })
    }

    async fn attempt(&self, prompt: &str) -> Result<Intent, String> {
        let request = CompletionRequest::new(prompt)
            .with_temperature(CLASSIFY_TEMPERATURE)
            .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|e| format!("provider error: {e}"))?;

        match response.finish_reason {
            FinishReason::Length => return Err("output truncated".into()),
            FinishReason::ContentFilter => return Err("output blocked by safety filter".into()),
            FinishReason::Stop | FinishReason::Unknown => {}
        }
        if response.content.trim().is_empty() {
            return Err("empty output".into());
        }
        normalize_label(&response.content)
            .ok_or_else(|| format!("unrecognized label {:?}", response.content.trim()))
    }
}

/// Map raw model output to an intent.
///
/// Lower-cases, keeps only `[a-z_]` and matches by substring. `None` means the
/// output named neither class.
pub fn normalize_label(raw: &str) -> Option<Intent> {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || *c == '_')
        .collect();

    if cleaned.contains("worried") || cleaned.contains("curious") {
        Some(Intent::WorriedCurious)
    } else if cleaned.contains("unbothered") || cleaned.contains("dismissive") {
        Some(Intent::UnbotheredDismissive)
    } else {
        None
    }
}

fn build_prompt(reply: &str) -> String {
    let reply: String = reply.chars().take(MAX_PROMPT_REPLY_CHARS).collect();
    format!(
        "You are labelling replies to a security-awareness exercise email.\n\
         Classify the emotional register of the reply below into exactly one category:\n\
         - worried_curious: the sender is concerned, alarmed, confused or asks what happened.\n\
         - unbothered_dismissive: the sender is indifferent, dismissive or declines to engage.\n\n\
         Answer with the category name only, either worried_curious or unbothered_dismissive.\n\n\
         Reply:\n\"\"\"\n{reply}\n\"\"\""
    )
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{LlmError, TransportError};
    use crate::llm::CompletionResponse;

    /// Mock LLM that replays a fixed script of responses.
    struct ScriptedLlm {
        script: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedLlm {
        fn new(script: Vec<Result<CompletionResponse, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(text("???")))
        }
    }

    fn text(content: &str) -> CompletionResponse {
        CompletionResponse {
            content: content.to_string(),
            finish_reason: FinishReason::Stop,
        }
    }

    fn no_backoff() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::ZERO,
        }
    }

    // ── Label normalization ─────────────────────────────────────────

    #[test]
    fn normalize_worried_variants() {
        assert_eq!(normalize_label("worried_curious"), Some(Intent::WorriedCurious));
        assert_eq!(normalize_label("  **Worried_Curious**.\n"), Some(Intent::WorriedCurious));
        assert_eq!(normalize_label("CURIOUS"), Some(Intent::WorriedCurious));
        assert_eq!(normalize_label("\"worried\""), Some(Intent::WorriedCurious));
    }

    #[test]
    fn normalize_dismissive_variants() {
        assert_eq!(
            normalize_label("unbothered_dismissive"),
            Some(Intent::UnbotheredDismissive)
        );
        assert_eq!(normalize_label("Dismissive!"), Some(Intent::UnbotheredDismissive));
        assert_eq!(normalize_label("`UNBOTHERED`"), Some(Intent::UnbotheredDismissive));
    }

    #[test]
    fn normalize_rejects_other_output() {
        assert_eq!(normalize_label("neutral"), None);
        assert_eq!(normalize_label(""), None);
        assert_eq!(normalize_label("42"), None);
    }

    #[test]
    fn prompt_embeds_reply_and_taxonomy() {
        let prompt = build_prompt("What happened??");
        assert!(prompt.contains("What happened??"));
        assert!(prompt.contains("worried_curious"));
        assert!(prompt.contains("unbothered_dismissive"));
    }

    #[test]
    fn prompt_caps_reply_length() {
        let long = "a".repeat(MAX_PROMPT_REPLY_CHARS + 500);
        let prompt = build_prompt(&long);
        assert!(!prompt.contains(&"a".repeat(MAX_PROMPT_REPLY_CHARS + 1)));
    }

    // ── Retry behaviour ─────────────────────────────────────────────

    #[tokio::test]
    async fn empty_input_makes_no_call() {
        let llm = ScriptedLlm::new(vec![]);
        let classifier = IntentClassifier::new(llm.clone(), no_backoff());

        let err = classifier.classify("  \n\t ").await.unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidInput));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn first_good_answer_wins() {
        let llm = ScriptedLlm::new(vec![Ok(text("worried_curious"))]);
        let classifier = IntentClassifier::new(llm.clone(), no_backoff());

        assert_eq!(
            classifier.classify("What happened??").await.unwrap(),
            Intent::WorriedCurious
        );
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn retries_through_transport_truncation_and_mismatch() {
        let llm = ScriptedLlm::new(vec![
            Err(TransportError::network("gemini", "connection reset").into()),
            Ok(CompletionResponse {
                content: "unboth".into(),
                finish_reason: FinishReason::Length,
            }),
            Ok(text("Dismissive.")),
        ]);
        let classifier = IntentClassifier::new(llm.clone(), no_backoff());

        assert_eq!(
            classifier.classify("ok whatever").await.unwrap(),
            Intent::UnbotheredDismissive
        );
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn safety_block_and_empty_output_are_retried() {
        let llm = ScriptedLlm::new(vec![
            Ok(CompletionResponse {
                content: String::new(),
                finish_reason: FinishReason::ContentFilter,
            }),
            Ok(text("   ")),
            Ok(text("curious")),
        ]);
        let classifier = IntentClassifier::new(llm.clone(), no_backoff());
        assert_eq!(classifier.classify("hm?").await.unwrap(), Intent::WorriedCurious);
    }

    #[tokio::test]
    async fn exhausting_attempts_raises_classification_error() {
        let llm = ScriptedLlm::new(vec![Ok(text("neutral")), Ok(text("maybe")), Ok(text("n/a"))]);
        let classifier = IntentClassifier::new(llm.clone(), no_backoff());

        match classifier.classify("hello").await.unwrap_err() {
            ClassifierError::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("n/a"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_sleeps_between_attempts_only() {
        let llm = ScriptedLlm::new(vec![Ok(text("?")), Ok(text("?")), Ok(text("?"))]);
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        };
        let classifier = IntentClassifier::new(llm, policy);

        let started = tokio::time::Instant::now();
        assert!(classifier.classify("hello").await.is_err());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(4));
        assert!(elapsed < Duration::from_secs(6));
    }
}
