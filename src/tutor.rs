//! Answering component: turns a student's question into a tailored answer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::profile::prompts::tutor_system_prompt;
use crate::profile::StudentProfile;

/// Result of answering a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The model's answer, trimmed.
    Answered(String),
    /// Human-readable reason the answer could not be produced.
    Failed(String),
}

/// Produces answers for a student profile.
///
/// Implementations report every failure as `AnswerOutcome::Failed`.
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, profile: &StudentProfile, question: &str) -> AnswerOutcome;
}

/// Completion budget when none is configured.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Answers questions with a single LLM completion per question.
pub struct LlmAnswerer {
    llm: Arc<dyn LlmProvider>,
    timeout: Duration,
    max_tokens: u32,
}

impl LlmAnswerer {
    pub fn new(llm: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self {
            llm,
            timeout,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl Answerer for LlmAnswerer {
    async fn answer(&self, profile: &StudentProfile, question: &str) -> AnswerOutcome {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(tutor_system_prompt(profile)),
            ChatMessage::user(question),
        ])
        .with_max_tokens(self.max_tokens);

        let result = tokio::time::timeout(self.timeout, self.llm.complete(request)).await;

        match result {
            Ok(Ok(response)) => {
                let text = response.content.trim();
                if text.is_empty() {
                    tracing::warn!(model = self.llm.model_name(), "Empty completion");
                    AnswerOutcome::Failed("the model returned an empty answer".to_string())
                } else {
                    AnswerOutcome::Answered(text.to_string())
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(model = self.llm.model_name(), error = %e, "Completion failed");
                AnswerOutcome::Failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    model = self.llm.model_name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Completion timed out"
                );
                AnswerOutcome::Failed(format!(
                    "no answer within {} seconds",
                    self.timeout.as_secs()
                ))
            }
        }
    }
}
