//! Bridges a rig-core `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::message::AssistantContent;
use rig::completion::CompletionModel;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};

/// Adapter that runs our completion requests through a rig model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request
            .last_user_message()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "completion request has no user message".to_string(),
            })?
            .to_string();

        let mut builder = self.model.completion_request(prompt);
        if let Some(preamble) = request.system_prompt() {
            builder = builder.preamble(preamble);
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: e.to_string(),
        })?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        tracing::debug!(
            model = %self.model_name,
            chars = content.len(),
            "Completion received"
        );

        Ok(CompletionResponse { content })
    }
}
