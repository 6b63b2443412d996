// src/evaluator/chatbot.rs — Model-under-test: retrieval-augmented support assistant

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::infra::errors::JudgeError;
use crate::provider::{ChatRequest, Message, ModelProvider};

pub const CHATBOT_SYSTEM_PROMPT: &str = "You are a helpful customer service assistant for an \
e-commerce store.\nAnswer customer questions based ONLY on the provided context.\nBe concise \
and friendly. If the context doesn't contain the answer, say so.";

/// `[chatbot]` section of config.toml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatbotParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
}

impl Default for ChatbotParams {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            max_tokens: 150,
            system_prompt: None,
        }
    }
}

/// Render the user turn: context first, then the question.
pub fn render_user_message(query: &str, context: &[String]) -> String {
    format!(
        "Context: {}\n\nCustomer Question: {}\n\nPlease answer the customer's question based on the context above.",
        context.join("\n"),
        query
    )
}

pub struct RagChatbot {
    provider: Arc<dyn ModelProvider>,
    params: ChatbotParams,
}

impl RagChatbot {
    pub fn new(provider: Arc<dyn ModelProvider>, params: ChatbotParams) -> Self {
        Self { provider, params }
    }

    pub fn params(&self) -> &ChatbotParams {
        &self.params
    }

    /// Answer `query` from `context`. The answer is returned verbatim.
    /// A blank answer is a provider failure, not a case to be judged.
    pub async fn respond(&self, query: &str, context: &[String]) -> Result<String, JudgeError> {
        let system = self
            .params
            .system_prompt
            .clone()
            .unwrap_or_else(|| CHATBOT_SYSTEM_PROMPT.to_string());

        let response = self
            .provider
            .chat(ChatRequest {
                model: self.params.model.clone(),
                messages: vec![
                    Message::system(system),
                    Message::user(render_user_message(query, context)),
                ],
                max_tokens: Some(self.params.max_tokens),
                temperature: Some(self.params.temperature),
                system: None,
            })
            .await?;

        if response.content.trim().is_empty() {
            return Err(JudgeError::Provider {
                provider: self.provider.id().to_string(),
                message: format!("model under test ({}) returned an empty answer", self.params.model),
                retriable: false,
            });
        }

        tracing::debug!(
            model = %self.params.model,
            answer_chars = response.content.len(),
            "model under test answered"
        );
        Ok(response.content)
    }
}
