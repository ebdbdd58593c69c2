//! Chat-completions client for the text stage of the OCR strategy.

use async_trait::async_trait;
use serde::Serialize;

use super::parser::unwrap_chat_envelope;
use super::transport::send_for_body;
use super::AnalysisError;
use crate::config::ChatConfig;

const CREDENTIAL: &str = "LLM_API_KEY";

/// Prompt in, generated text out.
#[async_trait]
pub trait TextCompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AnalysisError>;
}

/// OpenAI-compatible `/v1/chat/completions` client.
pub struct OpenAiChatClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

impl OpenAiChatClient {
    pub fn new(client: reqwest::Client, config: &ChatConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[async_trait]
impl TextCompletionClient for OpenAiChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, AnalysisError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AnalysisError::MissingCredential(CREDENTIAL))?;

        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.3,
            max_tokens: 1000,
        };

        let endpoint = self.endpoint();
        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "Sending chat completion");

        let request = self.client.post(&endpoint).bearer_auth(api_key).json(&body);
        let raw = send_for_body(request, &endpoint).await?;
        unwrap_chat_envelope(&raw)
    }
}
