//! Language-model client for the hosted completion and chat APIs.
//!
//! [`LanguageModel`] is the seam the dispatcher and chat engine talk to;
//! [`OpenAIClient`] implements it against an OpenAI-compatible base URL:
//!
//! | Call | Endpoint |
//! |------|----------|
//! | [`complete`](LanguageModel::complete) | `POST {base}/completions` |
//! | [`chat`](LanguageModel::chat) | `POST {base}/chat/completions` |
//!
//! Neither call is retried. A failed turn is handled by the dispatcher's
//! fallback policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::{ChatConfig, CompletionConfig, Credentials};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Who speaks in a chat request. Unlike [`crate::models::Role`], includes `system`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Sampling parameters for a raw completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl CompletionRequest {
    pub fn new(config: &CompletionConfig, prompt: impl Into<String>) -> Self {
        Self {
            model: config.model.clone(),
            prompt: prompt.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: config.top_p,
            frequency_penalty: config.frequency_penalty,
            presence_penalty: config.presence_penalty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(config: &ChatConfig, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: config.model.clone(),
            messages,
            temperature: config.temperature,
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Single-prompt text completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
    /// Multi-message chat completion.
    async fn chat(&self, request: &ChatRequest) -> Result<String, LlmError>;
}

pub struct OpenAIClient {
    credentials: Credentials,
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            credentials,
            client,
        })
    }

    async fn post<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<serde_json::Value, LlmError> {
        let api_key = self
            .credentials
            .api_key
            .as_deref()
            .ok_or(LlmError::MissingApiKey)?;
        let url = format!("{}/{}", self.credentials.api_base, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl LanguageModel for OpenAIClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let json = self.post("completions", request).await?;
        let parsed: CompletionResponse =
            serde_json::from_value(json).map_err(|e| LlmError::Malformed(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| LlmError::Malformed("no choices in completion".to_string()))
    }

    async fn chat(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let json = self.post("chat/completions", request).await?;
        let parsed: ChatResponse =
            serde_json::from_value(json).map_err(|e| LlmError::Malformed(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Malformed("no message content in chat response".to_string()))
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
