//! Minimal client for OpenAI-compatible chat completion endpoints.

use crate::config::UpstreamConfig;
use crate::error::{bounded, check_status, VoiceError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One turn of a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// `system`, `user` or `assistant`.
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl CompletionClient {
    pub fn new(client: reqwest::Client, config: &UpstreamConfig) -> Self {
        Self {
            client,
            base_url: config.completion_base_url.trim_end_matches('/').to_string(),
            api_key: config.completion_api_key.clone(),
            model: config.completion_model.clone(),
            timeout: config.timeout(),
        }
    }

    /// Sends `messages` and returns the first choice's text, trimmed.
    ///
    /// A response without choices yields an empty string.
    pub async fn complete(&self, messages: &[ChatTurn]) -> Result<String, VoiceError> {
        bounded(self.timeout, self.request(messages)).await
    }

    async fn request(&self, messages: &[ChatTurn]) -> Result<String, VoiceError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
        };

        tracing::debug!(model = %self.model, turns = messages.len(), "sending completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_status("completion", response).await?;

        let parsed: CompletionResponse = response.json().await?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default())
    }
}
