use crate::config::UpstreamConfig;
use crate::error::{bounded, check_status, VoiceError};
use async_trait::async_trait;
use mentorline_types::Language;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;

/// An uploaded audio clip.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    /// Original file name, forwarded to the speech service.
    pub file_name: String,
    pub content_type: Option<String>,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            content_type: None,
        }
    }
}

/// Speech-to-text contract.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Returns the spoken text, or `EmptyTranscript` when the service heard nothing.
    async fn transcribe(&self, clip: &AudioClip, language: &Language) -> Result<String, VoiceError>;
}

#[derive(Deserialize)]
struct SttResponse {
    #[serde(default)]
    transcript: Option<String>,
}

/// Transcriber backed by Sarvam's `/speech-to-text` endpoint.
#[derive(Debug, Clone)]
pub struct SarvamTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl SarvamTranscriber {
    pub fn new(client: reqwest::Client, config: &UpstreamConfig) -> Self {
        Self {
            client,
            base_url: config.speech_base_url.trim_end_matches('/').to_string(),
            api_key: config.speech_api_key.clone(),
            model: config.stt_model.clone(),
            timeout: config.timeout(),
        }
    }

    async fn request(&self, clip: &AudioClip, language: &Language) -> Result<String, VoiceError> {
        let mut part = Part::bytes(clip.bytes.clone()).file_name(clip.file_name.clone());
        if let Some(content_type) = &clip.content_type {
            part = part.mime_str(content_type)?;
        }
        let form = Form::new()
            .part("file", part)
            .text("language_code", language.code.clone())
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{}/speech-to-text", self.base_url))
            .header("api-subscription-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;
        let response = check_status("speech-to-text", response).await?;

        let body: SttResponse = response.json().await?;
        match body.transcript {
            Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            _ => Err(VoiceError::EmptyTranscript),
        }
    }
}

#[async_trait]
impl Transcriber for SarvamTranscriber {
    async fn transcribe(
        &self,
        clip: &AudioClip,
        language: &Language,
    ) -> Result<String, VoiceError> {
        tracing::debug!(
            bytes = clip.bytes.len(),
            language = %language.code,
            "transcribing clip"
        );
        bounded(self.timeout, self.request(clip, language)).await
    }
}
