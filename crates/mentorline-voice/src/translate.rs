use crate::chunking::split_text;
use crate::config::UpstreamConfig;
use crate::error::{bounded, check_status, VoiceError};
use async_trait::async_trait;
use mentorline_types::Language;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest input sent in one translation request.
const MAX_TRANSLATE_CHARS: usize = 900;

/// Text translation contract.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source: &Language,
        target: &Language,
    ) -> Result<String, VoiceError>;
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    input: &'a str,
    source_language_code: &'a str,
    target_language_code: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(default)]
    translated_text: String,
}

/// Translator backed by Sarvam's `/translate` endpoint.
///
/// Long texts are split on sentence boundaries and translated piece by piece.
#[derive(Debug, Clone)]
pub struct SarvamTranslator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl SarvamTranslator {
    pub fn new(client: reqwest::Client, config: &UpstreamConfig) -> Self {
        Self {
            client,
            base_url: config.speech_base_url.trim_end_matches('/').to_string(),
            api_key: config.speech_api_key.clone(),
            timeout: config.timeout(),
        }
    }

    async fn request(
        &self,
        text: &str,
        source: &Language,
        target: &Language,
    ) -> Result<String, VoiceError> {
        let body = TranslateRequest {
            input: text,
            source_language_code: &source.code,
            target_language_code: &target.code,
        };

        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
            .header("api-subscription-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_status("translate", response).await?;

        let parsed: TranslateResponse = response.json().await?;
        Ok(parsed.translated_text.trim().to_string())
    }
}

#[async_trait]
impl Translator for SarvamTranslator {
    async fn translate(
        &self,
        text: &str,
        source: &Language,
        target: &Language,
    ) -> Result<String, VoiceError> {
        if source.same_code(target) {
            return Ok(text.to_string());
        }

        let mut pieces = Vec::new();
        for piece in split_text(text, MAX_TRANSLATE_CHARS, MAX_TRANSLATE_CHARS / 3) {
            pieces.push(bounded(self.timeout, self.request(&piece, source, target)).await?);
        }
        Ok(pieces.join(" "))
    }
}
