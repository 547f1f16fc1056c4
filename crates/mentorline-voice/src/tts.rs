use crate::config::UpstreamConfig;
use crate::error::{check_status, VoiceError};
use async_trait::async_trait;
use base64::Engine;
use mentorline_types::Language;
use serde::{Deserialize, Serialize};

/// Text-to-speech contract for a single chunk of text.
///
/// Implementations return encoded audio. An empty buffer means the service
/// produced nothing for this text. Deadlines are applied by the caller.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &Language) -> Result<Vec<u8>, VoiceError>;
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    inputs: [&'a str; 1],
    target_language_code: &'a str,
    speaker: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct TtsResponse {
    #[serde(default)]
    audios: Vec<String>,
}

/// Synthesizer backed by Sarvam's `/text-to-speech` endpoint.
#[derive(Debug, Clone)]
pub struct SarvamSynthesizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    speaker: String,
}

impl SarvamSynthesizer {
    pub fn new(
        client: reqwest::Client,
        config: &UpstreamConfig,
        speaker: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: config.speech_base_url.trim_end_matches('/').to_string(),
            api_key: config.speech_api_key.clone(),
            model: config.tts_model.clone(),
            speaker: speaker.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for SarvamSynthesizer {
    async fn synthesize(&self, text: &str, language: &Language) -> Result<Vec<u8>, VoiceError> {
        let body = TtsRequest {
            inputs: [text],
            target_language_code: &language.code,
            speaker: &self.speaker,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/text-to-speech", self.base_url))
            .header("api-subscription-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_status("text-to-speech", response).await?;

        let parsed: TtsResponse = response.json().await?;
        let Some(encoded) = parsed.audios.into_iter().next() else {
            return Ok(Vec::new());
        };

        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| VoiceError::UpstreamUnavailable(format!("undecodable audio: {e}")))
    }
}
