use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

fn default_speech_base_url() -> String {
    "https://api.sarvam.ai".to_string()
}

fn default_stt_model() -> String {
    "saarika:v2.5".to_string()
}

fn default_tts_model() -> String {
    "bulbul:v2".to_string()
}

fn default_completion_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_completion_model() -> String {
    "meta-llama/llama-4-scout-17b-16e-instruct".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Endpoints and credentials for the hosted speech and completion services.
#[derive(Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_speech_base_url")]
    pub speech_base_url: String,
    #[serde(default, skip_serializing)]
    pub speech_api_key: String,
    #[serde(default = "default_stt_model")]
    pub stt_model: String,
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
    #[serde(default = "default_completion_base_url")]
    pub completion_base_url: String,
    #[serde(default, skip_serializing)]
    pub completion_api_key: String,
    #[serde(default = "default_completion_model")]
    pub completion_model: String,
    /// Deadline for transcription, classification, translation and coach calls.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            speech_base_url: default_speech_base_url(),
            speech_api_key: String::new(),
            stt_model: default_stt_model(),
            tts_model: default_tts_model(),
            completion_base_url: default_completion_base_url(),
            completion_api_key: String::new(),
            completion_model: default_completion_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "[EMPTY]"
    } else {
        "[REDACTED]"
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("speech_base_url", &self.speech_base_url)
            .field("speech_api_key", &redact(&self.speech_api_key))
            .field("stt_model", &self.stt_model)
            .field("tts_model", &self.tts_model)
            .field("completion_base_url", &self.completion_base_url)
            .field("completion_api_key", &redact(&self.completion_api_key))
            .field("completion_model", &self.completion_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_chunk_size() -> usize {
    300
}

fn default_min_chunk_size() -> usize {
    100
}

fn default_concurrency() -> usize {
    4
}

fn default_chunk_timeout_secs() -> u64 {
    15
}

fn default_cleanup_delay_secs() -> u64 {
    15
}

fn default_speaker() -> String {
    "anushka".to_string()
}

/// Tunables for chunked speech synthesis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SynthesisConfig {
    /// Maximum characters per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// A chunk is only cut at a sentence or word boundary past this many characters.
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
    /// Chunks synthesized at once. 1 is strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_chunk_timeout_secs")]
    pub chunk_timeout_secs: u64,
    /// Delay before chunk files are removed after assembly.
    #[serde(default = "default_cleanup_delay_secs")]
    pub cleanup_delay_secs: u64,
    /// Path to ffmpeg. Empty selects the built-in concatenation.
    #[serde(default)]
    pub ffmpeg_binary: String,
    #[serde(default = "default_speaker")]
    pub speaker: String,
}

impl SynthesisConfig {
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.cleanup_delay_secs)
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            min_chunk_size: default_min_chunk_size(),
            concurrency: default_concurrency(),
            chunk_timeout_secs: default_chunk_timeout_secs(),
            cleanup_delay_secs: default_cleanup_delay_secs(),
            ffmpeg_binary: String::new(),
            speaker: default_speaker(),
        }
    }
}
