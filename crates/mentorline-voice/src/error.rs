use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("upstream service did not answer within {0} seconds")]
    UpstreamTimeout(u64),

    #[error("transcription returned no text")]
    EmptyTranscript,

    #[error("no audio produced from {chunks} chunks")]
    NoAudioProduced { chunks: usize },

    #[error("audio assembly failed: {0}")]
    Assembly(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for VoiceError {
    fn from(e: reqwest::Error) -> Self {
        VoiceError::UpstreamUnavailable(e.to_string())
    }
}

/// Runs an upstream call under a deadline, mapping expiry to `UpstreamTimeout`.
pub(crate) async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, VoiceError>
where
    F: Future<Output = Result<T, VoiceError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| VoiceError::UpstreamTimeout(limit.as_secs()))?
}

/// Turns a non-success response into `UpstreamUnavailable`.
///
/// The response body is logged, never returned, so provider error details do
/// not leak to clients.
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, VoiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(service, %status, body = %body, "upstream returned an error");
    Err(VoiceError::UpstreamUnavailable(format!(
        "{service} returned {status}"
    )))
}
