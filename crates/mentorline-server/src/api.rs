//! Shared API plumbing: the error type and the blocking database bridge.

use crate::AppState;
use axum::{
    extract::Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mentorline_queries::QueryError;
use mentorline_voice::VoiceError;
use rusqlite::Connection;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream service unavailable")]
    UpstreamUnavailable,
    #[error("upstream service timed out after {0} seconds")]
    UpstreamTimeout(u64),
    #[error("no audio produced from {0} chunks")]
    NoAudioProduced(usize),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl ApiError {
    /// Stable machine-readable kind reported in the error body.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::UpstreamUnavailable => "upstream_unavailable",
            ApiError::UpstreamTimeout(_) => "upstream_timeout",
            ApiError::NoAudioProduced(_) => "no_audio_produced",
            ApiError::InternalServerError(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UpstreamUnavailable | ApiError::NoAudioProduced(_) => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Storage details stay in the logs.
            ApiError::InternalServerError(detail) => {
                tracing::error!(error = %detail, "request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(serde_json::json!({
            "error": {
                "kind": self.kind(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::NotFound(what) => ApiError::NotFound(what),
            other => ApiError::InternalServerError(other.to_string()),
        }
    }
}

impl From<VoiceError> for ApiError {
    fn from(e: VoiceError) -> Self {
        match e {
            VoiceError::UpstreamUnavailable(detail) => {
                tracing::warn!(error = %detail, "upstream call failed");
                ApiError::UpstreamUnavailable
            }
            VoiceError::UpstreamTimeout(secs) => ApiError::UpstreamTimeout(secs),
            VoiceError::NoAudioProduced { chunks } => ApiError::NoAudioProduced(chunks),
            // Callers substitute the sentinel before this point.
            VoiceError::EmptyTranscript => {
                ApiError::InternalServerError("unhandled empty transcript".to_string())
            }
            other => ApiError::InternalServerError(other.to_string()),
        }
    }
}

/// Runs `f` with a pooled connection on the blocking thread pool.
pub(crate) async fn with_conn<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Connection) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let pool = state.pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db connection failed: {}", e)))?;
        f(&conn)
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task join error: {}", e)))?
}
