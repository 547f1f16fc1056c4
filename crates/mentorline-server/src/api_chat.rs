//! Per-query conversation endpoints and the automated coach.

use crate::api::{with_conn, ApiError};
use crate::pipeline::{
    resolve_language, transcribe_or_sentinel, write_clip, SpooledAudio, UploadForm,
};
use crate::{upload_url, AppState, GENERATED_SUBDIR, VOICE_SUBDIR};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Json, Multipart, Path};
use mentorline_queries::{
    append_message, list_messages, query_language, ChatMessage, NewChatMessage,
};
use mentorline_types::{DEFAULT_LANGUAGE_ID, VOICE_MESSAGE_SENTINEL};
use mentorline_voice::ChatTurn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Request body for `POST /api/chat`.
#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    #[serde(rename = "queryId")]
    pub query_id: i64,
    #[serde(rename = "senderId")]
    pub sender_id: i64,
    pub message: String,
    /// Also synthesize the message as speech in the query's language.
    #[serde(default)]
    pub speak: bool,
}

/// Response body for `POST /api/mentor-chat`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MentorChatResponse {
    pub transcript: String,
    pub reply: String,
    pub bot_audio_url: String,
}

/// Handler for `GET /api/chat/{queryId}`.
pub async fn list_messages_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(query_id): Path<i64>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let messages = with_conn(&state, move |conn| Ok(list_messages(conn, query_id)?)).await?;
    Ok(Json(messages))
}

/// Handler for `POST /api/chat`.
///
/// With `speak: true` the message is synthesized first; if that fails
/// nothing is stored.
pub async fn post_message_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<PostMessageRequest>, JsonRejection>,
) -> Result<Json<ChatMessage>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let text = payload.message.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let query_id = payload.query_id;
    let spoken = if payload.speak {
        let language =
            with_conn(&state, move |conn| Ok(query_language(conn, query_id)?)).await?;
        let audio = state.synthesizer.synthesize(&text, &language).await?;
        Some(audio)
    } else {
        None
    };

    let new_message = NewChatMessage {
        query_id,
        sender_id: payload.sender_id,
        message: text,
        audio_url: spoken
            .as_ref()
            .map(|audio| upload_url(GENERATED_SUBDIR, &audio.file_name)),
    };
    let stored = with_conn(&state, move |conn| Ok(append_message(conn, &new_message)?)).await;

    match stored {
        Ok(message) => Ok(Json(message)),
        Err(e) => {
            if let Some(audio) = spoken {
                state.cleanup.schedule(vec![audio.path], Duration::ZERO);
            }
            Err(e)
        }
    }
}

/// Handler for `POST /api/chat/voice`.
///
/// Multipart fields: `audio`, `query_id`, `sender_id`. The recording is
/// kept and the message body is the voice sentinel.
pub async fn voice_message_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ChatMessage>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let clip = form.take_audio()?;
    let query_id = form.required_id("query_id")?;
    let sender_id = form.required_id("sender_id")?;

    let path = write_clip(&state.upload_dir.join(VOICE_SUBDIR), &clip).await?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();

    let new_message = NewChatMessage {
        query_id,
        sender_id,
        message: VOICE_MESSAGE_SENTINEL.to_string(),
        audio_url: Some(upload_url(VOICE_SUBDIR, &file_name)),
    };
    let stored = with_conn(&state, move |conn| Ok(append_message(conn, &new_message)?)).await;

    match stored {
        Ok(message) => {
            tracing::info!(query_id, sender_id, file = %file_name, "voice message stored");
            Ok(Json(message))
        }
        Err(e) => {
            state.cleanup.schedule(vec![path], Duration::ZERO);
            Err(e)
        }
    }
}

/// Handler for `POST /api/mentor-chat`.
///
/// Multipart fields: `audio`, `history` (JSON array of `{role, content}`)
/// and an optional `language_id`. Transcribes the clip, asks the coach for a
/// reply and returns it as text and speech.
pub async fn mentor_chat_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<MentorChatResponse>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let clip = form.take_audio()?;
    let history = parse_history(form.text("history"))?;
    let language_id = form
        .optional_id("language_id")?
        .unwrap_or(DEFAULT_LANGUAGE_ID);

    let language = resolve_language(&state, language_id).await?;
    let _spooled = SpooledAudio::write(&state, &clip).await?;

    let transcript = transcribe_or_sentinel(&state, &clip, &language).await?;
    let reply = state.coach.reply(&history, &transcript, &language).await?;
    let audio = state.synthesizer.synthesize(&reply, &language).await?;

    tracing::info!(
        language = %language.code,
        turns = history.len(),
        chunks = audio.chunk_count,
        "coach replied"
    );

    Ok(Json(MentorChatResponse {
        transcript,
        reply,
        bot_audio_url: upload_url(GENERATED_SUBDIR, &audio.file_name),
    }))
}

fn parse_history(raw: Option<&str>) -> Result<Vec<ChatTurn>, ApiError> {
    match raw {
        None => Ok(Vec::new()),
        Some(json) => serde_json::from_str(json)
            .map_err(|e| ApiError::BadRequest(format!("invalid history: {}", e))),
    }
}
