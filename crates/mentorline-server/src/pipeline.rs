//! Voice-query intake: transcription, classification, matching and
//! persistence, plus the multipart and file handling shared by the audio
//! endpoints.

use crate::api::{with_conn, ApiError};
use crate::AppState;
use axum::extract::Multipart;
use mentorline_queries::{
    create_query_with_fanout, find_matching_mentors, get_language, user_display_name, NewQuery,
    Query,
};
use mentorline_types::{Language, Mentor, TRANSCRIPT_NOT_FOUND};
use mentorline_voice::{sniff_extension, AudioClip, CleanupHandle, VoiceError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Name of the multipart field carrying the recording.
const AUDIO_FIELD: &str = "audio";

/// A parsed multipart upload: one audio part plus plain text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    audio: Option<AudioClip>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    /// Drains a multipart body.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("multipart error: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == AUDIO_FIELD {
                let file_name = field.file_name().unwrap_or("audio").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {}", e)))?;
                let mut clip = AudioClip::new(bytes.to_vec(), file_name);
                clip.content_type = content_type;
                form.audio = Some(clip);
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| {
                        ApiError::BadRequest(format!("failed to read field {name}: {e}"))
                    })?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    /// Takes the audio part, which must be present and non-empty.
    pub fn take_audio(&mut self) -> Result<AudioClip, ApiError> {
        match self.audio.take() {
            Some(clip) if !clip.bytes.is_empty() => Ok(clip),
            Some(_) => Err(ApiError::BadRequest("audio file is empty".to_string())),
            None => Err(ApiError::BadRequest("no audio file provided".to_string())),
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn optional_id(&self, name: &str) -> Result<Option<i64>, ApiError> {
        self.text(name)
            .map(|raw| {
                raw.parse::<i64>()
                    .map_err(|_| ApiError::BadRequest(format!("{name} must be an integer")))
            })
            .transpose()
    }

    pub fn required_id(&self, name: &str) -> Result<i64, ApiError> {
        self.optional_id(name)?
            .ok_or_else(|| ApiError::BadRequest(format!("missing field: {name}")))
    }
}

/// An incoming clip written to the spool directory.
///
/// The file is handed to the cleanup task when the guard drops, so it goes
/// away after the response whether the request succeeded, failed or was
/// abandoned.
#[derive(Debug)]
pub struct SpooledAudio {
    path: PathBuf,
    cleanup: CleanupHandle,
}

impl SpooledAudio {
    pub async fn write(state: &AppState, clip: &AudioClip) -> Result<Self, ApiError> {
        let path = write_clip(&state.spool_dir, clip).await?;
        Ok(Self {
            path,
            cleanup: state.cleanup.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SpooledAudio {
    fn drop(&mut self) {
        self.cleanup
            .schedule(vec![std::mem::take(&mut self.path)], Duration::ZERO);
    }
}

/// Writes `clip` under `dir` with a fresh name and returns its path.
pub async fn write_clip(dir: &Path, clip: &AudioClip) -> Result<PathBuf, ApiError> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        ApiError::InternalServerError(format!("failed to create upload dir: {}", e))
    })?;

    let file_name = format!("{}.{}", Uuid::new_v4(), clip_extension(clip));
    let path = dir.join(file_name);
    tokio::fs::write(&path, &clip.bytes)
        .await
        .map_err(|e| ApiError::InternalServerError(format!("failed to write file: {}", e)))?;
    Ok(path)
}

/// Extension for a stored clip: the uploaded name's if it looks sane,
/// otherwise whatever the bytes suggest.
fn clip_extension(clip: &AudioClip) -> String {
    Path::new(&clip.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| sniff_extension(&clip.bytes).to_string())
}

/// Transcribes a clip, substituting the not-found sentinel for silence.
pub async fn transcribe_or_sentinel(
    state: &AppState,
    clip: &AudioClip,
    language: &Language,
) -> Result<String, ApiError> {
    match state.transcriber.transcribe(clip, language).await {
        Ok(text) => Ok(text),
        Err(VoiceError::EmptyTranscript) => {
            tracing::info!(language = %language.code, "no speech recognized, using sentinel");
            Ok(TRANSCRIPT_NOT_FOUND.to_string())
        }
        Err(e) => Err(e.into()),
    }
}

/// Resolves a language id against the catalogue.
pub async fn resolve_language(state: &AppState, language_id: i64) -> Result<Language, ApiError> {
    with_conn(state, move |conn| Ok(get_language(conn, language_id)?)).await
}

/// Parameters of a voice query.
#[derive(Debug)]
pub struct QuerySubmission {
    pub clip: AudioClip,
    pub mentee_id: i64,
    pub language_id: i64,
}

/// A persisted query and the mentors it fanned out to.
#[derive(Debug)]
pub struct SubmittedQuery {
    pub query: Query,
    pub matched: Vec<Mentor>,
}

/// Runs a voice query through transcription, classification and matching,
/// then stores it with its fan-out rows.
pub async fn submit_query(
    state: &AppState,
    submission: QuerySubmission,
) -> Result<SubmittedQuery, ApiError> {
    let QuerySubmission {
        clip,
        mentee_id,
        language_id,
    } = submission;

    // Unknown mentees are rejected before any upstream call is made.
    let language = with_conn(state, move |conn| {
        if user_display_name(conn, mentee_id)?.is_none() {
            return Err(ApiError::NotFound(format!("mentee {mentee_id}")));
        }
        Ok(get_language(conn, language_id)?)
    })
    .await?;

    let spooled = SpooledAudio::write(state, &clip).await?;
    tracing::debug!(
        path = %spooled.path().display(),
        bytes = clip.bytes.len(),
        "query audio spooled"
    );

    let transcript = transcribe_or_sentinel(state, &clip, &language).await?;
    let career = state.classifier.classify(&transcript).await?;

    let new_query = NewQuery {
        mentee_id,
        career: career.clone(),
        query_text: transcript,
        audio_url: None,
        language_id: language.id,
    };
    let (query, matched) = with_conn(state, move |conn| {
        let matched = find_matching_mentors(conn, &career)?;
        let ids: Vec<i64> = matched.iter().map(|m| m.user_id).collect();
        let query = create_query_with_fanout(conn, &new_query, &ids)?;
        Ok((query, matched))
    })
    .await?;

    tracing::info!(
        query_id = query.id,
        career = %query.career,
        matched = matched.len(),
        status = %query.status,
        "voice query processed"
    );

    Ok(SubmittedQuery { query, matched })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_extension_prefers_sane_names() {
        assert_eq!(clip_extension(&AudioClip::new(vec![1], "q.WEBM")), "webm");
        assert_eq!(
            clip_extension(&AudioClip::new(b"RIFF\0\0\0\0WAVE".to_vec(), "blob")),
            "wav"
        );
        assert_eq!(
            clip_extension(&AudioClip::new(b"OggS".to_vec(), "x.../../etc")),
            "ogg"
        );
    }

    #[test]
    fn form_ids_are_validated() {
        let mut form = UploadForm::default();
        form.fields.insert("mentee_id".to_string(), " 42 ".to_string());
        form.fields.insert("language_id".to_string(), "hindi".to_string());
        form.fields.insert("blank".to_string(), "  ".to_string());

        assert_eq!(form.required_id("mentee_id").unwrap(), 42);
        assert!(matches!(
            form.optional_id("language_id"),
            Err(ApiError::BadRequest(_))
        ));
        assert_eq!(form.optional_id("blank").unwrap(), None);
        assert!(matches!(
            form.required_id("missing"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(form.take_audio(), Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn spool_guard_schedules_removal() {
        let dir = tempfile::tempdir().unwrap();
        let (cleanup, mut queue) = CleanupHandle::channel();
        let path = write_clip(dir.path(), &AudioClip::new(vec![1, 2], "a.wav"))
            .await
            .unwrap();
        assert!(path.exists());

        drop(SpooledAudio {
            path: path.clone(),
            cleanup,
        });

        let job = queue.recv().await.expect("cleanup job");
        assert_eq!(job.paths, vec![path]);
    }
}
