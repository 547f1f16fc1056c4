//! Podcast playback in the listener's language.

use crate::api::{with_conn, ApiError};
use crate::{upload_url, AppState, GENERATED_SUBDIR};
use axum::extract::{Extension, Json, Path, Query};
use mentorline_queries::{get_language, get_podcast, list_episodes, preferred_language};
use mentorline_types::Language;
use mentorline_voice::VoiceError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Query parameters for `GET /api/podcast-episodes/{podcastId}`.
#[derive(Debug, Deserialize)]
pub struct EpisodeParams {
    pub mentee_id: Option<i64>,
}

/// One playable episode.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlayableEpisode {
    pub id: i64,
    pub title: String,
    pub audio_url: String,
    /// Whether `audio_url` points at a translated rendition.
    pub translated: bool,
}

/// A generated rendition and the transcript it was made from.
#[derive(Debug, Clone)]
struct Rendition {
    transcript: String,
    file_name: String,
}

type RenditionSlot = Arc<Mutex<Option<Rendition>>>;

/// Translated episode audio, one file per episode and target language.
///
/// Each slot has its own lock, so concurrent listeners of the same episode
/// wait for one synthesis instead of starting their own.
#[derive(Clone, Default)]
pub struct RenditionCache {
    slots: Arc<Mutex<HashMap<(i64, String), RenditionSlot>>>,
}

impl RenditionCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, episode_id: i64, language_code: &str) -> RenditionSlot {
        let mut slots = self.slots.lock().await;
        slots
            .entry((episode_id, language_code.to_string()))
            .or_default()
            .clone()
    }
}

/// Handler for `GET /api/podcast-episodes/{podcastId}?mentee_id=`.
///
/// Episodes recorded in a language other than the mentee's preferred one
/// are translated and re-synthesized once per target language; later
/// requests reuse that file. An episode whose translation fails falls back
/// to its original recording.
pub async fn podcast_episodes_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(podcast_id): Path<i64>,
    Query(params): Query<EpisodeParams>,
) -> Result<Json<Vec<PlayableEpisode>>, ApiError> {
    let (episodes, target) = with_conn(&state, move |conn| {
        get_podcast(conn, podcast_id)?;
        let mut episodes = Vec::new();
        for episode in list_episodes(conn, podcast_id)? {
            let source = get_language(conn, episode.language_id)?;
            episodes.push((episode, source));
        }
        let target = match params.mentee_id {
            Some(mentee_id) => preferred_language(conn, mentee_id)?,
            None => None,
        };
        Ok((episodes, target))
    })
    .await?;

    let mut playable = Vec::with_capacity(episodes.len());
    for (episode, source) in episodes {
        let transcript = episode
            .transcript
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let rendition = match (&target, transcript) {
            (Some(target), Some(transcript)) if !source.same_code(target) => {
                match rendition_for(&state, episode.id, transcript, &source, target).await {
                    Ok(url) => Some(url),
                    Err(e) => {
                        tracing::warn!(
                            episode_id = episode.id,
                            target = %target.code,
                            error = %e,
                            "episode translation failed, serving original"
                        );
                        None
                    }
                }
            }
            // Same language, no preference, or nothing to translate.
            _ => None,
        };

        playable.push(PlayableEpisode {
            id: episode.id,
            title: episode.title,
            translated: rendition.is_some(),
            audio_url: rendition.unwrap_or(episode.audio_url),
        });
    }

    Ok(Json(playable))
}

async fn rendition_for(
    state: &AppState,
    episode_id: i64,
    transcript: &str,
    source: &Language,
    target: &Language,
) -> Result<String, VoiceError> {
    let slot = state.renditions.slot(episode_id, &target.code).await;
    let mut cached = slot.lock().await;

    if let Some(rendition) = cached.as_ref() {
        let path = state.synthesizer.output_dir().join(&rendition.file_name);
        let on_disk = tokio::fs::try_exists(&path).await.unwrap_or(false);
        if on_disk && rendition.transcript == transcript {
            return Ok(upload_url(GENERATED_SUBDIR, &rendition.file_name));
        }
    }

    let translated = state.translator.translate(transcript, source, target).await?;
    let audio = state.synthesizer.synthesize(&translated, target).await?;

    let replaced = cached.replace(Rendition {
        transcript: transcript.to_string(),
        file_name: audio.file_name.clone(),
    });
    if let Some(stale) = replaced {
        let stale_path = state.synthesizer.output_dir().join(stale.file_name);
        // Listeners may still be streaming the old file.
        let grace = state.synthesizer.config().cleanup_delay();
        state.cleanup.schedule(vec![stale_path], grace);
    }

    tracing::debug!(
        episode_id,
        target = %target.code,
        file = %audio.file_name,
        "episode rendition generated"
    );
    Ok(upload_url(GENERATED_SUBDIR, &audio.file_name))
}
