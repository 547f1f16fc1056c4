//! Mentorline server library logic.
//!
//! Hosts the HTTP and WebSocket surface of the voice-query pipeline: query
//! intake, mentor accept/reject, per-query chat, the automated coach,
//! translated podcast playback and the call signaling relay.

pub mod api;
pub mod api_chat;
pub mod api_podcast;
pub mod api_query;
pub mod api_signal;
pub mod cleanup;
pub mod config;
pub mod pipeline;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use mentorline_db::DbPool;
use mentorline_types::Language;
use mentorline_voice::{
    assembler_for, ChunkedSynthesizer, Classifier, CleanupHandle, CleanupQueue, Coach,
    CompletionClassifier, CompletionClient, CompletionCoach, SarvamSynthesizer,
    SarvamTranscriber, SarvamTranslator, SpeechSynthesizer, SynthesisConfig, Transcriber,
    Translator, UpstreamConfig,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// URL prefix under which `upload_dir` is served.
pub const UPLOADS_PREFIX: &str = "/uploads";

/// Subdirectory of `upload_dir` holding synthesized speech.
pub const GENERATED_SUBDIR: &str = "generated";

/// Subdirectory of `upload_dir` holding recorded chat voice messages.
pub const VOICE_SUBDIR: &str = "voice";

/// The hosted services the pipeline talks to.
#[derive(Clone)]
pub struct Upstreams {
    pub transcriber: Arc<dyn Transcriber>,
    pub classifier: Arc<dyn Classifier>,
    pub coach: Arc<dyn Coach>,
    pub translator: Arc<dyn Translator>,
    pub tts: Arc<dyn SpeechSynthesizer>,
}

impl Upstreams {
    /// Builds the production clients from configuration.
    pub fn from_config(config: &UpstreamConfig, speaker: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mentorline/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let completion = CompletionClient::new(client.clone(), config);

        Ok(Self {
            transcriber: Arc::new(SarvamTranscriber::new(client.clone(), config)),
            classifier: Arc::new(CompletionClassifier::new(completion.clone())),
            coach: Arc::new(CompletionCoach::new(completion)),
            translator: Arc::new(SarvamTranslator::new(client.clone(), config)),
            tts: Arc::new(SarvamSynthesizer::new(client, config, speaker)),
        })
    }
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Directory served at `/uploads`.
    pub upload_dir: PathBuf,
    /// Scratch directory for incoming clips that are not kept.
    pub spool_dir: PathBuf,
    pub transcriber: Arc<dyn Transcriber>,
    pub classifier: Arc<dyn Classifier>,
    pub coach: Arc<dyn Coach>,
    pub translator: Arc<dyn Translator>,
    /// Long-text synthesis writing into `upload_dir/generated`.
    pub synthesizer: Arc<ChunkedSynthesizer>,
    /// Translated podcast audio reused across requests.
    pub renditions: api_podcast::RenditionCache,
    /// Signaling rooms for live calls.
    pub rooms: api_signal::RoomRegistry,
    /// Delayed file removal.
    pub cleanup: CleanupHandle,
}

impl AppState {
    /// Wires the state together and returns the queue the cleanup task drains.
    pub fn new(
        pool: DbPool,
        upload_dir: impl Into<PathBuf>,
        spool_dir: impl Into<PathBuf>,
        upstreams: Upstreams,
        synthesis: SynthesisConfig,
    ) -> (Self, CleanupQueue) {
        let upload_dir = upload_dir.into();
        let (cleanup, queue) = CleanupHandle::channel();
        let assembler = assembler_for(&synthesis);
        let synthesizer = ChunkedSynthesizer::new(
            upstreams.tts,
            assembler,
            synthesis,
            upload_dir.join(GENERATED_SUBDIR),
            cleanup.clone(),
        );

        let state = Self {
            pool,
            upload_dir,
            spool_dir: spool_dir.into(),
            transcriber: upstreams.transcriber,
            classifier: upstreams.classifier,
            coach: upstreams.coach,
            translator: upstreams.translator,
            synthesizer: Arc::new(synthesizer),
            renditions: api_podcast::RenditionCache::new(),
            rooms: api_signal::RoomRegistry::new(),
            cleanup,
        };
        (state, queue)
    }
}

/// Public URL of a file stored under `upload_dir/<subdir>`.
pub fn upload_url(subdir: &str, file_name: &str) -> String {
    format!("{UPLOADS_PREFIX}/{subdir}/{file_name}")
}

/// Maximum request body size for JSON routes (1 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Maximum request body size for audio uploads (25 MiB).
const MAX_AUDIO_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Handler for `GET /api/languages`.
async fn list_languages_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Language>>, api::ApiError> {
    let languages =
        api::with_conn(&state, |conn| Ok(mentorline_queries::list_languages(conn)?)).await?;
    Ok(Json(languages))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    // Audio uploads need a larger body limit than the JSON routes.
    let upload_routes = Router::new()
        .route("/api/query", post(api_query::submit_query_handler))
        .route("/api/chat/voice", post(api_chat::voice_message_handler))
        .route("/api/mentor-chat", post(api_chat::mentor_chat_handler))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BODY_BYTES));

    let router = Router::new()
        .route("/health", get(health))
        .route("/api/languages", get(list_languages_handler))
        .route(
            "/api/requests/mentor/{mentorId}",
            get(api_query::pending_requests_handler),
        )
        .route("/api/respond", post(api_query::respond_handler))
        .route(
            "/api/assigned-mentor/{menteeId}",
            get(api_query::assigned_mentor_handler),
        )
        .route("/api/chat", post(api_chat::post_message_handler))
        .route("/api/chat/{queryId}", get(api_chat::list_messages_handler))
        .route(
            "/api/podcast-episodes/{podcastId}",
            get(api_podcast::podcast_episodes_handler),
        )
        .route("/ws/signal", get(api_signal::signal_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .merge(upload_routes);

    tracing::info!(path = %state.upload_dir.display(), "serving uploaded files at /uploads");
    let router = router.nest_service(UPLOADS_PREFIX, ServeDir::new(&state.upload_dir));

    router
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
