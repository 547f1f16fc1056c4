//! Shared setup for the server integration tests: scripted upstream
//! services, a seeded file-backed database and request helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use mentorline_db::{create_pool, run_migrations, DbPool, DbRuntimeSettings};
use mentorline_server::cleanup::start_cleanup_task;
use mentorline_server::{app, AppState, Upstreams};
use mentorline_types::Language;
use mentorline_voice::{
    AudioClip, ChatTurn, Classifier, Coach, SpeechSynthesizer, SynthesisConfig, Transcriber,
    Translator, VoiceError,
};
use rusqlite::params;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

pub const MENTEE_HINDI: i64 = 1;
pub const MENTEE_NO_PREFERENCE: i64 = 2;
pub const MENTOR_RAVI: i64 = 10;
pub const MENTOR_MEERA: i64 = 11;
pub const MENTOR_AWAY: i64 = 12;

/// What the scripted transcriber does with every clip.
#[derive(Debug, Clone)]
pub enum Transcript {
    Text(String),
    Silent,
    Unavailable,
    Timeout,
}

pub struct ScriptedTranscriber(pub Transcript);

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(
        &self,
        _clip: &AudioClip,
        _language: &Language,
    ) -> Result<String, VoiceError> {
        match &self.0 {
            Transcript::Text(text) => Ok(text.clone()),
            Transcript::Silent => Err(VoiceError::EmptyTranscript),
            Transcript::Unavailable => Err(VoiceError::UpstreamUnavailable("stt down".to_string())),
            Transcript::Timeout => Err(VoiceError::UpstreamTimeout(30)),
        }
    }
}

/// Returns a fixed label and remembers every input.
pub struct RecordingClassifier {
    pub label: String,
    pub inputs: Mutex<Vec<String>>,
}

impl RecordingClassifier {
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for RecordingClassifier {
    async fn classify(&self, text: &str) -> Result<String, VoiceError> {
        self.inputs.lock().unwrap().push(text.to_string());
        Ok(self.label.clone())
    }
}

pub struct EchoCoach;

#[async_trait]
impl Coach for EchoCoach {
    async fn reply(
        &self,
        history: &[ChatTurn],
        message: &str,
        language: &Language,
    ) -> Result<String, VoiceError> {
        Ok(format!(
            "[{}] after {} turns: {}",
            language.code,
            history.len(),
            message
        ))
    }
}

pub struct TaggingTranslator {
    pub fail: bool,
}

#[async_trait]
impl Translator for TaggingTranslator {
    async fn translate(
        &self,
        text: &str,
        _source: &Language,
        target: &Language,
    ) -> Result<String, VoiceError> {
        if self.fail {
            return Err(VoiceError::UpstreamUnavailable("translate down".to_string()));
        }
        Ok(format!("[{}] {}", target.code, text))
    }
}

/// Produces an MP3-looking buffer carrying the text.
pub struct FakeTts;

#[async_trait]
impl SpeechSynthesizer for FakeTts {
    async fn synthesize(&self, text: &str, _language: &Language) -> Result<Vec<u8>, VoiceError> {
        let mut audio = b"ID3".to_vec();
        audio.extend_from_slice(text.as_bytes());
        Ok(audio)
    }
}

#[derive(Debug, Clone)]
pub struct Script {
    pub transcript: Transcript,
    pub label: String,
    pub translator_fails: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            transcript: Transcript::Text("How do I prepare for JEE physics?".to_string()),
            label: "JEE".to_string(),
            translator_fails: false,
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    pub classifier: Arc<RecordingClassifier>,
    pub dir: TempDir,
}

impl TestApp {
    pub fn upload_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    pub fn spool_dir(&self) -> PathBuf {
        self.dir.path().join("spool")
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn get_bytes(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_raw_json(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Posts a multipart form. `audio` is `(file name, bytes)`.
    pub async fn post_multipart(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        audio: Option<(&str, &[u8])>,
    ) -> (StatusCode, Value) {
        const BOUNDARY: &str = "mentorline-test-boundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = audio {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&body).into_owned())
            })
        };
        (status, json)
    }
}

/// A WAV header is enough for the server; the transcriber is scripted.
pub fn wav_bytes() -> Vec<u8> {
    let mut bytes = b"RIFF\x24\0\0\0WAVE".to_vec();
    bytes.extend_from_slice(&[0u8; 32]);
    bytes
}

pub fn file_pool(dir: &TempDir) -> DbPool {
    let path = dir.path().join("mentorline.db");
    let settings = DbRuntimeSettings {
        busy_timeout_ms: 10_000,
        pool_max_size: 8,
    };
    let pool = create_pool(path.to_str().expect("utf-8 path"), settings).expect("pool");
    let conn = pool.get().expect("conn");
    run_migrations(&conn).expect("migrations");
    pool
}

/// Two mentees (one preferring Hindi), two available JEE mentors and one
/// unavailable mentor.
pub fn seed(pool: &DbPool) {
    let conn = pool.get().expect("conn");
    for (id, name, role) in [
        (MENTEE_HINDI, "Asha", "mentee"),
        (MENTEE_NO_PREFERENCE, "Kiran", "mentee"),
        (MENTOR_RAVI, "Ravi", "mentor"),
        (MENTOR_MEERA, "Meera", "mentor"),
        (MENTOR_AWAY, "Dev", "mentor"),
    ] {
        conn.execute(
            "INSERT INTO users (id, name, role) VALUES (?1, ?2, ?3)",
            params![id, name, role],
        )
        .expect("user");
    }
    conn.execute(
        "INSERT INTO user_languages (user_id, language_id) VALUES (?1, 2)",
        params![MENTEE_HINDI],
    )
    .expect("language preference");
    for (id, expertise, available) in [
        (MENTOR_RAVI, r#"["JEE"]"#, true),
        (MENTOR_MEERA, r#"["JEE", "NEET"]"#, true),
        (MENTOR_AWAY, r#"["JEE"]"#, false),
    ] {
        conn.execute(
            "INSERT INTO mentors (user_id, expertise_json, available) VALUES (?1, ?2, ?3)",
            params![id, expertise, available],
        )
        .expect("mentor");
    }
}

/// Inserts a query directly, bypassing the voice pipeline.
pub fn insert_query(pool: &DbPool, mentee_id: i64, language_id: i64) -> i64 {
    let conn = pool.get().expect("conn");
    conn.execute(
        "INSERT INTO queries (mentee_id, career, query_text, status, language_id)
         VALUES (?1, 'JEE', 'seeded question', 'pending', ?2)",
        params![mentee_id, language_id],
    )
    .expect("query");
    conn.last_insert_rowid()
}

pub fn spawn_app(script: Script) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = file_pool(&dir);
    seed(&pool);

    let classifier = Arc::new(RecordingClassifier {
        label: script.label.clone(),
        inputs: Mutex::new(Vec::new()),
    });
    let upstreams = Upstreams {
        transcriber: Arc::new(ScriptedTranscriber(script.transcript)),
        classifier: classifier.clone(),
        coach: Arc::new(EchoCoach),
        translator: Arc::new(TaggingTranslator {
            fail: script.translator_fails,
        }),
        tts: Arc::new(FakeTts),
    };

    let (state, queue) = AppState::new(
        pool.clone(),
        dir.path().join("uploads"),
        dir.path().join("spool"),
        upstreams,
        SynthesisConfig::default(),
    );
    tokio::spawn(start_cleanup_task(queue));

    TestApp {
        router: app(state),
        pool,
        classifier,
        dir,
    }
}

/// Number of regular files directly under `dir` (0 if it does not exist).
pub fn file_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().is_file())
                .count()
        })
        .unwrap_or(0)
}
