//! Server configuration loading from file and environment variables.

use mentorline_voice::{SynthesisConfig, UpstreamConfig};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Where uploaded and generated audio lives.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Hosted speech and completion services.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Chunked speech synthesis tunables.
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "mentorline_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// File storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory served at `/uploads`.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// Scratch directory for incoming clips that are not kept.
    #[serde(default = "default_spool_dir")]
    pub spool_dir: String,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    5000
}

fn default_db_path() -> String {
    "mentorline.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_spool_dir() -> String {
    "spool".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            spool_dir: default_spool_dir(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `MENTORLINE_HOST` overrides `server.host`
/// - `MENTORLINE_PORT` overrides `server.port`
/// - `MENTORLINE_DB_PATH` overrides `database.path`
/// - `MENTORLINE_LOG_LEVEL` overrides `logging.level`
/// - `MENTORLINE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `MENTORLINE_UPLOAD_DIR` overrides `storage.upload_dir`
/// - `SARVAM_API_KEY` overrides `upstream.speech_api_key`
/// - `GROQ_API_KEY` overrides `upstream.completion_api_key`
/// - `MENTORLINE_FFMPEG_PATH` overrides `synthesis.ffmpeg_binary`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("MENTORLINE_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("MENTORLINE_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(db_path) = var("MENTORLINE_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("MENTORLINE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("MENTORLINE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(dir) = var("MENTORLINE_UPLOAD_DIR") {
        config.storage.upload_dir = dir;
    }
    if let Some(key) = var("SARVAM_API_KEY") {
        config.upstream.speech_api_key = key;
    }
    if let Some(key) = var("GROQ_API_KEY") {
        config.upstream.completion_api_key = key;
    }
    if let Some(ffmpeg) = var("MENTORLINE_FFMPEG_PATH") {
        config.synthesis.ffmpeg_binary = ffmpeg;
    }
}
