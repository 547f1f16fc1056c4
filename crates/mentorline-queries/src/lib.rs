//! Query lifecycle, mentor matching and conversation storage.
//!
//! This crate owns every row the voice-query pipeline writes: the query
//! record and its state machine, the per-mentor fan-out rows and their
//! accept/reject transitions, and the append-only chat log. It also carries
//! the mentor matcher and the read-only lookups (display names, languages,
//! podcast episodes) the server needs around them.
//!
//! All functions are synchronous and take a `rusqlite::Connection`; the
//! server calls them from `spawn_blocking`.

pub mod chat;
pub mod lifecycle;
pub mod matcher;
pub mod profile;

pub use chat::{append_message, list_messages, ChatMessage, NewChatMessage};
pub use lifecycle::{
    assigned_mentor_for, create_query_with_fanout, get_query, list_fanout,
    list_pending_for_mentor, respond, room_id_for_query, Assignment, MentorResponse, NewQuery,
    PendingRequest, Query,
};
pub use matcher::{find_matching_mentors, load_available_mentors, match_mentors};
pub use profile::{
    get_language, get_podcast, list_episodes, list_languages, preferred_language,
    query_language, user_display_name, Episode, Podcast,
};

use mentorline_types::ParseStatusError;
use thiserror::Error;

/// Errors that can occur during query, matcher and chat operations.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt row: {0}")]
    InvalidStatus(#[from] ParseStatusError),
}

/// Converts a stored status string inside a row mapper.
pub(crate) fn parse_column<T>(value: String, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = ParseStatusError>,
{
    value.parse().map_err(|e: ParseStatusError| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
