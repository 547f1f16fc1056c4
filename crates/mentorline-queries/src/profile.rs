//! Read-only lookups for users, languages and podcasts.

use crate::QueryError;
use mentorline_types::Language;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// A mentor's podcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Podcast {
    pub id: i64,
    pub mentor_id: i64,
    pub title: String,
    pub description: String,
    pub created_at: String,
}

/// A single recorded podcast episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub podcast_id: i64,
    pub title: String,
    pub audio_url: String,
    /// Spoken text, used for translation. Episodes without one play as recorded.
    pub transcript: Option<String>,
    /// Language the episode was recorded in.
    pub language_id: i64,
    pub created_at: String,
}

/// Returns a user's display name, if the user exists.
pub fn user_display_name(conn: &Connection, user_id: i64) -> Result<Option<String>, QueryError> {
    let name = conn
        .query_row(
            "SELECT name FROM users WHERE id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(name)
}

/// Resolves a language id, falling back to English for unknown ids.
pub fn get_language(conn: &Connection, language_id: i64) -> Result<Language, QueryError> {
    let language = conn
        .query_row(
            "SELECT id, code, name FROM languages WHERE id = ?1",
            params![language_id],
            map_row_to_language,
        )
        .optional()?;

    Ok(language.unwrap_or_else(|| {
        tracing::debug!(language_id, "unknown language id, using fallback");
        Language::fallback()
    }))
}

/// Lists the language catalogue in id order.
pub fn list_languages(conn: &Connection) -> Result<Vec<Language>, QueryError> {
    let mut stmt = conn.prepare("SELECT id, code, name FROM languages ORDER BY id ASC")?;
    let languages = stmt
        .query_map([], map_row_to_language)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(languages)
}

/// Resolves the language a query was submitted in.
pub fn query_language(conn: &Connection, query_id: i64) -> Result<Language, QueryError> {
    let language_id: i64 = conn
        .query_row(
            "SELECT language_id FROM queries WHERE id = ?1",
            params![query_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| QueryError::NotFound(format!("query {query_id}")))?;

    get_language(conn, language_id)
}

/// Returns the user's first preferred language by catalogue order.
pub fn preferred_language(conn: &Connection, user_id: i64) -> Result<Option<Language>, QueryError> {
    let language = conn
        .query_row(
            "SELECT l.id, l.code, l.name
             FROM user_languages ul
             JOIN languages l ON l.id = ul.language_id
             WHERE ul.user_id = ?1
             ORDER BY l.id ASC
             LIMIT 1",
            params![user_id],
            map_row_to_language,
        )
        .optional()?;
    Ok(language)
}

/// Fetches a podcast by id.
pub fn get_podcast(conn: &Connection, podcast_id: i64) -> Result<Podcast, QueryError> {
    conn.query_row(
        "SELECT id, mentor_id, title, description, created_at FROM podcasts WHERE id = ?1",
        params![podcast_id],
        |row| {
            Ok(Podcast {
                id: row.get(0)?,
                mentor_id: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
                created_at: row.get(4)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| QueryError::NotFound(format!("podcast {podcast_id}")))
}

/// Lists a podcast's episodes oldest first.
pub fn list_episodes(conn: &Connection, podcast_id: i64) -> Result<Vec<Episode>, QueryError> {
    let mut stmt = conn.prepare(
        "SELECT id, podcast_id, title, audio_url, transcript, language_id, created_at
         FROM podcast_episodes
         WHERE podcast_id = ?1
         ORDER BY created_at ASC, id ASC",
    )?;

    let rows = stmt.query_map(params![podcast_id], map_row_to_episode)?;
    let mut episodes = Vec::new();
    for row in rows {
        episodes.push(row?);
    }
    Ok(episodes)
}

fn map_row_to_language(row: &Row) -> rusqlite::Result<Language> {
    Ok(Language {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
    })
}

fn map_row_to_episode(row: &Row) -> rusqlite::Result<Episode> {
    Ok(Episode {
        id: row.get(0)?,
        podcast_id: row.get(1)?,
        title: row.get(2)?,
        audio_url: row.get(3)?,
        transcript: row.get(4)?,
        language_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}
