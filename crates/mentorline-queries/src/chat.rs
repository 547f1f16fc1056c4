//! Append-only conversation log attached to a query.

use crate::QueryError;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

/// A stored chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub query_id: i64,
    pub sender_id: i64,
    /// Text body, or `[voice]` for audio-only messages.
    pub message: String,
    pub audio_url: Option<String>,
    pub created_at: String,
}

/// Parameters for appending a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatMessage {
    pub query_id: i64,
    pub sender_id: i64,
    pub message: String,
    pub audio_url: Option<String>,
}

fn ensure_query_exists(conn: &Connection, query_id: i64) -> Result<(), QueryError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM queries WHERE id = ?1)",
        params![query_id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(QueryError::NotFound(format!("query {query_id}")))
    }
}

/// Appends a message to a query's conversation.
pub fn append_message(conn: &Connection, msg: &NewChatMessage) -> Result<ChatMessage, QueryError> {
    ensure_query_exists(conn, msg.query_id)?;

    let message = conn.query_row(
        "INSERT INTO chat_messages (query_id, sender_id, message, audio_url)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING id, query_id, sender_id, message, audio_url, created_at",
        params![msg.query_id, msg.sender_id, msg.message, msg.audio_url],
        map_row_to_message,
    )?;

    tracing::debug!(
        query_id = message.query_id,
        message_id = message.id,
        has_audio = message.audio_url.is_some(),
        "chat message stored"
    );

    Ok(message)
}

/// Lists a query's messages oldest first, ties broken by id.
pub fn list_messages(conn: &Connection, query_id: i64) -> Result<Vec<ChatMessage>, QueryError> {
    ensure_query_exists(conn, query_id)?;

    let mut stmt = conn.prepare(
        "SELECT id, query_id, sender_id, message, audio_url, created_at
         FROM chat_messages
         WHERE query_id = ?1
         ORDER BY created_at ASC, id ASC",
    )?;

    let rows = stmt.query_map(params![query_id], map_row_to_message)?;
    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

fn map_row_to_message(row: &Row) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.get(0)?,
        query_id: row.get(1)?,
        sender_id: row.get(2)?,
        message: row.get(3)?,
        audio_url: row.get(4)?,
        created_at: row.get(5)?,
    })
}
