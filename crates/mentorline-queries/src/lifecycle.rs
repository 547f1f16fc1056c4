//! Query records, mentor fan-out rows and the accept/reject state machine.
//!
//! A query starts `pending` when at least one mentor matched and `chatbot`
//! otherwise. The first mentor to accept moves it to `resolved`. The accept is
//! a conditional update inside an `IMMEDIATE` transaction, and the partial
//! unique index on accepted rows backs it up, so concurrent accepts produce a
//! single winner.

use crate::{parse_column, QueryError};
use mentorline_types::{
    MentorSummary, QueryStatus, RespondAction, RespondOutcome, ResponseStatus,
};
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use serde::{Deserialize, Serialize};

/// A mentee query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub id: i64,
    pub mentee_id: i64,
    /// Classifier label, e.g. `NEET`.
    pub career: String,
    /// Transcript of the mentee's audio, or the not-found sentinel.
    pub query_text: String,
    /// Public URL of the uploaded clip, if it was kept.
    pub audio_url: Option<String>,
    pub status: QueryStatus,
    pub language_id: i64,
    /// Creation timestamp (ISO 8601, millisecond precision).
    pub created_at: String,
}

/// Parameters for persisting a new query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuery {
    pub mentee_id: i64,
    pub career: String,
    pub query_text: String,
    pub audio_url: Option<String>,
    pub language_id: i64,
}

/// One mentor's fan-out row for a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentorResponse {
    pub id: i64,
    pub query_id: i64,
    pub mentor_id: i64,
    pub status: ResponseStatus,
    pub responded_at: Option<String>,
}

/// A query waiting on a specific mentor's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    /// The query id.
    pub id: i64,
    pub career: String,
    pub mentee_name: String,
    pub transcription: String,
}

/// Where a mentee's latest query stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Assignment {
    Pending {
        query_id: i64,
    },
    Assigned {
        query_id: i64,
        room_id: String,
        mentor: MentorSummary,
    },
}

const QUERY_COLUMNS: &str =
    "id, mentee_id, career, query_text, audio_url, status, language_id, created_at";

const NOW_MS: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// Derives the signaling room for an accepted query.
pub fn room_id_for_query(query_id: i64) -> String {
    format!("query-{query_id}")
}

/// Inserts a query and one pending response row per matched mentor.
///
/// Both writes happen in one transaction. The status is derived from the
/// number of mentors: `pending` for one or more, `chatbot` for none.
pub fn create_query_with_fanout(
    conn: &Connection,
    query: &NewQuery,
    mentor_ids: &[i64],
) -> Result<Query, QueryError> {
    let tx = conn.unchecked_transaction()?;

    let mentee_exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        params![query.mentee_id],
        |row| row.get(0),
    )?;
    if !mentee_exists {
        return Err(QueryError::NotFound(format!("mentee {}", query.mentee_id)));
    }

    let status = QueryStatus::for_match_count(mentor_ids.len());
    let sql = format!(
        "INSERT INTO queries (mentee_id, career, query_text, audio_url, status, language_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING {QUERY_COLUMNS}"
    );
    let created = tx.query_row(
        &sql,
        params![
            query.mentee_id,
            query.career,
            query.query_text,
            query.audio_url,
            status.as_str(),
            query.language_id,
        ],
        map_row_to_query,
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO mentor_query_responses (query_id, mentor_id, status)
             VALUES (?1, ?2, 'pending')",
        )?;
        for mentor_id in mentor_ids {
            stmt.execute(params![created.id, mentor_id])?;
        }
    }

    tx.commit()?;

    tracing::info!(
        query_id = created.id,
        mentee_id = created.mentee_id,
        career = %created.career,
        status = %created.status,
        fanout = mentor_ids.len(),
        "query created"
    );

    Ok(created)
}

/// Fetches a query by id.
pub fn get_query(conn: &Connection, query_id: i64) -> Result<Query, QueryError> {
    let sql = format!("SELECT {QUERY_COLUMNS} FROM queries WHERE id = ?1");
    conn.query_row(&sql, params![query_id], map_row_to_query)
        .optional()?
        .ok_or_else(|| QueryError::NotFound(format!("query {query_id}")))
}

/// Lists a query's fan-out rows ordered by mentor id.
pub fn list_fanout(conn: &Connection, query_id: i64) -> Result<Vec<MentorResponse>, QueryError> {
    let mut stmt = conn.prepare(
        "SELECT id, query_id, mentor_id, status, responded_at
         FROM mentor_query_responses
         WHERE query_id = ?1
         ORDER BY mentor_id ASC",
    )?;

    let rows = stmt.query_map(params![query_id], map_row_to_response)?;
    let mut responses = Vec::new();
    for row in rows {
        responses.push(row?);
    }
    Ok(responses)
}

/// Lists queries still waiting on `mentor_id`.
///
/// Queries another mentor already won are excluded even though this
/// mentor's row is still `pending`.
pub fn list_pending_for_mentor(
    conn: &Connection,
    mentor_id: i64,
) -> Result<Vec<PendingRequest>, QueryError> {
    let mut stmt = conn.prepare(
        "SELECT q.id, q.career, COALESCE(NULLIF(u.name, ''), 'Unknown'), q.query_text
         FROM mentor_query_responses r
         JOIN queries q ON q.id = r.query_id
         LEFT JOIN users u ON u.id = q.mentee_id
         WHERE r.mentor_id = ?1 AND r.status = 'pending' AND q.status = 'pending'
         ORDER BY q.created_at ASC, q.id ASC",
    )?;

    let rows = stmt.query_map(params![mentor_id], |row| {
        Ok(PendingRequest {
            id: row.get(0)?,
            career: row.get(1)?,
            mentee_name: row.get(2)?,
            transcription: row.get(3)?,
        })
    })?;

    let mut pending = Vec::new();
    for row in rows {
        pending.push(row?);
    }
    Ok(pending)
}

/// Applies a mentor's accept or reject.
///
/// Repeating the same call is harmless and reports `AlreadyAccepted` or
/// `AlreadyRejected`. An accept after another mentor won reports
/// `Superseded` and changes nothing. Rejecting a row the mentor already
/// accepted reports `Locked` and leaves the assignment in place.
pub fn respond(
    conn: &Connection,
    query_id: i64,
    mentor_id: i64,
    action: RespondAction,
) -> Result<RespondOutcome, QueryError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let current: ResponseStatus = tx
        .query_row(
            "SELECT status FROM mentor_query_responses WHERE query_id = ?1 AND mentor_id = ?2",
            params![query_id, mentor_id],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .ok_or_else(|| {
            QueryError::NotFound(format!("response for query {query_id} and mentor {mentor_id}"))
        })?
        .parse()?;

    let outcome = match (action, current) {
        (RespondAction::Accept, ResponseStatus::Accepted) => RespondOutcome::AlreadyAccepted,
        (RespondAction::Accept, _) => try_accept(&tx, query_id, mentor_id)?,
        (RespondAction::Reject, ResponseStatus::Rejected) => RespondOutcome::AlreadyRejected,
        (RespondAction::Reject, ResponseStatus::Accepted) => RespondOutcome::Locked,
        (RespondAction::Reject, ResponseStatus::Pending) => {
            let sql = format!(
                "UPDATE mentor_query_responses
                 SET status = 'rejected', responded_at = {NOW_MS}
                 WHERE query_id = ?1 AND mentor_id = ?2 AND status = 'pending'"
            );
            tx.execute(&sql, params![query_id, mentor_id])?;
            RespondOutcome::Rejected
        }
    };

    tx.commit()?;

    tracing::info!(query_id, mentor_id, ?action, ?outcome, "mentor responded");
    Ok(outcome)
}

fn try_accept(
    tx: &Transaction<'_>,
    query_id: i64,
    mentor_id: i64,
) -> Result<RespondOutcome, QueryError> {
    let sql = format!(
        "UPDATE mentor_query_responses
         SET status = 'accepted', responded_at = {NOW_MS}
         WHERE query_id = ?1 AND mentor_id = ?2 AND status <> 'accepted'
           AND NOT EXISTS (
               SELECT 1 FROM mentor_query_responses
               WHERE query_id = ?1 AND status = 'accepted'
           )"
    );

    match tx.execute(&sql, params![query_id, mentor_id]) {
        Ok(1) => {
            tx.execute(
                "UPDATE queries SET status = 'resolved' WHERE id = ?1",
                params![query_id],
            )?;
            Ok(RespondOutcome::Accepted)
        }
        Ok(_) => Ok(RespondOutcome::Superseded),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation =>
        {
            tracing::debug!(query_id, mentor_id, "accept refused by unique index");
            Ok(RespondOutcome::Superseded)
        }
        Err(e) => Err(e.into()),
    }
}

/// Reports the mentor assigned to a mentee's newest query.
///
/// Returns `NotFound` when the mentee has never submitted a query.
pub fn assigned_mentor_for(conn: &Connection, mentee_id: i64) -> Result<Assignment, QueryError> {
    let query_id: i64 = conn
        .query_row(
            "SELECT id FROM queries WHERE mentee_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
            params![mentee_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| QueryError::NotFound(format!("query for mentee {mentee_id}")))?;

    let mentor = conn
        .query_row(
            "SELECT r.mentor_id, COALESCE(NULLIF(u.name, ''), 'Unknown')
             FROM mentor_query_responses r
             LEFT JOIN users u ON u.id = r.mentor_id
             WHERE r.query_id = ?1 AND r.status = 'accepted'
             ORDER BY r.responded_at ASC, r.id ASC
             LIMIT 1",
            params![query_id],
            |row| {
                Ok(MentorSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?;

    Ok(match mentor {
        Some(mentor) => Assignment::Assigned {
            query_id,
            room_id: room_id_for_query(query_id),
            mentor,
        },
        None => Assignment::Pending { query_id },
    })
}

fn map_row_to_query(row: &Row) -> rusqlite::Result<Query> {
    Ok(Query {
        id: row.get(0)?,
        mentee_id: row.get(1)?,
        career: row.get(2)?,
        query_text: row.get(3)?,
        audio_url: row.get(4)?,
        status: parse_column(row.get(5)?, 5)?,
        language_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn map_row_to_response(row: &Row) -> rusqlite::Result<MentorResponse> {
    Ok(MentorResponse {
        id: row.get(0)?,
        query_id: row.get(1)?,
        mentor_id: row.get(2)?,
        status: parse_column(row.get(3)?, 3)?,
        responded_at: row.get(4)?,
    })
}
