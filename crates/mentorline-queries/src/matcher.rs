//! Mentor matching.
//!
//! A mentor qualifies when the classifier label is a substring of one of the
//! mentor's expertise entries, ignoring case. `NEET` matches an expertise of
//! `NEET-UG`, but `NEET-UG` does not match `NEET`.
//! Results are ordered by ascending mentor id so fan-out is reproducible.

use crate::QueryError;
use mentorline_types::Mentor;
use rusqlite::{Connection, Row};

/// Selects the mentors that should receive a query labelled `label`.
///
/// Only available mentors are considered. A blank label matches nobody.
pub fn match_mentors(mentors: &[Mentor], label: &str) -> Vec<Mentor> {
    let needle = label.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut matched: Vec<Mentor> = mentors
        .iter()
        .filter(|m| m.available)
        .filter(|m| m.expertise.iter().any(|e| expertise_matches(e, &needle)))
        .cloned()
        .collect();

    matched.sort_by_key(|m| m.user_id);
    matched.dedup_by_key(|m| m.user_id);
    matched
}

fn expertise_matches(entry: &str, needle: &str) -> bool {
    let entry = entry.trim().to_lowercase();
    !entry.is_empty() && entry.contains(needle)
}

/// Loads every mentor currently marked available.
pub fn load_available_mentors(conn: &Connection) -> Result<Vec<Mentor>, QueryError> {
    let mut stmt = conn.prepare(
        "SELECT m.user_id, u.name, m.expertise_json, m.available
         FROM mentors m
         JOIN users u ON u.id = m.user_id
         WHERE m.available = 1
         ORDER BY m.user_id ASC",
    )?;

    let rows = stmt.query_map([], map_row_to_mentor)?;
    let mut mentors = Vec::new();
    for row in rows {
        mentors.push(row?);
    }
    Ok(mentors)
}

/// Loads available mentors and matches them against `label` in one step.
pub fn find_matching_mentors(conn: &Connection, label: &str) -> Result<Vec<Mentor>, QueryError> {
    let mentors = load_available_mentors(conn)?;
    Ok(match_mentors(&mentors, label))
}

fn map_row_to_mentor(row: &Row) -> rusqlite::Result<Mentor> {
    let expertise_json: String = row.get(2)?;
    let expertise: Vec<String> = serde_json::from_str(&expertise_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Mentor {
        user_id: row.get(0)?,
        name: row.get(1)?,
        expertise,
        available: row.get(3)?,
    })
}
