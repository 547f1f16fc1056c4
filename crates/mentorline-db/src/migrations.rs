//! Embedded schema migrations.
//!
//! Each migration is a SQL file compiled into the binary and applied once,
//! in list order, inside its own transaction. Applied names are recorded in
//! `_mentorline_migrations`.

use rusqlite::{params, Connection};
use std::collections::HashSet;
use thiserror::Error;

/// `(name, sql)` pairs in application order. Append only.
const MIGRATIONS: &[(&str, &str)] = &[
    ("000_users", include_str!("migrations/000_users.sql")),
    ("001_mentors", include_str!("migrations/001_mentors.sql")),
    ("002_queries", include_str!("migrations/002_queries.sql")),
    ("003_chat_messages", include_str!("migrations/003_chat_messages.sql")),
    ("004_podcasts", include_str!("migrations/004_podcasts.sql")),
];

const TRACKING_TABLE: &str = "CREATE TABLE IF NOT EXISTS _mentorline_migrations (
    name TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to prepare migration tracking: {0}")]
    Tracking(#[source] rusqlite::Error),

    #[error("migration '{name}' failed: {source}")]
    Apply {
        name: String,
        #[source]
        source: rusqlite::Error,
    },
}

/// Applies every migration not yet recorded and returns how many ran.
///
/// # Errors
///
/// Returns `MigrationError::Apply` naming the first migration that failed;
/// its changes are rolled back and later migrations are not attempted.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    apply(conn, MIGRATIONS)
}

fn applied_names(conn: &Connection) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM _mentorline_migrations")?;
    let names = stmt.query_map([], |row| row.get(0))?;
    names.collect()
}

fn apply(conn: &Connection, migrations: &[(&str, &str)]) -> Result<usize, MigrationError> {
    conn.execute_batch(TRACKING_TABLE)
        .map_err(MigrationError::Tracking)?;
    let done = applied_names(conn).map_err(MigrationError::Tracking)?;

    let mut count = 0;
    for (name, sql) in migrations.iter().filter(|(name, _)| !done.contains(*name)) {
        let apply_one = || -> rusqlite::Result<()> {
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(sql)?;
            tx.execute(
                "INSERT INTO _mentorline_migrations (name) VALUES (?1)",
                params![name],
            )?;
            tx.commit()
        };
        apply_one().map_err(|source| MigrationError::Apply {
            name: name.to_string(),
            source,
        })?;

        tracing::info!(migration = *name, "applied migration");
        count += 1;
    }

    if count == 0 {
        tracing::debug!("schema up to date");
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        Connection::open_in_memory().expect("in-memory db")
    }

    fn has_table(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [name],
            |row| row.get(0),
        )
        .expect("sqlite_master")
    }

    #[test]
    fn creates_every_table_once() {
        let conn = fresh();
        assert_eq!(run_migrations(&conn).expect("first run"), MIGRATIONS.len());
        assert_eq!(run_migrations(&conn).expect("second run"), 0);

        for table in [
            "users",
            "languages",
            "user_languages",
            "mentors",
            "queries",
            "mentor_query_responses",
            "chat_messages",
            "podcasts",
            "podcast_episodes",
        ] {
            assert!(has_table(&conn, table), "missing table {table}");
        }
    }

    #[test]
    fn english_is_language_one() {
        let conn = fresh();
        run_migrations(&conn).expect("migrations");

        let (code, name): (String, String) = conn
            .query_row("SELECT code, name FROM languages WHERE id = 1", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .expect("language 1");
        assert_eq!((code.as_str(), name.as_str()), ("en-IN", "English"));
    }

    #[test]
    fn only_one_accepted_row_per_query() {
        let conn = fresh();
        run_migrations(&conn).expect("migrations");

        conn.execute_batch(
            "INSERT INTO users (id, name, role) VALUES (1, 'Asha', 'mentee'), (2, 'Ravi', 'mentor'), (3, 'Meera', 'mentor');
             INSERT INTO queries (id, mentee_id, career, query_text, status) VALUES (1, 1, 'NEET', 'q', 'pending');
             INSERT INTO mentor_query_responses (query_id, mentor_id, status) VALUES (1, 2, 'accepted'), (1, 3, 'pending');",
        )
        .expect("seed");

        let err = conn
            .execute(
                "UPDATE mentor_query_responses SET status = 'accepted' WHERE query_id = 1 AND mentor_id = 3",
                [],
            )
            .expect_err("second accepted row must be refused");
        assert!(err.to_string().contains("UNIQUE"), "got: {err}");
    }

    #[test]
    fn failed_migration_leaves_no_trace() {
        let conn = fresh();
        let broken = [
            ("900_probe", "CREATE TABLE probe (id INTEGER PRIMARY KEY);"),
            ("901_bad", "CREATE TABLE half (id INTEGER); INSERT INTO missing VALUES (1);"),
            ("902_never", "CREATE TABLE never (id INTEGER);"),
        ];

        match apply(&conn, &broken) {
            Err(MigrationError::Apply { name, .. }) => assert_eq!(name, "901_bad"),
            other => panic!("expected apply failure, got {other:?}"),
        }

        assert!(has_table(&conn, "probe"));
        assert!(!has_table(&conn, "half"), "partial migration must roll back");
        assert!(!has_table(&conn, "never"));
        assert_eq!(applied_names(&conn).expect("names").len(), 1);
    }
}
