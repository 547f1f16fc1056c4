//! Connection pool creation and per-connection setup.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::time::Duration;
use thiserror::Error;

/// Path that selects a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a writer waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Upper bound on pooled connections. Ignored for in-memory databases.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Opens a pool over `db_path`.
///
/// Every connection runs in WAL mode with foreign keys enforced and the
/// configured busy timeout. Each `:memory:` connection would be a separate
/// database, so an in-memory pool holds exactly one connection.
///
/// # Errors
///
/// Returns `PoolError::PoolInit` if the first connection cannot be opened
/// or configured.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let in_memory = db_path == IN_MEMORY_PATH;
    let manager = if in_memory {
        SqliteConnectionManager::memory()
    } else {
        SqliteConnectionManager::file(db_path)
    }
    .with_flags(
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
    )
    .with_init(move |conn| configure_connection(conn, settings.busy_timeout_ms));

    let max_size = if in_memory {
        if settings.pool_max_size > 1 {
            tracing::debug!(
                requested = settings.pool_max_size,
                "in-memory database pool limited to one connection"
            );
        }
        1
    } else {
        settings.pool_max_size
    };

    let pool = Pool::builder().max_size(max_size).build(manager)?;
    tracing::debug!(path = db_path, max_size, "database pool ready");
    Ok(pool)
}

fn configure_connection(conn: &mut Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    // In-memory databases keep their own journal.
    if !mode.eq_ignore_ascii_case("wal") && !mode.eq_ignore_ascii_case("memory") {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal_mode stayed {mode}, expected wal")),
        ));
    }
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
}
