//! Database layer for the Mentorline platform.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization
//! and embedded SQL migrations. Every table the pipeline reads or writes
//! (users, mentors, queries, fan-out rows, chat messages, podcasts) is
//! created through versioned migrations managed by this crate.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: concurrent readers with a single writer, which
//!   fits a request-per-call server whose only contended write is the
//!   mentor accept transition.
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, so the schema cannot drift from the code using it.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError, IN_MEMORY_PATH};
