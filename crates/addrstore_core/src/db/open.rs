//! Connection bootstrap for the SQLite backing store.
//!
//! # Invariants
//! - Returned connections have migrations fully applied.
//! - Lock waits are bounded by the caller-supplied busy timeout.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens a SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Creates the file when missing.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>, busy_timeout: Duration) -> DbResult<Connection> {
    open_with("file", busy_timeout, || Connection::open(path))
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory(busy_timeout: Duration) -> DbResult<Connection> {
    open_with("memory", busy_timeout, Connection::open_in_memory)
}

fn open_with<F>(mode: &str, busy_timeout: Duration, open: F) -> DbResult<Connection>
where
    F: FnOnce() -> rusqlite::Result<Connection>,
{
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let result = open()
        .map_err(DbError::from)
        .and_then(|mut conn| bootstrap_connection(&mut conn, busy_timeout).map(|()| conn));

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn bootstrap_connection(conn: &mut Connection, busy_timeout: Duration) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    apply_migrations(conn)?;
    Ok(())
}
