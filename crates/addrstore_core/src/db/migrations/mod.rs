//! Schema migrations for the SQLite backing store.
//!
//! Applied version is mirrored to `PRAGMA user_version`; all pending steps
//! run inside one transaction.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// `(version, sql)` pairs in strictly increasing version order.
const STEPS: &[(u32, &str)] = &[(1, include_str!("0001_init.sql"))];

/// Returns the newest schema version this binary can open.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |(version, _)| *version)
}

/// Brings `conn` up to [`latest_version`].
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file was written by a newer binary.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = latest_version();

    if found > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: latest,
        });
    }

    let pending: Vec<_> = STEPS
        .iter()
        .filter(|(version, _)| *version > found)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, sql) in &pending {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={}",
        found, latest
    );
    Ok(())
}
