//! SQLite backing store.
//!
//! # Responsibility
//! - Persist records as `(container, address, field) -> value` rows.
//! - Open the connection on `load` and close it on `unload`.
//!
//! # Invariants
//! - All rows of one store share its `container`; several stores may use the
//!   same database file with different containers.
//! - Lock waits are bounded by the configured busy timeout and surface as
//!   `BackingStoreError::Timeout`.

use super::{BackingResult, BackingStore, BackingStoreError, RawRecord};
use crate::config::StoreConfig;
use crate::db::{open_db, open_db_in_memory};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
enum DbTarget {
    File(PathBuf),
    Memory,
}

/// Backing store over one SQLite container.
pub struct SqliteBackingStore {
    target: DbTarget,
    container: String,
    location: String,
    busy_timeout: Duration,
    conn: Option<Connection>,
}

impl SqliteBackingStore {
    /// Creates a store for `container` inside the database file at `path`.
    ///
    /// The file is opened lazily by `load`. The location uses the resolved
    /// absolute path, so different spellings of one file share a location.
    pub fn new(
        path: impl Into<PathBuf>,
        container: &str,
        config: &StoreConfig,
    ) -> BackingResult<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(BackingStoreError::InvalidLocation(String::new()));
        }
        let location = format!(
            "sqlite://{}#{}",
            resolve_location_path(&path).display(),
            container
        );
        Self::with_target(DbTarget::File(path), container, location, config)
    }

    /// Creates a store over a private in-memory database.
    pub fn in_memory(container: &str, config: &StoreConfig) -> BackingResult<Self> {
        let location = format!("sqlite://memory-{}#{}", Uuid::new_v4(), container);
        Self::with_target(DbTarget::Memory, container, location, config)
    }

    fn with_target(
        target: DbTarget,
        container: &str,
        location: String,
        config: &StoreConfig,
    ) -> BackingResult<Self> {
        let container = container.trim();
        if container.is_empty() {
            return Err(BackingStoreError::InvalidLocation(location));
        }
        Ok(Self {
            target,
            container: container.to_string(),
            location,
            busy_timeout: config.backing_timeout(),
            conn: None,
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    fn conn(&self) -> BackingResult<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| BackingStoreError::Closed(self.location.clone()))
    }

    fn conn_mut(&mut self) -> BackingResult<&mut Connection> {
        match self.conn.as_mut() {
            Some(conn) => Ok(conn),
            None => Err(BackingStoreError::Closed(self.location.clone())),
        }
    }

    fn record_exists(conn: &Connection, container: &str, address: &str) -> BackingResult<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM records WHERE container = ?1 AND address = ?2;",
                params![container, address],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

/// Canonicalizes `path`, or its parent directory when the file does not
/// exist yet. Falls back to `path` unchanged.
fn resolve_location_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = std::fs::canonicalize(path) {
        return resolved;
    }
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Ok(dir) = std::fs::canonicalize(parent) {
            return dir.join(name);
        }
    }
    path.to_path_buf()
}

impl BackingStore for SqliteBackingStore {
    fn location(&self) -> &str {
        &self.location
    }

    fn load(&mut self) -> BackingResult<Vec<String>> {
        if self.conn.is_none() {
            let conn = match &self.target {
                DbTarget::File(path) => open_db(path, self.busy_timeout)?,
                DbTarget::Memory => open_db_in_memory(self.busy_timeout)?,
            };
            self.conn = Some(conn);
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT address FROM records
             WHERE container = ?1
             ORDER BY address ASC;",
        )?;
        let mut rows = stmt.query([self.container.as_str()])?;
        let mut addresses = Vec::new();
        while let Some(row) = rows.next()? {
            addresses.push(row.get::<_, String>(0)?);
        }
        Ok(addresses)
    }

    fn unload(&mut self) -> BackingResult<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        if let Err((conn, err)) = conn.close() {
            warn!(
                "event=backing_unload module=backing status=error location={} error={}",
                self.location, err
            );
            // Keep the handle so a later unload can retry the close.
            self.conn = Some(conn);
            return Err(err.into());
        }
        debug!(
            "event=backing_unload module=backing status=ok location={}",
            self.location
        );
        Ok(())
    }

    fn create_record(&mut self, local_address: &str, field_names: &[&str]) -> BackingResult<()> {
        let container = self.container.clone();
        let conn = self.conn_mut()?;
        if Self::record_exists(conn, &container, local_address)? {
            return Err(BackingStoreError::RecordExists(local_address.to_string()));
        }

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO records (container, address) VALUES (?1, ?2);",
            params![container, local_address],
        )?;
        for field in field_names {
            tx.execute(
                "INSERT INTO record_values (container, address, field, value)
                 VALUES (?1, ?2, ?3, '');",
                params![container, local_address, field],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn read_record(&self, local_address: &str, field_names: &[&str]) -> BackingResult<RawRecord> {
        let conn = self.conn()?;
        if !Self::record_exists(conn, &self.container, local_address)? {
            return Err(BackingStoreError::MissingRecord(local_address.to_string()));
        }

        let mut stmt = conn.prepare(
            "SELECT field, value FROM record_values
             WHERE container = ?1 AND address = ?2;",
        )?;
        let mut rows = stmt.query(params![self.container, local_address])?;
        let mut values = RawRecord::new();
        while let Some(row) = rows.next()? {
            let field: String = row.get(0)?;
            if field_names.contains(&field.as_str()) {
                values.insert(field, row.get(1)?);
            }
        }
        Ok(values)
    }

    fn write_record(&mut self, local_address: &str, values: &RawRecord) -> BackingResult<()> {
        let container = self.container.clone();
        let conn = self.conn_mut()?;
        if !Self::record_exists(conn, &container, local_address)? {
            return Err(BackingStoreError::MissingRecord(local_address.to_string()));
        }

        let tx = conn.transaction()?;
        for (field, value) in values {
            tx.execute(
                "INSERT INTO record_values (container, address, field, value)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (container, address, field) DO UPDATE SET value = excluded.value;",
                params![container, local_address, field, value],
            )?;
        }
        tx.execute(
            "UPDATE records
             SET updated_at = (strftime('%s', 'now') * 1000)
             WHERE container = ?1 AND address = ?2;",
            params![container, local_address],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete_record(&mut self, local_address: &str) -> BackingResult<()> {
        let container = self.container.clone();
        let changed = self.conn()?.execute(
            "DELETE FROM records WHERE container = ?1 AND address = ?2;",
            params![container, local_address],
        )?;
        if changed == 0 {
            return Err(BackingStoreError::MissingRecord(local_address.to_string()));
        }
        Ok(())
    }
}
