//! Backing-store contract and concrete backends.
//!
//! # Responsibility
//! - Define the physical I/O surface a provider delegates to.
//! - Ship in-memory, SQLite and JSON-document implementations.
//!
//! # Invariants
//! - Backends store normalized string values only; typing is the provider's
//!   concern.
//! - `unload` is idempotent and releases the backend's physical handle.
//! - Every failure, including lock-wait timeouts, is a `BackingStoreError`.

use crate::db::DbError;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod json_file;
pub mod memory;
pub mod sqlite;

pub use json_file::JsonFileBackingStore;
pub use memory::{BackingCall, BackingCallCounts, MemoryBackingStore};
pub use sqlite::SqliteBackingStore;

/// Field name to encoded value for one physical record.
pub type RawRecord = BTreeMap<String, String>;

pub type BackingResult<T> = Result<T, BackingStoreError>;

/// Physical storage failures.
#[derive(Debug)]
pub enum BackingStoreError {
    /// Backing location is empty or unusable.
    InvalidLocation(String),
    /// Operation issued before `load` or after `unload`.
    Closed(String),
    MissingRecord(String),
    RecordExists(String),
    /// Stored raw value cannot be decoded as the declared field type.
    InvalidValue {
        address: String,
        field: String,
        raw: String,
    },
    /// Lock wait exceeded the configured budget.
    Timeout(String),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json(serde_json::Error),
    Db(DbError),
    /// Failure injected by a test double.
    Injected(BackingCall),
}

impl Display for BackingStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLocation(location) => {
                write!(f, "invalid backing location `{location}`")
            }
            Self::Closed(location) => write!(f, "backing store is not loaded: {location}"),
            Self::MissingRecord(address) => write!(f, "physical record missing: {address}"),
            Self::RecordExists(address) => {
                write!(f, "physical record already exists: {address}")
            }
            Self::InvalidValue {
                address,
                field,
                raw,
            } => write!(
                f,
                "stored value `{raw}` of field `{field}` at `{address}` cannot be decoded"
            ),
            Self::Timeout(message) => write!(f, "backing store timed out: {message}"),
            Self::Io { path, source } => write!(f, "I/O error at `{}`: {source}", path.display()),
            Self::Json(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Injected(call) => write!(f, "injected failure on `{}`", call.as_str()),
        }
    }
}

impl Error for BackingStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for BackingStoreError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => err.into(),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for BackingStoreError {
    fn from(value: rusqlite::Error) -> Self {
        match value.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                Self::Timeout(value.to_string())
            }
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

impl From<serde_json::Error> for BackingStoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Physical persistence contract implemented by each backend.
///
/// Calls may block on I/O; implementations bound their own waits and report
/// an exceeded budget as [`BackingStoreError::Timeout`].
pub trait BackingStore: Send {
    /// Stable identifier of the physical resource this backend manages.
    fn location(&self) -> &str;

    /// Acquires the physical handle and enumerates existing local addresses.
    fn load(&mut self) -> BackingResult<Vec<String>>;

    /// Flushes and releases the physical handle. Idempotent.
    fn unload(&mut self) -> BackingResult<()>;

    /// Materializes empty storage for `field_names` at a new address.
    fn create_record(&mut self, local_address: &str, field_names: &[&str]) -> BackingResult<()>;

    /// Reads the stored values of `field_names`; absent fields are omitted.
    fn read_record(&self, local_address: &str, field_names: &[&str]) -> BackingResult<RawRecord>;

    /// Persists all `values` for an existing address.
    fn write_record(&mut self, local_address: &str, values: &RawRecord) -> BackingResult<()>;

    fn delete_record(&mut self, local_address: &str) -> BackingResult<()>;
}

impl<B: BackingStore + ?Sized> BackingStore for Box<B> {
    fn location(&self) -> &str {
        (**self).location()
    }

    fn load(&mut self) -> BackingResult<Vec<String>> {
        (**self).load()
    }

    fn unload(&mut self) -> BackingResult<()> {
        (**self).unload()
    }

    fn create_record(&mut self, local_address: &str, field_names: &[&str]) -> BackingResult<()> {
        (**self).create_record(local_address, field_names)
    }

    fn read_record(&self, local_address: &str, field_names: &[&str]) -> BackingResult<RawRecord> {
        (**self).read_record(local_address, field_names)
    }

    fn write_record(&mut self, local_address: &str, values: &RawRecord) -> BackingResult<()> {
        (**self).write_record(local_address, values)
    }

    fn delete_record(&mut self, local_address: &str) -> BackingResult<()> {
        (**self).delete_record(local_address)
    }
}
