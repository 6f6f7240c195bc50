//! Addressable record persistence.
//!
//! Records live at dotted addresses (`namespace.local`). A `Store` routes
//! each address to the provider registered for its namespace; providers
//! cache typed records in front of a pluggable backing store, suppress
//! writes that would not change persisted state, and the store fans out
//! change notifications to address subscribers.

pub mod address;
pub mod backing;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod notify;
pub mod provider;
pub mod registry;
pub mod store;

pub use address::{is_valid_address, split_namespace, AddressError, ADDRESS_SEPARATOR};
pub use backing::{
    BackingCall, BackingCallCounts, BackingStore, BackingStoreError, JsonFileBackingStore,
    MemoryBackingStore, RawRecord, SqliteBackingStore,
};
pub use config::{ConfigError, StoreConfig, DEFAULT_BACKING_TIMEOUT_MS};
pub use error::{StoreError, StoreResult};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::schema::{
    CachePolicy, FieldDescriptor, FieldDescriptorTable, FieldType, FieldValue, Record,
    SchemaError,
};
pub use notify::{ChangeKind, ChangeNotifier, StoreUpdate, Subscriber};
pub use provider::{AnyRecord, DynProvider, Provider};
pub use registry::ProviderRegistry;
pub use store::{Notify, Store};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
