//! Store error taxonomy.
//!
//! # Responsibility
//! - Provide one typed failure surface for address, provider, registry and
//!   notifier operations.
//! - Keep backing-store transport errors distinguishable from semantic ones.
//!
//! # Invariants
//! - Every failure is surfaced synchronously; nothing here retries.
//! - `BackingStore` is the only variant wrapping an underlying error source.

use crate::address::AddressError;
use crate::backing::BackingStoreError;
use crate::model::schema::SchemaError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure kinds surfaced by the store and its providers.
#[derive(Debug)]
pub enum StoreError {
    /// Empty, malformed or under-segmented address.
    Address(AddressError),
    /// Unknown namespace or unknown local address.
    Resolution(String),
    /// Address, namespace, backing location or subscriber already present.
    Duplicate(String),
    /// Supplied or requested record type differs from the stored schema.
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    /// Container exists but holds no data.
    Integrity(String),
    /// Unsubscribe of a callback that is not registered on the address.
    Subscription(String),
    /// Record schema declaration is incomplete or inconsistent.
    Schema(SchemaError),
    BackingStore(BackingStoreError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Address(err) => write!(f, "{err}"),
            Self::Resolution(address) => write!(f, "address could not be resolved: {address}"),
            Self::Duplicate(message) => write!(f, "already registered: {message}"),
            Self::TypeMismatch { expected, actual } => {
                write!(f, "record type mismatch: stored `{expected}`, got `{actual}`")
            }
            Self::Integrity(address) => write!(f, "record container is empty: {address}"),
            Self::Subscription(address) => {
                write!(f, "subscriber is not registered for address: {address}")
            }
            Self::Schema(err) => write!(f, "{err}"),
            Self::BackingStore(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Address(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::BackingStore(err) => Some(err),
            Self::Resolution(_)
            | Self::Duplicate(_)
            | Self::TypeMismatch { .. }
            | Self::Integrity(_)
            | Self::Subscription(_) => None,
        }
    }
}

impl From<AddressError> for StoreError {
    fn from(value: AddressError) -> Self {
        Self::Address(value)
    }
}

impl From<BackingStoreError> for StoreError {
    fn from(value: BackingStoreError) -> Self {
        Self::BackingStore(value)
    }
}

impl From<SchemaError> for StoreError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}
