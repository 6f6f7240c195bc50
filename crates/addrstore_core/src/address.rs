//! Hierarchical address parsing.
//!
//! # Responsibility
//! - Split a full dot-delimited address into namespace and local address.
//! - Validate namespace keys used by the provider registry.
//!
//! # Invariants
//! - Address syntax is `segment("." segment)+` with non-empty segments.
//! - The local address is handed to providers unmodified.
//! - Parsing is pure and allocation-free on success.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const ADDRESS_SEPARATOR: char = '.';

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^.]+(\.[^.]+)+$").expect("valid address regex"));

/// Address parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    Empty,
    /// Address has a single segment and cannot yield a local address.
    MissingLocalAddress(String),
    /// Address contains an empty segment.
    Malformed(String),
}

impl Display for AddressError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "address is empty"),
            Self::MissingLocalAddress(value) => {
                write!(f, "address has no local part after namespace: `{value}`")
            }
            Self::Malformed(value) => write!(f, "address is malformed: `{value}`"),
        }
    }
}

impl Error for AddressError {}

/// Returns whether `address` is a resolvable full address.
pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_RE.is_match(address)
}

/// Splits a full address into `(namespace, local_address)`.
///
/// `"ns.a.b"` yields `("ns", "a.b")`.
///
/// # Errors
/// - `Empty` for `""`.
/// - `MissingLocalAddress` when there is no separator.
/// - `Malformed` when any segment is empty.
pub fn split_namespace(address: &str) -> Result<(&str, &str), AddressError> {
    if address.is_empty() {
        return Err(AddressError::Empty);
    }
    if !is_valid_address(address) {
        if !address.contains(ADDRESS_SEPARATOR) {
            return Err(AddressError::MissingLocalAddress(address.to_string()));
        }
        return Err(AddressError::Malformed(address.to_string()));
    }

    match address.split_once(ADDRESS_SEPARATOR) {
        Some((namespace, local)) => Ok((namespace, local)),
        None => Err(AddressError::MissingLocalAddress(address.to_string())),
    }
}

/// Returns the namespace segment of `address`.
///
/// Unlike [`split_namespace`], a single-segment address is accepted.
pub fn first_segment(address: &str) -> Result<&str, AddressError> {
    if address.is_empty() {
        return Err(AddressError::Empty);
    }
    let first = address
        .split(ADDRESS_SEPARATOR)
        .next()
        .unwrap_or_default();
    if first.is_empty() {
        return Err(AddressError::Malformed(address.to_string()));
    }
    Ok(first)
}

/// Validates one registry namespace key.
pub fn validate_namespace(namespace: &str) -> Result<(), AddressError> {
    if namespace.is_empty() {
        return Err(AddressError::Empty);
    }
    if namespace.contains(ADDRESS_SEPARATOR) {
        return Err(AddressError::Malformed(namespace.to_string()));
    }
    Ok(())
}

/// Validates a provider-local address.
pub fn validate_local_address(local_address: &str) -> Result<(), AddressError> {
    if local_address.is_empty() {
        return Err(AddressError::Empty);
    }
    if local_address.split(ADDRESS_SEPARATOR).any(str::is_empty) {
        return Err(AddressError::Malformed(local_address.to_string()));
    }
    Ok(())
}
