//! Record schema model.
//!
//! # Responsibility
//! - Describe persisted record shapes through field descriptor tables.
//! - Define the `Record` trait providers are generic over.
//!
//! # Invariants
//! - A schema's field names are unique.
//! - Only supported field types reach a backing store.

pub mod schema;
