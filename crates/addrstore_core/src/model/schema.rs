//! Record schema declarations.
//!
//! # Responsibility
//! - Describe which record fields are persisted, with their semantic type and
//!   optional default value.
//! - Provide the generic get/set/equality surface providers use instead of
//!   per-schema persistence code.
//!
//! # Invariants
//! - Field names are unique within one table and keep declaration order.
//! - Only `Text`, `Boolean`, `Integer` and `Ordinal` fields reach a backing
//!   store; `Unsupported` fields are skipped by read/write helpers.
//! - A provider refuses to operate on a schema without a cache policy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// When a provider reconciles records with its backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Read every record while the provider loads.
    Eager,
    /// Read a record on first access.
    Lazy,
}

/// Semantic type of one persisted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Boolean,
    Integer,
    /// Enumerations persisted by their ordinal.
    Ordinal,
    /// Field type the engine does not serialize; carries a label for logs.
    Unsupported(&'static str),
}

impl FieldType {
    pub fn is_supported(self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Ordinal => "ordinal",
            Self::Unsupported(label) => label,
        }
    }
}

/// Normalized value of one supported field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Boolean(bool),
    Integer(i64),
    Ordinal(i64),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Text(_) => FieldType::Text,
            Self::Boolean(_) => FieldType::Boolean,
            Self::Integer(_) => FieldType::Integer,
            Self::Ordinal(_) => FieldType::Ordinal,
        }
    }

    /// Encodes this value into the string form stored by backing stores.
    pub fn encode(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::Boolean(value) => value.to_string(),
            Self::Integer(value) | Self::Ordinal(value) => value.to_string(),
        }
    }

    /// Decodes a stored string for a field of `field_type`.
    ///
    /// Returns `None` when the raw value does not parse or the type is
    /// unsupported.
    pub fn decode(field_type: FieldType, raw: &str) -> Option<Self> {
        match field_type {
            FieldType::Text => Some(Self::Text(raw.to_string())),
            FieldType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Self::Boolean(true)),
                "false" => Some(Self::Boolean(false)),
                _ => None,
            },
            FieldType::Integer => raw.trim().parse().ok().map(Self::Integer),
            FieldType::Ordinal => raw.trim().parse().ok().map(Self::Ordinal),
            FieldType::Unsupported(_) => None,
        }
    }
}

/// One persisted field declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub field_type: FieldType,
    pub default: Option<FieldValue>,
}

/// Schema declaration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    EmptySchemaName,
    EmptyFieldName(&'static str),
    DuplicateField {
        schema: &'static str,
        field: &'static str,
    },
    MissingCachePolicy(&'static str),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySchemaName => write!(f, "schema name cannot be empty"),
            Self::EmptyFieldName(schema) => {
                write!(f, "schema `{schema}` declares a field with an empty name")
            }
            Self::DuplicateField { schema, field } => {
                write!(f, "schema `{schema}` declares field `{field}` more than once")
            }
            Self::MissingCachePolicy(schema) => {
                write!(f, "schema `{schema}` does not declare a cache policy")
            }
        }
    }
}

impl Error for SchemaError {}

/// Ordered field declarations plus cache policy for one record schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptorTable {
    schema_name: &'static str,
    cache_policy: Option<CachePolicy>,
    fields: Vec<FieldDescriptor>,
}

impl FieldDescriptorTable {
    pub fn builder(schema_name: &'static str) -> FieldDescriptorTableBuilder {
        FieldDescriptorTableBuilder {
            schema_name,
            cache_policy: None,
            fields: Vec::new(),
        }
    }

    pub fn schema_name(&self) -> &'static str {
        self.schema_name
    }

    pub fn cache_policy(&self) -> Option<CachePolicy> {
        self.cache_policy
    }

    /// Returns the declared cache policy, failing when none was declared.
    pub fn require_cache_policy(&self) -> Result<CachePolicy, SchemaError> {
        self.cache_policy
            .ok_or(SchemaError::MissingCachePolicy(self.schema_name))
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|descriptor| descriptor.name == name)
    }

    /// Names of fields a backing store physically holds, in declaration order.
    pub fn storable_field_names(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|descriptor| descriptor.field_type.is_supported())
            .map(|descriptor| descriptor.name)
            .collect()
    }
}

/// Builder for [`FieldDescriptorTable`].
#[derive(Debug)]
pub struct FieldDescriptorTableBuilder {
    schema_name: &'static str,
    cache_policy: Option<CachePolicy>,
    fields: Vec<FieldDescriptor>,
}

impl FieldDescriptorTableBuilder {
    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = Some(policy);
        self
    }

    pub fn field(mut self, name: &'static str, field_type: FieldType) -> Self {
        self.fields.push(FieldDescriptor {
            name,
            field_type,
            default: None,
        });
        self
    }

    pub fn field_with_default(
        mut self,
        name: &'static str,
        field_type: FieldType,
        default: FieldValue,
    ) -> Self {
        self.fields.push(FieldDescriptor {
            name,
            field_type,
            default: Some(default),
        });
        self
    }

    /// Validates names and produces the table.
    ///
    /// A missing cache policy is accepted here and rejected when a provider
    /// first resolves the policy.
    pub fn build(self) -> Result<FieldDescriptorTable, SchemaError> {
        if self.schema_name.trim().is_empty() {
            return Err(SchemaError::EmptySchemaName);
        }

        let mut seen = BTreeSet::new();
        for descriptor in &self.fields {
            if descriptor.name.trim().is_empty() {
                return Err(SchemaError::EmptyFieldName(self.schema_name));
            }
            if !seen.insert(descriptor.name) {
                return Err(SchemaError::DuplicateField {
                    schema: self.schema_name,
                    field: descriptor.name,
                });
            }
        }

        Ok(FieldDescriptorTable {
            schema_name: self.schema_name,
            cache_policy: self.cache_policy,
            fields: self.fields,
        })
    }
}

/// A persistable record type.
///
/// Implementors expose their persisted fields through a static descriptor
/// table and name-based accessors. Fields not listed in the table may exist
/// on the type and are ignored by providers.
pub trait Record: Clone + Default + Debug + Send + 'static {
    fn schema() -> &'static FieldDescriptorTable;

    /// Returns the normalized value of a supported field.
    ///
    /// Returns `None` for unknown names and unsupported field types.
    fn get_field(&self, name: &str) -> Option<FieldValue>;

    /// Sets a supported field. Returns `false` when the name is unknown or
    /// the value cannot be represented by the field.
    fn set_field(&mut self, name: &str, value: FieldValue) -> bool;

    /// Compares one persisted field of two records by value.
    ///
    /// Override for `Unsupported` fields whose values `get_field` cannot
    /// expose.
    fn field_eq(&self, other: &Self, name: &str) -> bool {
        self.get_field(name) == other.get_field(name)
    }

    /// Returns whether all fields in the descriptor table are equal.
    fn persisted_eq(&self, other: &Self) -> bool {
        Self::schema()
            .fields()
            .iter()
            .all(|descriptor| self.field_eq(other, descriptor.name))
    }
}
