//! Namespace providers: cache-aware record CRUD over a backing store.
//!
//! # Responsibility
//! - Own every record container under one namespace.
//! - Translate typed records to and from the backing store's raw values using
//!   the record's field descriptor table only.
//! - Apply the schema cache policy and suppress no-op writes.
//!
//! # Invariants
//! - The backing handle is acquired by `open` and released by `close` or
//!   `Drop`, including when `open` fails after `load`.
//! - A container is `cached` only when its value is known to match the
//!   backing store.
//! - Callers serialize access per address; the provider does no locking.

use crate::address::{validate_local_address, AddressError};
use crate::backing::{BackingStore, BackingStoreError, RawRecord};
use crate::error::{StoreError, StoreResult};
use crate::model::schema::{CachePolicy, FieldType, FieldValue, Record};
use log::{debug, error, info, warn};
use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::time::Instant;

mod container;

pub use container::RecordContainer;

/// Record provider for one namespace, generic over schema and backend.
pub struct Provider<R: Record, B: BackingStore> {
    backing: B,
    location: String,
    cache_policy: CachePolicy,
    records: BTreeMap<String, RecordContainer<R>>,
    closed: bool,
}

impl<R: Record, B: BackingStore> Provider<R, B> {
    /// Loads every existing record address from `backing`.
    ///
    /// Eager-policy records are read immediately; Lazy ones stay uncached
    /// until first access.
    ///
    /// # Errors
    /// - `Schema` when `R` declares no cache policy.
    /// - `BackingStore` when the location is empty or loading fails; the
    ///   backend is unloaded before the error is returned.
    pub fn open(backing: B) -> StoreResult<Self> {
        let started_at = Instant::now();
        let schema = R::schema();
        let cache_policy = schema.require_cache_policy()?;
        let location = backing.location().trim().to_string();
        if location.is_empty() {
            return Err(BackingStoreError::InvalidLocation(location).into());
        }

        // Constructed before `load` so that `Drop` releases the handle on
        // every error path below.
        let mut provider = Self {
            backing,
            location,
            cache_policy,
            records: BTreeMap::new(),
            closed: false,
        };

        if let Err(err) = provider.load() {
            error!(
                "event=provider_load module=provider status=error schema={} location={} error={}",
                schema.schema_name(),
                provider.location,
                err
            );
            return Err(err);
        }

        info!(
            "event=provider_load module=provider status=ok schema={} location={} records={} policy={:?} duration_ms={}",
            schema.schema_name(),
            provider.location,
            provider.records.len(),
            provider.cache_policy,
            started_at.elapsed().as_millis()
        );
        Ok(provider)
    }

    fn load(&mut self) -> StoreResult<()> {
        for address in self.backing.load()? {
            if validate_local_address(&address).is_err() {
                warn!(
                    "event=provider_load module=provider status=skipped reason=invalid_address location={}",
                    self.location
                );
                continue;
            }
            self.records
                .insert(address.clone(), RecordContainer::uncached(R::default()));
            if self.cache_policy == CachePolicy::Eager {
                self.reconcile(&address)?;
            }
        }
        Ok(())
    }

    /// Unloads the backing store and reports failure to the caller.
    ///
    /// Unload is attempted once; a failure is not retried by `Drop`.
    pub fn close(mut self) -> StoreResult<()> {
        self.closed = true;
        if let Err(err) = self.backing.unload() {
            error!(
                "event=provider_unload module=provider status=error location={} error={}",
                self.location, err
            );
            return Err(err.into());
        }
        info!(
            "event=provider_unload module=provider status=ok location={}",
            self.location
        );
        Ok(())
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    pub fn backing(&self) -> &B {
        &self.backing
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Known local addresses in sorted order.
    pub fn local_addresses(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    /// Returns whether the container at `local_address` is reconciled.
    pub fn is_cached(&self, local_address: &str) -> StoreResult<bool> {
        validate_local_address(local_address)?;
        self.records
            .get(local_address)
            .map(RecordContainer::is_cached)
            .ok_or_else(|| StoreError::Resolution(local_address.to_string()))
    }

    /// Returns whether `local_address` holds a record. Never touches the
    /// backing store.
    pub fn contains(&self, local_address: &str) -> StoreResult<bool> {
        if local_address.is_empty() {
            return Err(AddressError::Empty.into());
        }
        Ok(self.records.contains_key(local_address))
    }

    /// Creates a default-initialized record and persists it immediately.
    ///
    /// Declared defaults are applied first; a default whose type does not
    /// match its field is skipped.
    pub fn create(&mut self, local_address: &str) -> StoreResult<R> {
        validate_local_address(local_address)?;
        if self.records.contains_key(local_address) {
            return Err(StoreError::Duplicate(local_address.to_string()));
        }

        let mut record = R::default();
        apply_defaults(&mut record);

        let field_names = R::schema().storable_field_names();
        self.backing.create_record(local_address, &field_names)?;
        if let Err(err) = self
            .backing
            .write_record(local_address, &encode_record(&record))
        {
            if let Err(rollback) = self.backing.delete_record(local_address) {
                warn!(
                    "event=provider_create module=provider status=rollback_failed location={} error={}",
                    self.location, rollback
                );
            }
            return Err(err.into());
        }

        self.records.insert(
            local_address.to_string(),
            RecordContainer::cached(record.clone()),
        );
        debug!(
            "event=provider_create module=provider status=ok location={}",
            self.location
        );
        Ok(record)
    }

    /// Returns the record, reading it from the backing store on first access.
    pub fn read(&mut self, local_address: &str) -> StoreResult<R> {
        self.read_ref(local_address).cloned()
    }

    fn read_ref(&mut self, local_address: &str) -> StoreResult<&R> {
        validate_local_address(local_address)?;
        let cached = self.container(local_address)?.is_cached();
        if !cached {
            self.reconcile(local_address)?;
        }
        self.container(local_address)?
            .data()
            .ok_or_else(|| StoreError::Integrity(local_address.to_string()))
    }

    /// Reads every known record into a new snapshot map.
    pub fn read_all(&mut self) -> StoreResult<BTreeMap<String, R>> {
        let mut snapshot = BTreeMap::new();
        for address in self.local_addresses() {
            let record = self.read(&address)?;
            snapshot.insert(address, record);
        }
        Ok(snapshot)
    }

    /// Replaces the record at `local_address`.
    ///
    /// When every persisted field equals the stored value the backing store
    /// is not written; the container still takes `data`. A stored record
    /// that cannot be read is overwritten without comparison. A failed write
    /// leaves the container uncached so the next read reconciles it.
    pub fn update(&mut self, local_address: &str, data: R) -> StoreResult<()> {
        validate_local_address(local_address)?;
        let reconciled = self.container(local_address)?.is_cached()
            || match self.reconcile(local_address) {
                Ok(()) => true,
                Err(err) => {
                    warn!(
                        "event=provider_update module=provider status=reconcile_failed location={} error={}",
                        self.location, err
                    );
                    false
                }
            };

        let container = self.container_mut(local_address)?;
        let matches_stored = container
            .data()
            .map(|current| current.persisted_eq(&data))
            .ok_or_else(|| StoreError::Integrity(local_address.to_string()))?;
        let unchanged = reconciled && matches_stored;
        container.replace(data);

        if unchanged {
            container.set_cached(true);
            debug!(
                "event=provider_update module=provider status=suppressed location={}",
                self.location
            );
            return Ok(());
        }

        container.set_cached(false);
        let values = match container.data() {
            Some(record) => encode_record(record),
            None => return Err(StoreError::Integrity(local_address.to_string())),
        };
        self.backing.write_record(local_address, &values)?;
        self.container_mut(local_address)?.set_cached(true);
        debug!(
            "event=provider_update module=provider status=written location={}",
            self.location
        );
        Ok(())
    }

    /// Removes the physical record, then the container.
    pub fn delete(&mut self, local_address: &str) -> StoreResult<()> {
        validate_local_address(local_address)?;
        self.container(local_address)?;
        self.backing.delete_record(local_address)?;
        self.records.remove(local_address);
        debug!(
            "event=provider_delete module=provider status=ok location={}",
            self.location
        );
        Ok(())
    }

    fn container(&self, local_address: &str) -> StoreResult<&RecordContainer<R>> {
        self.records
            .get(local_address)
            .ok_or_else(|| StoreError::Resolution(local_address.to_string()))
    }

    fn container_mut(&mut self, local_address: &str) -> StoreResult<&mut RecordContainer<R>> {
        self.records
            .get_mut(local_address)
            .ok_or_else(|| StoreError::Resolution(local_address.to_string()))
    }

    /// Reads stored values into the container and marks it cached.
    fn reconcile(&mut self, local_address: &str) -> StoreResult<()> {
        let field_names = R::schema().storable_field_names();
        let raw = self.backing.read_record(local_address, &field_names)?;
        let container = self.container_mut(local_address)?;
        let record = container
            .data_mut()
            .ok_or_else(|| StoreError::Integrity(local_address.to_string()))?;
        apply_raw(local_address, record, &raw)?;
        container.set_cached(true);
        Ok(())
    }
}

impl<R: Record, B: BackingStore> Drop for Provider<R, B> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match self.backing.unload() {
            Ok(()) => debug!(
                "event=provider_unload module=provider status=ok location={}",
                self.location
            ),
            Err(err) => error!(
                "event=provider_unload module=provider status=error location={} error={}",
                self.location, err
            ),
        }
    }
}

fn apply_defaults<R: Record>(record: &mut R) {
    for descriptor in R::schema().fields() {
        let Some(default) = &descriptor.default else {
            continue;
        };
        if default.field_type() != descriptor.field_type {
            debug!(
                "event=default_apply module=provider status=skipped reason=type_mismatch schema={} field={}",
                R::schema().schema_name(),
                descriptor.name
            );
            continue;
        }
        if !record.set_field(descriptor.name, default.clone()) {
            debug!(
                "event=default_apply module=provider status=skipped reason=rejected schema={} field={}",
                R::schema().schema_name(),
                descriptor.name
            );
        }
    }
}

fn encode_record<R: Record>(record: &R) -> RawRecord {
    R::schema()
        .fields()
        .iter()
        .filter(|descriptor| descriptor.field_type.is_supported())
        .filter_map(|descriptor| {
            record
                .get_field(descriptor.name)
                .map(|value| (descriptor.name.to_string(), value.encode()))
        })
        .collect()
}

/// Decodes stored values onto `record`.
///
/// Fields missing from `raw`, unsupported fields, and blank values of
/// non-text fields keep their current value.
fn apply_raw<R: Record>(address: &str, record: &mut R, raw: &RawRecord) -> StoreResult<()> {
    for descriptor in R::schema().fields() {
        if !descriptor.field_type.is_supported() {
            continue;
        }
        let Some(value) = raw.get(descriptor.name) else {
            continue;
        };
        if value.trim().is_empty() && descriptor.field_type != FieldType::Text {
            continue;
        }
        let decoded = FieldValue::decode(descriptor.field_type, value).ok_or_else(|| {
            BackingStoreError::InvalidValue {
                address: address.to_string(),
                field: descriptor.name.to_string(),
                raw: value.clone(),
            }
        })?;
        record.set_field(descriptor.name, decoded);
    }
    Ok(())
}

/// Boxed record value crossing the type-erased provider boundary.
pub type AnyRecord = Box<dyn Any + Send>;

/// Object-safe provider surface used by the store registry.
pub trait DynProvider: Send {
    fn location(&self) -> &str;
    fn schema_name(&self) -> &'static str;
    fn record_type(&self) -> TypeId;
    fn contains(&self, local_address: &str) -> StoreResult<bool>;
    fn is_cached(&self, local_address: &str) -> StoreResult<bool>;
    fn create_any(&mut self, local_address: &str) -> StoreResult<AnyRecord>;
    fn read_any(&mut self, local_address: &str) -> StoreResult<AnyRecord>;
    fn read_all_any(&mut self) -> StoreResult<BTreeMap<String, AnyRecord>>;
    fn update_any(
        &mut self,
        local_address: &str,
        data: AnyRecord,
        data_schema: &'static str,
    ) -> StoreResult<()>;
    fn delete(&mut self, local_address: &str) -> StoreResult<()>;
    fn close(self: Box<Self>) -> StoreResult<()>;
}

impl<R: Record, B: BackingStore + 'static> DynProvider for Provider<R, B> {
    fn location(&self) -> &str {
        Provider::location(self)
    }

    fn schema_name(&self) -> &'static str {
        R::schema().schema_name()
    }

    fn record_type(&self) -> TypeId {
        TypeId::of::<R>()
    }

    fn contains(&self, local_address: &str) -> StoreResult<bool> {
        Provider::contains(self, local_address)
    }

    fn is_cached(&self, local_address: &str) -> StoreResult<bool> {
        Provider::is_cached(self, local_address)
    }

    fn create_any(&mut self, local_address: &str) -> StoreResult<AnyRecord> {
        Ok(Box::new(self.create(local_address)?))
    }

    fn read_any(&mut self, local_address: &str) -> StoreResult<AnyRecord> {
        Ok(Box::new(self.read(local_address)?))
    }

    fn read_all_any(&mut self) -> StoreResult<BTreeMap<String, AnyRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .map(|(address, record)| (address, Box::new(record) as AnyRecord))
            .collect())
    }

    fn update_any(
        &mut self,
        local_address: &str,
        data: AnyRecord,
        data_schema: &'static str,
    ) -> StoreResult<()> {
        let data = data.downcast::<R>().map_err(|_| StoreError::TypeMismatch {
            expected: R::schema().schema_name(),
            actual: data_schema,
        })?;
        self.update(local_address, *data)
    }

    fn delete(&mut self, local_address: &str) -> StoreResult<()> {
        Provider::delete(self, local_address)
    }

    fn close(self: Box<Self>) -> StoreResult<()> {
        Provider::close(*self)
    }
}
