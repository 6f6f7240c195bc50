//! Store facade: typed record CRUD over full addresses.
//!
//! # Responsibility
//! - Resolve `namespace.local` addresses to registered providers.
//! - Check the caller's record type against the provider's schema.
//! - Emit change notifications for create/update/delete unless silenced.
//!
//! # Invariants
//! - Notifications carry the full address, never the local remainder.
//! - Reads and `contains` never notify.
//! - A type mismatch is detected before the provider is touched.
//! - Concurrent mutation of one address is the caller's responsibility.

use crate::address::{first_segment, split_namespace};
use crate::error::{StoreError, StoreResult};
use crate::model::schema::Record;
use crate::notify::{ChangeKind, ChangeNotifier, Subscriber};
use crate::provider::{AnyRecord, DynProvider};
use crate::registry::ProviderRegistry;
use log::{error, info};
use std::any::TypeId;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Whether a mutation emits a change notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Notify {
    #[default]
    Emit,
    Silent,
}

/// Addressable record store composed of providers and a change notifier.
#[derive(Default)]
pub struct Store {
    registry: ProviderRegistry,
    notifier: Arc<ChangeNotifier>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` as the owner of `namespace`.
    pub fn register_provider<P>(&mut self, namespace: &str, provider: P) -> StoreResult<()>
    where
        P: DynProvider + 'static,
    {
        let schema = provider.schema_name();
        self.registry.register(namespace, Box::new(provider))?;
        info!(
            "event=provider_register module=store status=ok namespace={} schema={}",
            namespace, schema
        );
        Ok(())
    }

    /// Removes the provider for `namespace` and hands it back to the caller.
    ///
    /// Dropping the returned provider unloads its backing store; call
    /// `close` on it to observe unload errors.
    pub fn unregister_provider(&mut self, namespace: &str) -> StoreResult<Box<dyn DynProvider>> {
        let provider = self.registry.unregister(namespace)?;
        info!(
            "event=provider_unregister module=store status=ok namespace={}",
            namespace
        );
        Ok(provider)
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.registry.namespaces()
    }

    /// Shared notifier handle, usable from inside callbacks.
    pub fn notifier(&self) -> Arc<ChangeNotifier> {
        Arc::clone(&self.notifier)
    }

    pub fn create<R: Record>(&mut self, address: &str, notify: Notify) -> StoreResult<R> {
        let (namespace, local) = split_namespace(address)?;
        let provider = self.registry.get_mut(namespace)?;
        ensure_record_type::<R>(&**provider)?;
        let record = downcast::<R>(provider.create_any(local)?, provider.schema_name())?;
        self.emit(address, ChangeKind::Create, notify);
        Ok(record)
    }

    pub fn read<R: Record>(&mut self, address: &str) -> StoreResult<R> {
        let (namespace, local) = split_namespace(address)?;
        let provider = self.registry.get_mut(namespace)?;
        ensure_record_type::<R>(&**provider)?;
        downcast::<R>(provider.read_any(local)?, provider.schema_name())
    }

    /// Reads every record of the namespace `address` starts with.
    ///
    /// Accepts either a bare namespace or any address inside it; keys of the
    /// result are local addresses.
    pub fn read_all<R: Record>(&mut self, address: &str) -> StoreResult<BTreeMap<String, R>> {
        let namespace = first_segment(address)?;
        let provider = self.registry.get_mut(namespace)?;
        ensure_record_type::<R>(&**provider)?;
        let schema = provider.schema_name();
        provider
            .read_all_any()?
            .into_iter()
            .map(|(local, record)| downcast::<R>(record, schema).map(|record| (local, record)))
            .collect()
    }

    /// Replaces the record at `address`.
    ///
    /// # Errors
    /// - `TypeMismatch` when `R` is not the schema stored under the namespace;
    ///   the stored record is left unchanged.
    pub fn update<R: Record>(&mut self, address: &str, data: R, notify: Notify) -> StoreResult<()> {
        let (namespace, local) = split_namespace(address)?;
        let provider = self.registry.get_mut(namespace)?;
        ensure_record_type::<R>(&**provider)?;
        provider.update_any(local, Box::new(data), R::schema().schema_name())?;
        self.emit(address, ChangeKind::Update, notify);
        Ok(())
    }

    pub fn delete(&mut self, address: &str, notify: Notify) -> StoreResult<()> {
        let (namespace, local) = split_namespace(address)?;
        self.registry.get_mut(namespace)?.delete(local)?;
        self.emit(address, ChangeKind::Delete, notify);
        Ok(())
    }

    /// Returns whether a record exists at `address`.
    ///
    /// # Errors
    /// - `Address` for malformed addresses.
    /// - `Resolution` when the namespace is not registered.
    pub fn contains(&self, address: &str) -> StoreResult<bool> {
        let (namespace, local) = split_namespace(address)?;
        self.registry.get(namespace)?.contains(local)
    }

    /// Returns whether the record at `address` is reconciled with its
    /// backing store.
    pub fn is_cached(&self, address: &str) -> StoreResult<bool> {
        let (namespace, local) = split_namespace(address)?;
        self.registry.get(namespace)?.is_cached(local)
    }

    pub fn subscribe(&self, address: &str, subscriber: &Subscriber) -> StoreResult<()> {
        self.notifier.subscribe(address, subscriber)
    }

    pub fn unsubscribe(&self, address: &str, subscriber: &Subscriber) -> StoreResult<()> {
        self.notifier.unsubscribe(address, subscriber)
    }

    /// Closes every provider, returning the first unload failure.
    ///
    /// All providers are closed even when an earlier one fails.
    pub fn close(mut self) -> StoreResult<()> {
        let mut first_error = None;
        for (namespace, provider) in self.registry.drain() {
            if let Err(err) = provider.close() {
                error!(
                    "event=store_close module=store status=error namespace={} error={}",
                    namespace, err
                );
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn emit(&self, address: &str, kind: ChangeKind, notify: Notify) {
        if notify == Notify::Emit {
            self.notifier.notify(address, kind);
        }
    }
}

fn ensure_record_type<R: Record>(provider: &dyn DynProvider) -> StoreResult<()> {
    if provider.record_type() == TypeId::of::<R>() {
        return Ok(());
    }
    Err(StoreError::TypeMismatch {
        expected: provider.schema_name(),
        actual: R::schema().schema_name(),
    })
}

fn downcast<R: Record>(record: AnyRecord, schema: &'static str) -> StoreResult<R> {
    record
        .downcast::<R>()
        .map(|record| *record)
        .map_err(|_| StoreError::TypeMismatch {
            expected: schema,
            actual: R::schema().schema_name(),
        })
}
