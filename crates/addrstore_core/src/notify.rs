//! Change notification fan-out keyed by exact address.
//!
//! # Responsibility
//! - Keep an ordered subscriber list per full address.
//! - Dispatch create/update/delete events synchronously on the caller thread.
//!
//! # Invariants
//! - One subscriber identity appears at most once per address.
//! - Dispatch order is registration order.
//! - The subscriber list is snapshotted before dispatch, so callbacks may
//!   subscribe or unsubscribe without affecting the running dispatch.
//! - Address matching is exact; there is no prefix or wildcard matching.

use crate::address::AddressError;
use crate::error::{StoreError, StoreResult};
use log::debug;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Kind of mutation that triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Event delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreUpdate {
    /// Full address including namespace.
    pub address: String,
    pub kind: ChangeKind,
}

type Callback = dyn Fn(&StoreUpdate) + Send + Sync;

/// Callback with a stable identity.
///
/// Clones share the identity, so a clone can be used to unsubscribe.
#[derive(Clone)]
pub struct Subscriber {
    id: Uuid,
    callback: Arc<Callback>,
}

impl Subscriber {
    pub fn new(callback: impl Fn(&StoreUpdate) + Send + Sync + 'static) -> Self {
        Self {
            id: Uuid::new_v4(),
            callback: Arc::new(callback),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn call(&self, update: &StoreUpdate) {
        (self.callback)(update)
    }
}

impl PartialEq for Subscriber {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Subscriber {}

impl Debug for Subscriber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}

/// Address-keyed observer registry.
#[derive(Debug, Default)]
pub struct ChangeNotifier {
    subscriptions: Mutex<BTreeMap<String, Vec<Subscriber>>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `subscriber` for `address`.
    ///
    /// # Errors
    /// - `Address` when `address` is empty.
    /// - `Duplicate` when the same subscriber is already registered there.
    pub fn subscribe(&self, address: &str, subscriber: &Subscriber) -> StoreResult<()> {
        if address.is_empty() {
            return Err(AddressError::Empty.into());
        }

        let mut subscriptions = self.lock();
        let list = subscriptions.entry(address.to_string()).or_default();
        if list.contains(subscriber) {
            return Err(StoreError::Duplicate(format!(
                "subscriber {} on {address}",
                subscriber.id
            )));
        }
        list.push(subscriber.clone());
        Ok(())
    }

    /// Removes `subscriber` from `address`.
    ///
    /// A no-op when `address` has no subscribers at all.
    ///
    /// # Errors
    /// - `Subscription` when `address` has subscribers but not this one.
    pub fn unsubscribe(&self, address: &str, subscriber: &Subscriber) -> StoreResult<()> {
        if address.is_empty() {
            return Err(AddressError::Empty.into());
        }

        let mut subscriptions = self.lock();
        let Some(list) = subscriptions.get_mut(address) else {
            return Ok(());
        };
        let Some(position) = list.iter().position(|entry| entry == subscriber) else {
            return Err(StoreError::Subscription(address.to_string()));
        };
        list.remove(position);
        if list.is_empty() {
            subscriptions.remove(address);
        }
        Ok(())
    }

    /// Invokes every subscriber of `address` in registration order.
    pub fn notify(&self, address: &str, kind: ChangeKind) {
        let snapshot = match self.lock().get(address) {
            Some(list) => list.clone(),
            None => return,
        };

        debug!(
            "event=notify module=notify status=dispatch kind={} subscribers={}",
            kind.as_str(),
            snapshot.len()
        );
        let update = StoreUpdate {
            address: address.to_string(),
            kind,
        };
        for subscriber in &snapshot {
            subscriber.call(&update);
        }
    }

    pub fn subscriber_count(&self, address: &str) -> usize {
        self.lock().get(address).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<Subscriber>>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
