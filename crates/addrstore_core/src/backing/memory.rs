//! In-process backing store with call accounting.
//!
//! Clones share state, so a caller can keep one handle to inspect records and
//! call counts while a provider owns another.

use super::{BackingResult, BackingStore, BackingStoreError, RawRecord};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Contract call kinds, used for counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BackingCall {
    Load,
    Unload,
    Create,
    Read,
    Write,
    Delete,
}

impl BackingCall {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Unload => "unload",
            Self::Create => "create_record",
            Self::Read => "read_record",
            Self::Write => "write_record",
            Self::Delete => "delete_record",
        }
    }
}

/// Number of contract calls observed, failed ones included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackingCallCounts {
    pub load: u32,
    pub unload: u32,
    pub create: u32,
    pub read: u32,
    pub write: u32,
    pub delete: u32,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<String, RawRecord>,
    loaded: bool,
    calls: BackingCallCounts,
    failures: BTreeSet<BackingCall>,
}

impl MemoryState {
    fn begin(&mut self, call: BackingCall) -> BackingResult<()> {
        let counter = match call {
            BackingCall::Load => &mut self.calls.load,
            BackingCall::Unload => &mut self.calls.unload,
            BackingCall::Create => &mut self.calls.create,
            BackingCall::Read => &mut self.calls.read,
            BackingCall::Write => &mut self.calls.write,
            BackingCall::Delete => &mut self.calls.delete,
        };
        *counter += 1;

        if self.failures.remove(&call) {
            return Err(BackingStoreError::Injected(call));
        }
        Ok(())
    }
}

/// Volatile backing store keyed by local address.
#[derive(Debug, Clone)]
pub struct MemoryBackingStore {
    location: String,
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryBackingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackingStore {
    /// Creates an empty store with a unique `memory://` location.
    pub fn new() -> Self {
        Self {
            location: format!("memory://{}", Uuid::new_v4()),
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// Seeds physical records as if persisted by an earlier process.
    pub fn with_records<I, A>(records: I) -> Self
    where
        I: IntoIterator<Item = (A, RawRecord)>,
        A: Into<String>,
    {
        let store = Self::new();
        store.state().records = records
            .into_iter()
            .map(|(address, values)| (address.into(), values))
            .collect();
        store
    }

    pub fn counts(&self) -> BackingCallCounts {
        self.state().calls
    }

    pub fn is_loaded(&self) -> bool {
        self.state().loaded
    }

    /// Returns the stored values of one address.
    pub fn snapshot(&self, local_address: &str) -> Option<RawRecord> {
        self.state().records.get(local_address).cloned()
    }

    /// Overwrites one stored value behind the provider's back.
    pub fn put_raw(&self, local_address: &str, field: &str, value: &str) {
        self.state()
            .records
            .entry(local_address.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    /// Makes the next `call` fail with [`BackingStoreError::Injected`].
    pub fn fail_next(&self, call: BackingCall) {
        self.state().failures.insert(call);
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_loaded(&self, state: &MemoryState) -> BackingResult<()> {
        if state.loaded {
            Ok(())
        } else {
            Err(BackingStoreError::Closed(self.location.clone()))
        }
    }
}

impl BackingStore for MemoryBackingStore {
    fn location(&self) -> &str {
        &self.location
    }

    fn load(&mut self) -> BackingResult<Vec<String>> {
        let mut state = self.state();
        state.begin(BackingCall::Load)?;
        state.loaded = true;
        Ok(state.records.keys().cloned().collect())
    }

    fn unload(&mut self) -> BackingResult<()> {
        let mut state = self.state();
        state.begin(BackingCall::Unload)?;
        state.loaded = false;
        Ok(())
    }

    fn create_record(&mut self, local_address: &str, field_names: &[&str]) -> BackingResult<()> {
        let mut state = self.state();
        state.begin(BackingCall::Create)?;
        self.require_loaded(&state)?;
        if state.records.contains_key(local_address) {
            return Err(BackingStoreError::RecordExists(local_address.to_string()));
        }

        let empty = field_names
            .iter()
            .map(|name| ((*name).to_string(), String::new()))
            .collect();
        state.records.insert(local_address.to_string(), empty);
        Ok(())
    }

    fn read_record(&self, local_address: &str, field_names: &[&str]) -> BackingResult<RawRecord> {
        let mut state = self.state();
        state.begin(BackingCall::Read)?;
        self.require_loaded(&state)?;
        let stored = state
            .records
            .get(local_address)
            .ok_or_else(|| BackingStoreError::MissingRecord(local_address.to_string()))?;

        Ok(field_names
            .iter()
            .filter_map(|name| {
                stored
                    .get(*name)
                    .map(|value| ((*name).to_string(), value.clone()))
            })
            .collect())
    }

    fn write_record(&mut self, local_address: &str, values: &RawRecord) -> BackingResult<()> {
        let mut state = self.state();
        state.begin(BackingCall::Write)?;
        self.require_loaded(&state)?;
        let stored = state
            .records
            .get_mut(local_address)
            .ok_or_else(|| BackingStoreError::MissingRecord(local_address.to_string()))?;

        stored.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    fn delete_record(&mut self, local_address: &str) -> BackingResult<()> {
        let mut state = self.state();
        state.begin(BackingCall::Delete)?;
        self.require_loaded(&state)?;
        if state.records.remove(local_address).is_none() {
            return Err(BackingStoreError::MissingRecord(local_address.to_string()));
        }
        Ok(())
    }
}
