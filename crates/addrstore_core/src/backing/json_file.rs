//! JSON document backing store.
//!
//! The whole document lives in memory while loaded and is rewritten to disk
//! after every create/write/delete and once more on unload. A missing or
//! empty file starts an empty document.
//!
//! A mutation is applied to a copy of the document; the copy replaces the
//! loaded document only after it was written, so a failed save leaves
//! memory and disk in agreement.

use super::{BackingResult, BackingStore, BackingStoreError, RawRecord};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    records: BTreeMap<String, RawRecord>,
}

/// Backing store persisted as one pretty-printed JSON file.
#[derive(Debug)]
pub struct JsonFileBackingStore {
    path: PathBuf,
    location: String,
    document: Option<Document>,
}

impl JsonFileBackingStore {
    pub fn new(path: impl Into<PathBuf>) -> BackingResult<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(BackingStoreError::InvalidLocation(String::new()));
        }
        Ok(Self {
            location: format!("file://{}", path.display()),
            path,
            document: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn document(&self) -> BackingResult<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| BackingStoreError::Closed(self.location.clone()))
    }

    /// Applies `change` to a copy of the document, saves the copy, then
    /// installs it.
    fn commit<F>(&mut self, change: F) -> BackingResult<()>
    where
        F: FnOnce(&mut Document) -> BackingResult<()>,
    {
        let mut candidate = self.document()?.clone();
        change(&mut candidate)?;
        self.save(&candidate)?;
        self.document = Some(candidate);
        Ok(())
    }

    fn read_document(&self) -> BackingResult<Document> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(source) => {
                return Err(BackingStoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if text.trim().is_empty() {
            return Ok(Document::default());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn save(&self, document: &Document) -> BackingResult<()> {
        let text = serde_json::to_string_pretty(document)?;
        let io_err = |source| BackingStoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        std::fs::write(&self.path, text).map_err(|err| {
            error!(
                "event=backing_save module=backing status=error location={} error={}",
                self.location, err
            );
            io_err(err)
        })
    }
}

impl BackingStore for JsonFileBackingStore {
    fn location(&self) -> &str {
        &self.location
    }

    fn load(&mut self) -> BackingResult<Vec<String>> {
        if self.document.is_none() {
            self.document = Some(self.read_document()?);
        }
        Ok(self.document()?.records.keys().cloned().collect())
    }

    fn unload(&mut self) -> BackingResult<()> {
        let Some(document) = &self.document else {
            return Ok(());
        };
        self.save(document)?;
        self.document = None;
        debug!(
            "event=backing_unload module=backing status=ok location={}",
            self.location
        );
        Ok(())
    }

    fn create_record(&mut self, local_address: &str, field_names: &[&str]) -> BackingResult<()> {
        self.commit(|document| {
            if document.records.contains_key(local_address) {
                return Err(BackingStoreError::RecordExists(local_address.to_string()));
            }
            let empty = field_names
                .iter()
                .map(|name| ((*name).to_string(), String::new()))
                .collect();
            document.records.insert(local_address.to_string(), empty);
            Ok(())
        })
    }

    fn read_record(&self, local_address: &str, field_names: &[&str]) -> BackingResult<RawRecord> {
        let stored = self
            .document()?
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
        self.commit(|document| {
            let stored = document
                .records
                .get_mut(local_address)
                .ok_or_else(|| BackingStoreError::MissingRecord(local_address.to_string()))?;
            stored.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(())
        })
    }

    fn delete_record(&mut self, local_address: &str) -> BackingResult<()> {
        self.commit(|document| match document.records.remove(local_address) {
            Some(_) => Ok(()),
            None => Err(BackingStoreError::MissingRecord(local_address.to_string())),
        })
    }
}
