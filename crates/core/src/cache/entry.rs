//! Per-site entry store.
//!
//! An in-memory map from resource identifier to cached payload plus the time
//! it was last fetched. No I/O happens here; persistence is layered on top by
//! the snapshot module.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cached upstream payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub payload: Value,
    pub last_updated: DateTime<Utc>,
}

impl Entry {
    pub fn new(payload: Value, last_updated: DateTime<Utc>) -> Self {
        Self { payload, last_updated }
    }

    /// Entry for a payload fetched just now.
    pub fn fresh(payload: Value) -> Self {
        Self::new(payload, Utc::now())
    }
}

/// Identifier → entry map for one site.
///
/// Reads take a shared lock and clone out; writes take the exclusive lock for
/// the duration of a single operation.
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate a store from persisted payloads, stamping every entry `loaded_at`.
    pub fn from_payloads(payloads: BTreeMap<String, Value>, loaded_at: DateTime<Utc>) -> Self {
        let entries = payloads
            .into_iter()
            .map(|(id, payload)| (id, Entry::new(payload, loaded_at)))
            .collect();
        Self { entries: RwLock::new(entries) }
    }

    pub fn get(&self, id: &str) -> Option<Entry> {
        self.read().get(id).cloned()
    }

    /// Insert or overwrite an entry.
    ///
    /// `last_updated` never moves backwards for an identifier that is already
    /// present.
    pub fn put(&self, id: impl Into<String>, mut entry: Entry) {
        let id = id.into();
        let mut entries = self.write();
        if let Some(existing) = entries.get(&id) {
            entry.last_updated = entry.last_updated.max(existing.last_updated);
        }
        entries.insert(id, entry);
    }

    pub fn delete(&self, id: &str) -> Option<Entry> {
        self.write().remove(id)
    }

    pub fn keys(&self) -> BTreeSet<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Identifier → payload mapping, ordered by identifier, without timestamps.
    pub fn payloads(&self) -> BTreeMap<String, Value> {
        self.read()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.payload.clone()))
            .collect()
    }

    /// Delete every entry last updated before `cutoff`; returns the deleted
    /// identifiers in order.
    pub fn remove_older_than(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        let mut entries = self.write();
        let mut expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.last_updated < cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        expired.sort();
        for id in &expired {
            entries.remove(id);
        }
        expired
    }

    /// Run `f` with exclusive access to the whole map.
    pub fn with_entries_mut<R>(&self, f: impl FnOnce(&mut HashMap<String, Entry>) -> R) -> R {
        f(&mut self.write())
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
