//! Per-site cache state.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::entry::EntryStore;

/// One isolation boundary: an entry store plus the locks that order work on it.
#[derive(Debug)]
pub struct Site {
    slug: String,
    store: EntryStore,
    /// Held for the scan-and-mutate passes (merge, forget).
    exclusive: tokio::sync::Mutex<()>,
    /// Held while the snapshot artifact is being written.
    writer: tokio::sync::Mutex<()>,
    /// Identifiers with a background refresh in flight.
    pending: Mutex<HashSet<String>>,
}

impl Site {
    pub fn new(slug: impl Into<String>) -> Self {
        Self::with_store(slug, EntryStore::new())
    }

    /// Site pre-populated from snapshot payloads stamped `loaded_at`.
    pub fn with_payloads(slug: impl Into<String>, payloads: BTreeMap<String, Value>, loaded_at: DateTime<Utc>) -> Self {
        Self::with_store(slug, EntryStore::from_payloads(payloads, loaded_at))
    }

    fn with_store(slug: impl Into<String>, store: EntryStore) -> Self {
        Self {
            slug: slug.into(),
            store,
            exclusive: tokio::sync::Mutex::new(()),
            writer: tokio::sync::Mutex::new(()),
            pending: Mutex::new(HashSet::new()),
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub(crate) async fn lock_exclusive(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.exclusive.lock().await
    }

    pub(crate) async fn lock_writer(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.writer.lock().await
    }

    /// Claim the refresh slot for `id`.
    ///
    /// Returns `None` when a refresh for `id` is already running. The slot is
    /// released when the returned guard drops.
    pub fn begin_refresh(self: &Arc<Self>, id: &str) -> Option<RefreshGuard> {
        let inserted = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string());
        inserted.then(|| RefreshGuard { site: Arc::clone(self), id: id.to_string() })
    }

    pub fn is_refresh_pending(&self, id: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    pub fn pending_refreshes(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Releases a site's refresh slot on drop.
#[derive(Debug)]
pub struct RefreshGuard {
    site: Arc<Site>,
    id: String,
}

impl RefreshGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.site
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_refresh_slot_is_exclusive() {
        let site = Arc::new(Site::new("example"));

        let guard = site.begin_refresh("/t").expect("first claim succeeds");
        assert!(site.is_refresh_pending("/t"));
        assert!(site.begin_refresh("/t").is_none());
        assert!(site.begin_refresh("/other").is_some());

        drop(guard);
        assert!(!site.is_refresh_pending("/t"));
        assert!(site.begin_refresh("/t").is_some());
    }

    #[test]
    fn test_with_payloads() {
        let mut payloads = BTreeMap::new();
        payloads.insert("/t".to_string(), json!({"records": []}));

        let site = Site::with_payloads("example", payloads, Utc::now());
        assert_eq!(site.slug(), "example");
        assert_eq!(site.store().len(), 1);
    }
}
