//! Read-through cache façade.
//!
//! [`SiteCache`] owns every site's state and is the one entry point request
//! handlers use. Sites are created on first reference and seeded from their
//! snapshot.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use super::entry::Entry;
use super::key::{PaginationShape, sanitize_slug};
use super::refresh::{CachePolicy, RefreshCoordinator};
use super::site::Site;
use super::snapshot::SnapshotStore;
use crate::config::AppConfig;
use crate::{Error, Upstream};

/// Result of a façade lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchOutcome {
    pub payload: Value,
    pub served_from_cache: bool,
}

/// Result of an explicit maintenance pass on a site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub merged: usize,
    pub forgotten: Vec<String>,
}

/// Site-scoped read-through cache in front of an [`Upstream`].
#[derive(Debug, Clone)]
pub struct SiteCache {
    sites: Arc<tokio::sync::Mutex<HashMap<String, Arc<Site>>>>,
    coordinator: RefreshCoordinator,
}

impl SiteCache {
    pub fn new(
        upstream: Arc<dyn Upstream>, snapshots: SnapshotStore, policy: CachePolicy, shape: PaginationShape,
    ) -> Self {
        Self {
            sites: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            coordinator: RefreshCoordinator::new(upstream, snapshots, policy, shape),
        }
    }

    pub fn from_config(config: &AppConfig, upstream: Arc<dyn Upstream>) -> Self {
        Self::new(
            upstream,
            SnapshotStore::new(&config.snapshot_dir),
            config.cache_policy(),
            config.pagination_shape(),
        )
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// State for `slug`, created and seeded from its snapshot on first use.
    ///
    /// An unreadable snapshot leaves the site empty. The snapshot is read
    /// without holding the site map; when two callers race, the first
    /// inserted site is kept.
    pub async fn site(&self, slug: &str) -> Arc<Site> {
        let slug = sanitize_slug(slug);
        if let Some(site) = self.sites.lock().await.get(&slug) {
            return Arc::clone(site);
        }

        let payloads = match self.coordinator.snapshots().load(&slug).await {
            Ok(payloads) => payloads,
            Err(e) => {
                tracing::warn!(site = %slug, error = %e, "snapshot unavailable; starting empty");
                Default::default()
            }
        };
        let loaded = Arc::new(Site::with_payloads(slug.clone(), payloads, Utc::now()));

        let mut sites = self.sites.lock().await;
        let site = sites.entry(slug).or_insert_with(|| {
            tracing::info!(site = loaded.slug(), entries = loaded.store().len(), "site loaded");
            Arc::clone(&loaded)
        });
        Arc::clone(site)
    }

    /// Look up `id` for `slug`.
    ///
    /// - `force_refresh` fetches upstream and overwrites the entry.
    /// - A hit returns immediately; a stale hit schedules one background
    ///   refresh, and a hit on a fragment merges the site first.
    /// - A miss fetches upstream, stores, merges, and persists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UpstreamUnavailable`] when a required upstream fetch
    /// fails; nothing is stored in that case.
    pub async fn fetch(&self, slug: &str, id: &str, force_refresh: bool) -> Result<FetchOutcome, Error> {
        let site = self.site(slug).await;

        if !force_refresh && let Some(entry) = site.store().get(id) {
            tracing::debug!(site = site.slug(), id, "cache hit");

            if self.coordinator.policy().is_stale(&entry, Utc::now()) {
                self.coordinator.schedule(&site, id);
            }
            if self.coordinator.shape().is_fragment(id) {
                self.coordinator.merge(&site).await;
            }

            return Ok(FetchOutcome { payload: entry.payload, served_from_cache: true });
        }

        tracing::debug!(site = site.slug(), id, force_refresh, "cache miss");
        let payload = self.coordinator.fetch_upstream(id).await?;

        site.store().put(id, Entry::fresh(payload.clone()));
        self.coordinator.merge_entries(&site).await;
        self.coordinator.persist(&site).await;

        Ok(FetchOutcome { payload, served_from_cache: false })
    }

    /// Stored entry for `id`, without touching upstream or refresh state.
    pub async fn entry(&self, slug: &str, id: &str) -> Option<Entry> {
        self.site(slug).await.store().get(id)
    }

    /// Identifiers currently stored for `slug`.
    pub async fn site_keys(&self, slug: &str) -> BTreeSet<String> {
        self.site(slug).await.store().keys()
    }

    /// Merge and forget on `slug` now, then persist.
    pub async fn purge(&self, slug: &str) -> PurgeReport {
        let site = self.site(slug).await;
        let merge = self.coordinator.merge_entries(&site).await;
        let forgotten = self.coordinator.forget_entries(&site).await;
        self.coordinator.persist(&site).await;

        PurgeReport { merged: merge.merged.len(), forgotten }
    }
}
