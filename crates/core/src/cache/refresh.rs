//! Stale-while-revalidate refreshes and the forgetting pass.
//!
//! A hit older than the refresh interval schedules one background task per
//! identifier. The task refetches the entry, walks any pagination chain the
//! new payload starts, merges the pages, forgets entries older than the
//! forget interval, and writes the site's snapshot.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use tokio::task::JoinHandle;

use super::entry::Entry;
use super::key::PaginationShape;
use super::merge::{MergeReport, merge_fragments};
use super::site::Site;
use super::snapshot::SnapshotStore;
use crate::{Error, Upstream};

/// Default age after which a hit schedules a refresh (15 minutes).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Default age after which an entry is forgotten (7 days).
pub const DEFAULT_FORGET_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default bound on a single upstream fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Refresh and eviction timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub refresh_interval: Duration,
    pub forget_interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            forget_interval: DEFAULT_FORGET_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl CachePolicy {
    /// Whether a hit on `entry` at `now` should schedule a refresh.
    pub fn is_stale(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.last_updated) > to_delta(self.refresh_interval)
    }

    /// Entries last updated before this instant are forgotten.
    pub fn forget_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(to_delta(self.forget_interval))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// What a refresh cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Fragment identifiers are never refreshed on their own.
    pub skipped: bool,
    pub refetched: bool,
    /// Continuation pages stored while walking the chain.
    pub pages: usize,
    pub chain_complete: bool,
    pub merge: MergeReport,
    pub forgotten: Vec<String>,
}

/// Runs refetches, merges, forgetting passes, and snapshot writes for sites.
#[derive(Clone)]
pub struct RefreshCoordinator {
    upstream: Arc<dyn Upstream>,
    snapshots: SnapshotStore,
    policy: CachePolicy,
    shape: PaginationShape,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("snapshots", &self.snapshots)
            .field("policy", &self.policy)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    pub fn new(
        upstream: Arc<dyn Upstream>, snapshots: SnapshotStore, policy: CachePolicy, shape: PaginationShape,
    ) -> Self {
        Self { upstream, snapshots, policy, shape }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn shape(&self) -> &PaginationShape {
        &self.shape
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Fetch `id` upstream, bounded by the policy's fetch timeout.
    pub async fn fetch_upstream(&self, id: &str) -> Result<Value, Error> {
        let started = std::time::Instant::now();
        let result = tokio::time::timeout(self.policy.fetch_timeout, self.upstream.fetch(id))
            .await
            .map_err(|_| Error::upstream_transport(format!("timed out after {:?}", self.policy.fetch_timeout)))?;

        match &result {
            Ok(_) => tracing::debug!(id, elapsed_ms = started.elapsed().as_millis() as u64, "upstream fetch"),
            Err(e) => tracing::debug!(id, error = %e, "upstream fetch failed"),
        }
        result
    }

    /// Start a background refresh of `id` unless one is already running.
    ///
    /// Returns `None` for fragment identifiers and when the identifier
    /// already has a refresh in flight.
    pub fn schedule(&self, site: &Arc<Site>, id: &str) -> Option<JoinHandle<RefreshReport>> {
        if self.shape.is_fragment(id) {
            tracing::debug!(site = site.slug(), id, "not scheduling refresh for pagination fragment");
            return None;
        }

        let Some(guard) = site.begin_refresh(id) else {
            tracing::debug!(site = site.slug(), id, "refresh already pending");
            return None;
        };

        tracing::debug!(site = site.slug(), id, "scheduling background refresh");
        let coordinator = self.clone();
        let site = Arc::clone(site);
        Some(tokio::spawn(async move {
            let report = coordinator.refresh(&site, guard.id()).await;
            drop(guard);
            report
        }))
    }

    /// One refresh cycle for `id`: refetch, walk the chain, merge, forget, persist.
    pub async fn refresh(&self, site: &Site, id: &str) -> RefreshReport {
        let mut report = RefreshReport::default();

        if self.shape.is_fragment(id) {
            report.skipped = true;
            return report;
        }

        match self.fetch_upstream(id).await {
            Ok(payload) => {
                let token = self.shape.payload_token(&payload);
                site.store().put(id, Entry::fresh(payload));
                report.refetched = true;

                let (pages, complete) = match token {
                    Some(token) => self.walk_chain(site, id, token).await,
                    None => (0, true),
                };
                report.pages = pages;
                report.chain_complete = complete;

                if complete {
                    report.merge = self.merge_entries(site).await;
                }
            }
            Err(e) => {
                tracing::warn!(site = site.slug(), id, error = %e, "refresh failed; keeping stale entry");
            }
        }

        report.forgotten = self.forget_entries(site).await;
        self.persist(site).await;

        report
    }

    /// Fetch every continuation page after `head_id`, storing each as its own
    /// fragment entry.
    ///
    /// Returns the number of pages stored and whether the chain reached its
    /// end. A failed page stops the walk; pages already stored stay behind.
    async fn walk_chain(&self, site: &Site, head_id: &str, first_token: String) -> (usize, bool) {
        let mut seen = HashSet::new();
        let mut token = first_token;
        let mut pages = 0;

        loop {
            if !seen.insert(token.clone()) {
                tracing::warn!(site = site.slug(), head = head_id, token = %token, "continuation token repeated; abandoning chain");
                return (pages, false);
            }

            let page_id = self.shape.next_page(head_id, &token);
            match self.fetch_upstream(&page_id).await {
                Ok(page) => {
                    let next = self.shape.payload_token(&page);
                    site.store().put(page_id, Entry::fresh(page));
                    pages += 1;
                    match next {
                        Some(next) => token = next,
                        None => return (pages, true),
                    }
                }
                Err(e) => {
                    tracing::warn!(site = site.slug(), head = head_id, page = %page_id, error = %e, "pagination chain aborted");
                    return (pages, false);
                }
            }
        }
    }

    /// Merge pass under the site's exclusive region, without persisting.
    pub async fn merge_entries(&self, site: &Site) -> MergeReport {
        let _exclusive = site.lock_exclusive().await;
        site.store().with_entries_mut(|entries| merge_fragments(entries, &self.shape))
    }

    /// Merge pass followed by a snapshot write when anything was merged.
    pub async fn merge(&self, site: &Site) -> MergeReport {
        let report = self.merge_entries(site).await;
        if report.changed() {
            self.persist(site).await;
        }
        report
    }

    /// Delete entries older than the forget interval, without persisting.
    pub async fn forget_entries(&self, site: &Site) -> Vec<String> {
        let _exclusive = site.lock_exclusive().await;
        let forgotten = site.store().remove_older_than(self.policy.forget_cutoff(Utc::now()));
        if !forgotten.is_empty() {
            tracing::info!(site = site.slug(), count = forgotten.len(), "forgot expired entries");
        }
        forgotten
    }

    /// Write the site's current mapping to its snapshot.
    ///
    /// Failures are logged; the in-memory store stays authoritative.
    pub async fn persist(&self, site: &Site) {
        let _writer = site.lock_writer().await;
        let payloads = site.store().payloads();
        if let Err(e) = self.snapshots.save(site.slug(), &payloads).await {
            tracing::warn!(site = site.slug(), error = %e, "snapshot write failed");
        }
    }
}
