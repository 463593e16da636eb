//! Site-scoped response cache.
//!
//! Responses from the upstream API are kept per site, served immediately,
//! and refreshed in the background once they go stale. Pagination
//! fragments are folded back into the page that pointed at them, and every
//! change is written to a per-site JavaScript snapshot.
//!
//! - [`entry`]: the in-memory identifier to payload map
//! - [`snapshot`]: the `var SITE_CACHE = ...` artifact on disk
//! - [`merge`]: reassembly of paginated results
//! - [`refresh`]: stale-while-revalidate and the forgetting pass
//! - [`facade`]: the single entry point callers use

pub mod entry;
pub mod facade;
pub mod key;
pub mod merge;
pub mod refresh;
pub mod site;
pub mod snapshot;

#[cfg(test)]
mod test_support;

pub use crate::Error;

pub use entry::{Entry, EntryStore};
pub use facade::{FetchOutcome, PurgeReport, SiteCache};
pub use key::{PaginationShape, UNKNOWN_SITE, sanitize_slug};
pub use merge::{MergeReport, merge_fragments};
pub use refresh::{CachePolicy, RefreshCoordinator, RefreshReport};
pub use site::{RefreshGuard, Site};
pub use snapshot::SnapshotStore;
