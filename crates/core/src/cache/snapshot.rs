//! Per-site snapshot artifacts.
//!
//! Each site is persisted as `{dir}/{slug}.js`, a script that browsers can
//! load directly to preload the cache:
//!
//! ```text
//! var SITE_CACHE = {"/v0/app/Table":{"records":[...]}};
//! if (typeof window !== "undefined") { window.SITE_CACHE = SITE_CACHE; }
//! ```
//!
//! Only the identifier → payload mapping is stored. Timestamps are not, so a
//! loaded site looks freshly fetched.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde_json::Value;

use crate::Error;

/// Text preceding the serialized mapping.
pub const SNAPSHOT_PREFIX: &str = "var SITE_CACHE = ";

/// Text following the serialized mapping; exposes it as `window.SITE_CACHE`.
pub const SNAPSHOT_SUFFIX: &str = ";\nif (typeof window !== \"undefined\") { window.SITE_CACHE = SITE_CACHE; }\n";

/// Render a mapping as a snapshot artifact.
pub fn encode(payloads: &BTreeMap<String, Value>) -> Result<String, Error> {
    let body = serde_json::to_string(payloads).map_err(|e| Error::SnapshotWrite(e.to_string()))?;
    Ok(format!("{SNAPSHOT_PREFIX}{body}{SNAPSHOT_SUFFIX}"))
}

/// Parse the mapping embedded in a snapshot artifact.
///
/// The data region runs from the end of the prefix to the last `}` before
/// the suffix. Trailing whitespace and a missing suffix are tolerated.
pub fn decode(artifact: &str) -> Result<BTreeMap<String, Value>, Error> {
    let body = artifact
        .trim_start_matches('\u{feff}')
        .trim_start()
        .strip_prefix(SNAPSHOT_PREFIX)
        .ok_or_else(|| Error::SnapshotUnavailable("missing snapshot prefix".into()))?;

    let body = body.trim_end();
    let body = body.strip_suffix(SNAPSHOT_SUFFIX.trim_end()).unwrap_or(body);

    let end = body
        .rfind('}')
        .ok_or_else(|| Error::SnapshotUnavailable("no data region in snapshot".into()))?;

    serde_json::from_str(&body[..=end]).map_err(|e| Error::SnapshotUnavailable(e.to_string()))
}

/// Snapshot directory handle.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Artifact path for a site slug.
    pub fn path(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{slug}.js"))
    }

    /// Load a site's mapping.
    ///
    /// A missing artifact is an empty mapping, not an error.
    pub async fn load(&self, slug: &str) -> Result<BTreeMap<String, Value>, Error> {
        let path = self.path(slug);
        let artifact = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(Error::SnapshotUnavailable(format!("{}: {e}", path.display()))),
        };

        decode(&artifact)
    }

    /// Write a site's mapping, replacing the previous artifact atomically.
    pub async fn save(&self, slug: &str, payloads: &BTreeMap<String, Value>) -> Result<(), Error> {
        let artifact = encode(payloads)?;
        let path = self.path(slug);
        let tmp = self.dir.join(format!(".{slug}.js.tmp"));

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::SnapshotWrite(format!("{}: {e}", self.dir.display())))?;
        tokio::fs::write(&tmp, artifact)
            .await
            .map_err(|e| Error::SnapshotWrite(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::SnapshotWrite(format!("{}: {e}", path.display())))?;

        tracing::debug!(site = slug, entries = payloads.len(), "snapshot written");
        Ok(())
    }
}
