// ── Cache snapshot files ──
//
// One JSON document per API label under the cache directory. Writes go to
// a temp file in the same directory and are renamed over the old file, so
// a crash mid-write leaves the previous snapshot readable.

use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{ApiCache, CACHE_SCHEMA_VERSION};

/// What was found on disk for a label at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadStatus {
    Loaded,
    Missing,
    Corrupt { reason: String },
}

impl LoadStatus {
    /// A full refresh is the only way to get usable data.
    pub fn needs_refresh(&self) -> bool {
        !matches!(self, Self::Loaded)
    }
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot file for `label`. Bytes outside `[A-Za-z0-9._-]` are
    /// percent-encoded, so distinct labels never share a file.
    pub fn path_for(&self, label: &str) -> PathBuf {
        let mut safe = String::with_capacity(label.len());
        for byte in label.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
                safe.push(char::from(byte));
            } else {
                let _ = write!(safe, "%{byte:02X}");
            }
        }
        self.dir.join(format!("{safe}.json"))
    }

    /// Read the snapshot for `label`. Never fails: a missing, unreadable,
    /// or incompatible file yields an empty cache and a status saying why.
    pub fn load(&self, label: &str, vendor: &str) -> (ApiCache, LoadStatus) {
        let path = self.path_for(label);
        let empty = || ApiCache::empty(label, vendor);

        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(label, path = %path.display(), "no cache snapshot on disk");
                return (empty(), LoadStatus::Missing);
            }
            Err(e) => return corrupt(label, &path, e.to_string(), empty()),
        };

        let mut cache: ApiCache = match serde_json::from_slice(&raw) {
            Ok(cache) => cache,
            Err(e) => return corrupt(label, &path, e.to_string(), empty()),
        };

        if cache.meta.schema_version != CACHE_SCHEMA_VERSION {
            let reason = format!(
                "schema version {} (expected {CACHE_SCHEMA_VERSION})",
                cache.meta.schema_version
            );
            return corrupt(label, &path, reason, empty());
        }
        if cache.meta.vendor != vendor {
            let reason = format!("written for vendor '{}', label is now '{vendor}'", cache.meta.vendor);
            return corrupt(label, &path, reason, empty());
        }

        cache.meta.label = label.to_owned();
        cache.rebuild_indexes();
        debug!(label, sites = cache.sites.len(), "loaded cache snapshot");
        (cache, LoadStatus::Loaded)
    }

    /// Write `cache` to its snapshot file, replacing the previous one.
    pub fn save(&self, cache: &ApiCache) -> Result<PathBuf, CoreError> {
        let path = self.path_for(cache.label());
        std::fs::create_dir_all(&self.dir).map_err(|e| CoreError::io(&self.dir, e))?;

        let body = serde_json::to_vec_pretty(cache)?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| CoreError::io(&self.dir, e))?;
        tmp.write_all(&body).map_err(|e| CoreError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| CoreError::io(&path, e.error))?;

        debug!(label = %cache.label(), path = %path.display(), bytes = body.len(), "persisted cache snapshot");
        Ok(path)
    }
}

fn corrupt(label: &str, path: &Path, reason: String, empty: ApiCache) -> (ApiCache, LoadStatus) {
    warn!(
        label,
        path = %path.display(),
        %reason,
        "cache snapshot unusable; starting empty (run a refresh)"
    );
    (empty, LoadStatus::Corrupt { reason })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wifimgr_api::SiteRecord;

    fn populated() -> ApiCache {
        let mut cache = ApiCache::empty("mist-prod", "mist");
        cache.sites.insert(
            "s-1".into(),
            SiteRecord {
                id: "s-1".into(),
                name: "HQ".into(),
                country_code: None,
                timezone: None,
                address: None,
                extra: serde_json::Map::new(),
            },
        );
        cache.meta.last_refresh = Some(chrono::Utc::now());
        cache.rebuild_indexes();
        cache
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));
        store.save(&populated()).unwrap();

        let (cache, status) = store.load("mist-prod", "mist");
        assert_eq!(status, LoadStatus::Loaded);
        assert_eq!(cache.site_id("HQ"), Some("s-1"));
    }

    #[test]
    fn missing_file_is_empty_not_error() {
        let dir = TempDir::new().unwrap();
        let (cache, status) = CacheStore::new(dir.path()).load("mist", "mist");
        assert_eq!(status, LoadStatus::Missing);
        assert!(!cache.is_populated());
    }

    #[test]
    fn corrupt_file_is_empty_not_error() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        std::fs::write(store.path_for("mist"), b"{ not json").unwrap();

        let (cache, status) = store.load("mist", "mist");
        assert!(matches!(status, LoadStatus::Corrupt { .. }));
        assert!(status.needs_refresh());
        assert!(cache.sites.is_empty());
    }

    #[test]
    fn unknown_schema_version_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        let mut cache = populated();
        cache.meta.schema_version = CACHE_SCHEMA_VERSION + 1;
        store.save(&cache).unwrap();

        let (loaded, status) = store.load("mist-prod", "mist");
        assert!(matches!(status, LoadStatus::Corrupt { .. }));
        assert!(loaded.sites.is_empty());
    }

    #[test]
    fn label_is_encoded_for_file_names() {
        let store = CacheStore::new("/tmp/c");
        assert_eq!(
            store.path_for("acme/west lab"),
            PathBuf::from("/tmp/c/acme%2Fwest%20lab.json")
        );
        assert_eq!(store.path_for("mist-lab_2.eu"), PathBuf::from("/tmp/c/mist-lab_2.eu.json"));
        assert_ne!(store.path_for("a/b"), store.path_for("a_b"));
        assert_ne!(store.path_for("a%2Fb"), store.path_for("a/b"));
    }
}
