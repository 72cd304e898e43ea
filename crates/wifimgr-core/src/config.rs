// ── Runtime configuration ──
//
// These types describe where the core keeps its files and how it behaves.
// They never touch disk themselves: the config crate builds a
// `FleetConfig` from the TOML profile and hands it in.

use std::path::PathBuf;
use std::time::Duration;

/// Backup retention settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPolicy {
    /// Highest number of backups kept per intent file (serials `0..max`).
    pub max_backups: usize,
    /// Default window for `cleanup_backups`.
    pub retention_days: u32,
}

impl Default for BackupPolicy {
    fn default() -> Self {
        Self {
            max_backups: 10,
            retention_days: 30,
        }
    }
}

/// When the engine refreshes a cache before diffing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Refresh stale caches automatically.
    pub auto: bool,
    /// A cache older than this is stale.
    pub max_age: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            auto: false,
            max_age: Duration::from_secs(3600),
        }
    }
}

/// Everything the core needs to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetConfig {
    /// Directory holding one cache snapshot file per API label.
    pub cache_dir: PathBuf,
    /// Directory scanned for intent files.
    pub intent_dir: PathBuf,
    pub backup: BackupPolicy,
    pub refresh: RefreshPolicy,
}

impl FleetConfig {
    pub fn new(cache_dir: impl Into<PathBuf>, intent_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            intent_dir: intent_dir.into(),
            backup: BackupPolicy::default(),
            refresh: RefreshPolicy::default(),
        }
    }
}
