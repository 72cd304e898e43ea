// ── Intent backups ──
//
// Backups sit next to the live intent file as `<file>.<serial>`, serial 0
// being the most recent. A new backup shifts every serial up by one; the
// serial is a recency rank, not a timestamp. Rollback restores a backup
// over the live file and backs up what it replaced, so a second rollback
// undoes the first.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::BackupPolicy;
use crate::error::CoreError;
use crate::intent::{IntentCatalog, IntentFile, write_atomic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupEntry {
    /// Site the listing was made for, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    pub serial: u32,
    pub path: PathBuf,
    pub live_path: PathBuf,
    pub modified: DateTime<Utc>,
    pub size: u64,
}

/// Result of restoring a backup.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackOutcome {
    pub site: String,
    pub live_path: PathBuf,
    pub restored_serial: u32,
    /// Backup of the file that was replaced (serial 0).
    pub previous: Option<BackupEntry>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    /// Files renamed to close serial gaps.
    pub renumbered: usize,
}

/// Summary of a structurally valid backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupValidation {
    pub path: PathBuf,
    pub version: u32,
    pub sites: Vec<String>,
    pub devices: usize,
}

fn serial_path(live: &Path, serial: u32) -> PathBuf {
    let mut name = live.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{serial}"));
    live.with_file_name(name)
}

fn integrity(path: &Path, reason: impl Into<String>) -> CoreError {
    CoreError::BackupIntegrityFailure {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// `(serial, path)` for every backup of `live`, ascending.
pub fn backups_of(live: &Path) -> Result<Vec<(u32, PathBuf)>, CoreError> {
    let Some(name) = live.file_name().and_then(|n| n.to_str()) else {
        return Ok(Vec::new());
    };
    let dir = match live.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let prefix = format!("{name}.");

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CoreError::io(dir, e)),
    };
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CoreError::io(dir, e))?;
        let file_name = entry.file_name();
        let Some(serial) = file_name
            .to_str()
            .and_then(|f| f.strip_prefix(&prefix))
            .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<u32>().ok())
        else {
            continue;
        };
        found.push((serial, entry.path()));
    }
    found.sort();
    Ok(found)
}

fn entry(site: Option<&str>, live: &Path, serial: u32, path: PathBuf) -> Result<BackupEntry, CoreError> {
    let meta = std::fs::metadata(&path).map_err(|e| CoreError::io(&path, e))?;
    let modified = meta.modified().map_err(|e| CoreError::io(&path, e))?;
    Ok(BackupEntry {
        site: site.map(str::to_owned),
        serial,
        path,
        live_path: live.to_path_buf(),
        modified: DateTime::<Utc>::from(modified),
        size: meta.len(),
    })
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    catalog: IntentCatalog,
    policy: BackupPolicy,
}

impl BackupManager {
    pub fn new(catalog: IntentCatalog, policy: BackupPolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn policy(&self) -> &BackupPolicy {
        &self.policy
    }

    /// Copy `live` to serial 0, shifting older backups up and trimming
    /// past `max_backups`. Returns `None` if there is no live file.
    pub fn create_backup(&self, live: &Path) -> Result<Option<BackupEntry>, CoreError> {
        let contents = match std::fs::read(live) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %live.display(), "no live file to back up");
                return Ok(None);
            }
            Err(e) => return Err(CoreError::io(live, e)),
        };

        // Highest first so no rename lands on an existing file.
        for (serial, path) in backups_of(live)?.into_iter().rev() {
            let Some(next) = serial.checked_add(1).map(|n| serial_path(live, n)) else {
                warn!(path = %path.display(), "backup serial cannot shift further; left for trimming");
                continue;
            };
            std::fs::rename(&path, &next).map_err(|e| CoreError::io(&path, e))?;
        }

        let newest = serial_path(live, 0);
        write_atomic(&newest, &contents)?;

        let keep = u32::try_from(self.policy.max_backups.max(1)).unwrap_or(u32::MAX);
        for (serial, path) in backups_of(live)? {
            if serial >= keep {
                std::fs::remove_file(&path).map_err(|e| CoreError::io(&path, e))?;
                debug!(path = %path.display(), "trimmed backup beyond retention cap");
            }
        }

        info!(path = %newest.display(), "intent backup created");
        entry(None, live, 0, newest).map(Some)
    }

    /// Backups for one site, or for every site in the catalog, sorted by
    /// site then serial.
    pub fn list_backups(&self, site: Option<&str>) -> Result<Vec<BackupEntry>, CoreError> {
        let targets: Vec<(String, PathBuf)> = match site {
            Some(site) => vec![(site.to_owned(), self.live_path_for(site, None)?)],
            None => self.catalog.sites()?,
        };

        let mut entries = Vec::new();
        for (site, live) in targets {
            for (serial, path) in backups_of(&live)? {
                entries.push(entry(Some(&site), &live, serial, path)?);
            }
        }
        entries.sort_by(|a, b| a.site.cmp(&b.site).then(a.serial.cmp(&b.serial)));
        Ok(entries)
    }

    /// Make backup `serial` the live file for `site`. The backup is
    /// validated first; an invalid backup aborts before anything changes.
    pub fn rollback(&self, site: &str, serial: u32) -> Result<RollbackOutcome, CoreError> {
        let live = self.live_path_for(site, Some(serial))?;
        let target = serial_path(&live, serial);
        if !target.exists() {
            return Err(integrity(&target, format!("no backup with serial {serial}")));
        }
        let report = self.validate_backup(&target)?;
        if !report.sites.iter().any(|s| s == site) {
            return Err(integrity(&target, format!("backup does not declare site '{site}'")));
        }

        let contents = std::fs::read(&target).map_err(|e| CoreError::io(&target, e))?;
        let previous = self.create_backup(&live)?;
        write_atomic(&live, &contents)?;

        info!(site, serial, path = %live.display(), "rolled back intent");
        Ok(RollbackOutcome {
            site: site.to_owned(),
            live_path: live,
            restored_serial: serial,
            previous,
        })
    }

    /// Delete backups at least `retention_days` old, except serial 0, then
    /// renumber the survivors contiguously.
    pub fn cleanup_backups(&self, retention_days: u32) -> Result<CleanupReport, CoreError> {
        let window = Duration::from_secs(u64::from(retention_days) * 86_400);
        let now = SystemTime::now();
        let mut report = CleanupReport::default();

        for live in self.catalog.files()? {
            let mut survivors = Vec::new();
            for (serial, path) in backups_of(&live)? {
                if serial == 0 {
                    survivors.push((serial, path));
                    continue;
                }
                let modified = std::fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .map_err(|e| CoreError::io(&path, e))?;
                let age = now.duration_since(modified).unwrap_or_default();
                if age >= window {
                    std::fs::remove_file(&path).map_err(|e| CoreError::io(&path, e))?;
                    debug!(path = %path.display(), age_days = age.as_secs() / 86_400, "removed expired backup");
                    report.removed.push(path);
                } else {
                    survivors.push((serial, path));
                }
            }

            // Ascending, so every target serial is already free.
            for (rank, (serial, path)) in (0u32..).zip(survivors) {
                if rank != serial {
                    let next = serial_path(&live, rank);
                    std::fs::rename(&path, &next).map_err(|e| CoreError::io(&path, e))?;
                    report.renumbered += 1;
                }
            }
        }

        info!(removed = report.removed.len(), renumbered = report.renumbered, "backup cleanup finished");
        Ok(report)
    }

    /// Structural check of a backup file. Touches nothing.
    pub fn validate_backup(&self, path: &Path) -> Result<BackupValidation, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|e| integrity(path, e.to_string()))?;
        let file = IntentFile::parse(path, &raw).map_err(|e| match e {
            CoreError::Intent { message, .. } => integrity(path, message),
            other => integrity(path, other.to_string()),
        })?;
        Ok(BackupValidation {
            path: path.to_path_buf(),
            version: file.version,
            devices: file
                .config
                .sites
                .values()
                .map(|s| s.devices.ap.len() + s.devices.switch.len() + s.devices.gateway.len())
                .sum(),
            sites: file.config.sites.into_keys().collect(),
        })
    }

    /// Live file holding `site`. When the live file no longer parses or no
    /// longer declares the site, fall back to the file whose backup at
    /// `serial` declares it.
    fn live_path_for(&self, site: &str, serial: Option<u32>) -> Result<PathBuf, CoreError> {
        let err = match self.catalog.locate(site) {
            Ok(path) => return Ok(path),
            Err(e @ (CoreError::Intent { .. } | CoreError::NotFound { .. })) => e,
            Err(e) => return Err(e),
        };

        let mut candidates = Vec::new();
        for live in self.catalog.files()? {
            let declares = backups_of(&live)?
                .into_iter()
                .filter(|(s, _)| serial.is_none_or(|want| *s == want))
                .any(|(_, path)| {
                    IntentFile::load(&path).is_ok_and(|f| f.site(site).is_some())
                });
            if declares {
                candidates.push(live);
            }
        }
        if candidates.len() == 1 {
            let live = candidates.remove(0);
            warn!(site, path = %live.display(), "live intent unusable; using backups of this file");
            return Ok(live);
        }
        Err(err)
    }
}
