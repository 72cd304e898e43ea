//! `backups` and `rollback`: intent backup housekeeping.

use std::fmt::Write as _;
use std::path::Path;

use tabled::Tabled;

use wifimgr_core::{
    BackupEntry, BackupManager, BackupPolicy, BackupValidation, CleanupReport, Fleet,
    IntentCatalog, RollbackOutcome,
};

use crate::cli::{BackupsArgs, BackupsCommand, GlobalOpts, RollbackArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "Site")]
    site: String,
    #[tabled(rename = "Serial")]
    serial: u32,
    #[tabled(rename = "Modified")]
    modified: String,
    #[tabled(rename = "Size")]
    size: u64,
    #[tabled(rename = "Path")]
    path: String,
}

impl From<&BackupEntry> for BackupRow {
    fn from(b: &BackupEntry) -> Self {
        Self {
            site: b.site.clone().unwrap_or_else(|| "-".into()),
            serial: b.serial,
            modified: b.modified.format("%Y-%m-%d %H:%M:%S").to_string(),
            size: b.size,
            path: b.path.display().to_string(),
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub fn handle(fleet: &Fleet, args: BackupsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        BackupsCommand::List { site } => {
            let entries = fleet.list_backups(site.as_deref())?;
            let out = output::render_list(global.output, &entries, BackupRow::from)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
        BackupsCommand::Cleanup { days } => {
            let report = fleet.cleanup_backups(days)?;
            let out = output::render_single(global.output, &report, cleanup_detail)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
        BackupsCommand::Validate { path } => validate(&path, global),
    }
}

fn cleanup_detail(report: &CleanupReport) -> String {
    let mut out = format!(
        "removed {} backup(s), renumbered {}",
        report.removed.len(),
        report.renumbered
    );
    for path in &report.removed {
        let _ = write!(out, "\n  - {}", path.display());
    }
    out
}

fn validation_detail(v: &BackupValidation) -> String {
    format!(
        "{} is valid: version {}, {} site(s) [{}], {} device(s)",
        v.path.display(),
        v.version,
        v.sites.len(),
        v.sites.join(", "),
        v.devices
    )
}

/// Check a backup file on its own; no configuration is needed.
pub fn validate(path: &Path, global: &GlobalOpts) -> Result<(), CliError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let manager = BackupManager::new(IntentCatalog::new(dir), BackupPolicy::default());
    let validation = manager.validate_backup(path)?;
    let out = output::render_single(global.output, &validation, validation_detail)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn rollback_detail(outcome: &RollbackOutcome) -> String {
    let mut out = format!(
        "restored {} from backup {} into {}",
        outcome.site,
        outcome.restored_serial,
        outcome.live_path.display()
    );
    if let Some(previous) = &outcome.previous {
        let _ = write!(out, "\nprevious intent saved as {}", previous.path.display());
    }
    out
}

pub fn rollback(fleet: &Fleet, args: &RollbackArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let prompt = format!(
        "Replace the intent for {} with backup {}?",
        args.site, args.serial
    );
    if !util::confirm(&prompt, "rollback", global.yes)? {
        output::status("Aborted.", global.quiet);
        return Ok(());
    }

    let outcome = fleet.rollback(&args.site, args.serial)?;
    let out = output::render_single(global.output, &outcome, rollback_detail)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
