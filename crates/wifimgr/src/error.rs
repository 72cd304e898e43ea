//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use wifimgr_config::ConfigError;
use wifimgr_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    #[allow(dead_code)]
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const VENDOR: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const PARTIAL: i32 = 9;
    pub const BACKUP: i32 = 10;
}

fn joined(items: &[String]) -> String {
    if items.is_empty() {
        "none".into()
    } else {
        items.join(", ")
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {source}")]
    #[diagnostic(
        code(wifimgr::config),
        help("Check the config file at {path}, or point --config at another one.")
    )]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },

    #[error("No APIs are configured")]
    #[diagnostic(
        code(wifimgr::no_apis),
        help(
            "Add an [apis.<label>] table to {path}, for example:\n\n  \
             [apis.lab]\n  vendor = \"mist\"\n  adapter = \"fixture\"\n  fixture = \"lab.json\""
        )
    )]
    NoApis { path: String },

    #[error("API '{label}' is not configured")]
    #[diagnostic(
        code(wifimgr::not_configured),
        help("Configured APIs: {configured}. Run: wifimgr apis")
    )]
    NotConfigured { label: String, configured: String },

    #[error("Cannot tell which API owns site '{site}'")]
    #[diagnostic(
        code(wifimgr::unresolved_site),
        help(
            "Declare `api:` for the site in its intent file, or pass --api.\n\
             Configured APIs: {configured}"
        )
    )]
    UnresolvedSite { site: String, configured: String },

    // ── Lookup ───────────────────────────────────────────────────────
    #[error("{entity_type} '{identifier}' not found")]
    #[diagnostic(
        code(wifimgr::not_found),
        help("The cache may be stale. Run: wifimgr refresh")
    )]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error("{entity_type} '{identifier}' exists in more than one API")]
    #[diagnostic(
        code(wifimgr::ambiguous),
        help("Found in: {labels}. Pass --api to pick one.")
    )]
    Ambiguous {
        entity_type: String,
        identifier: String,
        labels: String,
    },

    // ── Apply ────────────────────────────────────────────────────────
    #[error("Apply rejected for API '{label}': {reason}")]
    #[diagnostic(
        code(wifimgr::apply_rejected),
        help("Nothing was written. Run `wifimgr apis` to see what each API supports.")
    )]
    ApplyRejected { label: String, reason: String },

    #[error("{operation} is not supported by API '{label}'")]
    #[diagnostic(code(wifimgr::unsupported))]
    Unsupported { operation: String, label: String },

    #[error("{failed} of {total} device writes failed")]
    #[diagnostic(
        code(wifimgr::apply_failed),
        help("Devices that were written are already live. Fix the failures and re-run apply.")
    )]
    ApplyFailed { failed: usize, total: usize },

    #[error("Apply was interrupted after {written} device(s)")]
    #[diagnostic(
        code(wifimgr::interrupted),
        help("Re-run apply to finish; devices already written will show as unchanged.")
    )]
    Interrupted { written: usize },

    // ── Vendor ───────────────────────────────────────────────────────
    #[error("Vendor error: {message}")]
    #[diagnostic(code(wifimgr::vendor))]
    Vendor { message: String },

    #[error("Timed out: {message}")]
    #[diagnostic(
        code(wifimgr::timeout),
        help("Safe to retry. Increase the limit with --timeout if it keeps happening.")
    )]
    Timeout { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(wifimgr::partial_refresh),
        help("The other APIs were refreshed; failed ones kept their previous snapshot.")
    )]
    PartialRefresh { message: String },

    #[error("Operation on API '{label}' was cancelled")]
    #[diagnostic(code(wifimgr::cancelled))]
    Cancelled { label: String },

    // ── Intent / backups ─────────────────────────────────────────────
    #[error("Invalid intent file {}: {message}", .path.display())]
    #[diagnostic(code(wifimgr::intent))]
    Intent { path: PathBuf, message: String },

    #[error("Backup {} failed integrity checks: {reason}", .path.display())]
    #[diagnostic(
        code(wifimgr::backup_integrity),
        help("Nothing was restored. Run: wifimgr backups list")
    )]
    BackupIntegrity { path: PathBuf, reason: String },

    // ── Input ────────────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(wifimgr::validation))]
    Validation { field: String, reason: String },

    #[error("'{action}' requires confirmation")]
    #[diagnostic(
        code(wifimgr::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(wifimgr::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. }
            | Self::NoApis { .. }
            | Self::NotConfigured { .. }
            | Self::UnresolvedSite { .. } => exit_code::CONFIG,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Ambiguous { .. } | Self::ApplyRejected { .. } | Self::Unsupported { .. } => {
                exit_code::CONFLICT
            }
            Self::Vendor { .. } => exit_code::VENDOR,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::PartialRefresh { .. } | Self::ApplyFailed { .. } | Self::Interrupted { .. } => {
                exit_code::PARTIAL
            }
            Self::BackupIntegrity { .. } => exit_code::BACKUP,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::Cancelled { .. } | Self::Intent { .. } | Self::Io(_) | Self::Internal(_) => {
                exit_code::GENERAL
            }
        }
    }

    pub fn config(path: &std::path::Path, source: ConfigError) -> Self {
        Self::Config {
            path: path.display().to_string(),
            source,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if err.is_retryable() {
            return Self::Timeout {
                message: err.to_string(),
            };
        }
        match err {
            CoreError::NotConfigured { label, configured } => Self::NotConfigured {
                label,
                configured: joined(&configured),
            },
            CoreError::UnresolvedSite { site, configured } => Self::UnresolvedSite {
                site,
                configured: joined(&configured),
            },
            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::NotFound {
                entity_type: entity_type.into(),
                identifier,
            },
            CoreError::Ambiguous {
                entity_type,
                identifier,
                labels,
            } => Self::Ambiguous {
                entity_type: entity_type.into(),
                identifier,
                labels: joined(&labels),
            },
            CoreError::Unsupported { operation, label } => Self::Unsupported { operation, label },
            CoreError::ApplyRejected { label, reason } => Self::ApplyRejected { label, reason },
            err @ CoreError::PartialRefreshFailure { .. } => Self::PartialRefresh {
                message: err.to_string(),
            },
            CoreError::Cancelled { label } => Self::Cancelled { label },
            err @ (CoreError::Vendor(_) | CoreError::RefreshStep { .. }) => Self::Vendor {
                message: err.to_string(),
            },
            CoreError::Intent { path, message } => Self::Intent { path, message },
            CoreError::BackupIntegrityFailure { path, reason } => {
                Self::BackupIntegrity { path, reason }
            }
            CoreError::Validation(reason) => Self::Validation {
                field: "input".into(),
                reason,
            },
            err @ CoreError::Io { .. } => Self::Internal(err.to_string()),
            CoreError::Serialization(message) | CoreError::Internal(message) => {
                Self::Internal(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let ambiguous = CliError::from(CoreError::Ambiguous {
            entity_type: "site",
            identifier: "HQ".into(),
            labels: vec!["meraki".into(), "mist".into()],
        });
        assert_eq!(ambiguous.exit_code(), exit_code::CONFLICT);

        let timeout = CliError::from(CoreError::Vendor(wifimgr_api::Error::Timeout {
            timeout_secs: 30,
        }));
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let missing = CliError::from(CoreError::NotFound {
            entity_type: "device",
            identifier: "001122334455".into(),
        });
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);

        let backup = CliError::from(CoreError::BackupIntegrityFailure {
            path: "lab.yaml.3".into(),
            reason: "no such file".into(),
        });
        assert_eq!(backup.exit_code(), exit_code::BACKUP);
    }
}
