// ── Core error types ──
//
// Domain errors from wifimgr-core. Callers never see adapter-level
// details directly: the `From<wifimgr_api::Error>` impl translates
// vendor failures into the variants below.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("API '{label}' is not configured (configured: {})", list(.configured))]
    NotConfigured {
        label: String,
        configured: Vec<String>,
    },

    #[error("cannot determine which API owns site '{site}' (configured: {})", list(.configured))]
    UnresolvedSite {
        site: String,
        configured: Vec<String>,
    },

    // ── Lookup ───────────────────────────────────────────────────────
    #[error("{entity_type} '{identifier}' not found")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    #[error(
        "{entity_type} '{identifier}' exists in more than one API ({}); specify one",
        list(.labels)
    )]
    Ambiguous {
        entity_type: &'static str,
        identifier: String,
        labels: Vec<String>,
    },

    // ── Capability / apply ───────────────────────────────────────────
    #[error("operation not supported: {operation} on API '{label}'")]
    Unsupported { operation: String, label: String },

    #[error("apply rejected for API '{label}': {reason}")]
    ApplyRejected { label: String, reason: String },

    // ── Refresh ──────────────────────────────────────────────────────
    #[error("refresh of API '{label}' failed during {step}: {source}")]
    RefreshStep {
        label: String,
        step: &'static str,
        #[source]
        source: wifimgr_api::Error,
    },

    #[error("{} of {total} APIs failed to refresh: {}", .failed.len(), summarize(.failed))]
    PartialRefreshFailure {
        total: usize,
        failed: BTreeMap<String, String>,
    },

    #[error("operation on API '{label}' was cancelled")]
    Cancelled { label: String },

    // ── Vendor ───────────────────────────────────────────────────────
    #[error("vendor error: {0}")]
    Vendor(#[source] wifimgr_api::Error),

    // ── Intent / backups ─────────────────────────────────────────────
    #[error("intent file {}: {message}", .path.display())]
    Intent { path: PathBuf, message: String },

    #[error("backup integrity failure for {}: {reason}", .path.display())]
    BackupIntegrityFailure { path: PathBuf, reason: String },

    // ── Local IO ─────────────────────────────────────────────────────
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "none".into()
    } else {
        items.join(", ")
    }
}

fn summarize(failed: &BTreeMap<String, String>) -> String {
    failed
        .iter()
        .map(|(label, err)| format!("{label}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Translate a vendor error raised while talking to `label`. Missing
    /// capabilities name the label rather than the vendor.
    pub(crate) fn vendor(label: &str, err: wifimgr_api::Error) -> Self {
        match err {
            wifimgr_api::Error::Unsupported { capability, .. } => Self::Unsupported {
                operation: capability.to_string(),
                label: label.to_owned(),
            },
            other => other.into(),
        }
    }

    pub(crate) fn not_found(entity_type: &'static str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            identifier: identifier.into(),
        }
    }

    /// Timeouts, throttling, and gateway errors. These never corrupt cache
    /// state; the operation can simply be re-run.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Vendor(e) | Self::RefreshStep { source: e, .. } => e.is_transient(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Vendor(e) | Self::RefreshStep { source: e, .. } => e.is_not_found(),
            _ => false,
        }
    }
}

// ── Conversion from vendor-layer errors ──────────────────────────────

impl From<wifimgr_api::Error> for CoreError {
    fn from(err: wifimgr_api::Error) -> Self {
        match err {
            wifimgr_api::Error::Unsupported { vendor, capability } => Self::Unsupported {
                operation: capability.to_string(),
                label: vendor,
            },
            wifimgr_api::Error::NotFound { kind, id } => Self::NotFound {
                entity_type: kind,
                identifier: id,
            },
            other => Self::Vendor(other),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
