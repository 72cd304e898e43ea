use thiserror::Error;

use crate::capability::Capability;

/// Top-level error type for the `wifimgr-api` crate.
///
/// Covers every failure mode a vendor adapter can surface: missing
/// capabilities, rejected writes, throttling, timeouts, and malformed
/// payloads. `wifimgr-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Capability ──────────────────────────────────────────────────
    /// The adapter does not implement this capability at all.
    #[error("{vendor} does not support {capability}")]
    Unsupported {
        vendor: String,
        capability: Capability,
    },

    // ── Remote ──────────────────────────────────────────────────────
    /// The vendor has no such object.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// The vendor refused the request (validation, permissions, ...).
    #[error("request rejected by vendor: {message}")]
    Rejected { message: String },

    /// Generic vendor-side failure with an optional HTTP-ish status.
    #[error("vendor error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Vendor { message: String, status: Option<u16> },

    /// Throttled by the vendor API.
    #[error("rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Request timed out.
    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Local ───────────────────────────────────────────────────────
    /// Adapter configuration is missing or invalid.
    #[error("invalid adapter configuration: {0}")]
    Config(String),

    /// JSON decoding failed, with the raw body for debugging.
    #[error("deserialization error: {message}")]
    Deserialization { message: String, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn unsupported(vendor: impl Into<String>, capability: Capability) -> Self {
        Self::Unsupported {
            vendor: vendor.into(),
            capability,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::RateLimited { .. } => true,
            Self::Vendor { status, .. } => matches!(status, Some(502..=504)),
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Vendor { status: Some(404), .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Deserialization {
            message: err.to_string(),
            body: String::new(),
        }
    }
}
