//! Multi-vendor cache and intent reconciliation engine.
//!
//! Sits between `wifimgr-api` vendor clients and the CLI:
//!
//! - **[`ClientRegistry`]** holds one vendor client per API label, built
//!   from configuration. Vendor type and capabilities are captured at
//!   registration so they can be queried offline.
//!
//! - **[`CacheManager`]** keeps one immutable [`ApiCache`] snapshot per
//!   label. [`refresh_api`](CacheManager::refresh_api) builds a complete
//!   replacement and swaps it in; a failed or cancelled refresh leaves the
//!   old snapshot published. [`refresh_all_apis`](CacheManager::refresh_all_apis)
//!   runs one task per label and reports failures per label.
//!
//! - **[`CacheAccessor`]** resolves sites, devices and profiles across
//!   every snapshot. Names found in more than one API are reported as
//!   [`CoreError::Ambiguous`], never silently resolved.
//!
//! - **[`ApplyEngine`]** diffs the declared intent against live state and
//!   writes changed devices one at a time, backing up the intent file
//!   before the first write.
//!
//! - **[`BackupManager`]** keeps serial-numbered intent backups and
//!   restores them.
//!
//! [`Fleet`] wires all of these together.

pub mod accessor;
pub mod backup;
pub mod config;
mod convert;
pub mod diff;
pub mod engine;
pub mod error;
pub mod fleet;
pub mod intent;
pub mod model;
pub mod registry;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use accessor::{CacheAccessor, ConfigRef, DeviceRef, ProfileRef, SiteRef};
pub use backup::{BackupEntry, BackupManager, BackupValidation, CleanupReport, RollbackOutcome};
pub use config::{BackupPolicy, FleetConfig, RefreshPolicy};
pub use diff::{DeviceDiff, DiffCounts, FieldChange, SiteDiff, UnmanagedDevice, Verdict};
pub use engine::{
    ApplyEngine, ApplyOutcome, ApplyRequest, DeviceFailure, DiffOutcome, ImportOutcome,
    RefreshMode, Resolution, ResolutionSource,
};
pub use error::CoreError;
pub use fleet::Fleet;
pub use intent::{CURRENT_INTENT_VERSION, IntentCatalog, IntentDevice, IntentFile, IntentSite};
pub use registry::{ApiInfo, ClientHealth, ClientRegistry, FactoryTable, RegistrationFailure};
pub use store::{CacheManager, CacheStore, LoadStatus, RefreshReport};

pub use model::{
    ApiCache, Channel, DeviceConfig, DeviceSettings, DeviceType, InventoryItem, MacAddress, normalize_mac,
};
