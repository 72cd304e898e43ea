// Vendor client boundary
//
// One trait covers every capability group. Adapters override the methods
// for the capabilities they declare; everything else falls through to a
// default body that reports `Error::Unsupported`, so a missing capability
// is a typed answer rather than an absent method.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::capability::{Capability, CapabilitySet};
use crate::error::Error;
use crate::models::{
    DeviceRecord, DeviceType, DeviceUpdate, InventoryRecord, ProfileRecord, SearchHit, SiteRecord,
    WlanRecord,
};

/// A connection to one vendor account.
#[async_trait]
pub trait VendorClient: Send + Sync {
    /// Vendor type string (e.g. `"mist"`, `"meraki"`).
    fn vendor(&self) -> &str;

    /// Capabilities this adapter implements.
    fn capabilities(&self) -> CapabilitySet;

    /// `true` when per-device configs are expensive to fetch and should be
    /// pulled on demand instead of during a full refresh.
    fn lazy_device_configs(&self) -> bool {
        false
    }

    /// Device families this adapter can write.
    fn writable_device_types(&self) -> Vec<DeviceType> {
        if self.capabilities().contains(Capability::Devices) {
            vec![DeviceType::Ap, DeviceType::Switch, DeviceType::Gateway]
        } else {
            Vec::new()
        }
    }

    // ── Sites ─────────────────────────────────────────────────────────

    async fn list_sites(&self) -> Result<Vec<SiteRecord>, Error> {
        Err(Error::unsupported(self.vendor(), Capability::Sites))
    }

    async fn get_site(&self, site_id: &str) -> Result<SiteRecord, Error> {
        let _ = site_id;
        Err(Error::unsupported(self.vendor(), Capability::Sites))
    }

    // ── Inventory ─────────────────────────────────────────────────────

    async fn list_inventory(&self) -> Result<Vec<InventoryRecord>, Error> {
        Err(Error::unsupported(self.vendor(), Capability::Inventory))
    }

    // ── Devices ───────────────────────────────────────────────────────

    async fn list_device_configs(
        &self,
        site_id: &str,
        device_type: DeviceType,
    ) -> Result<Vec<DeviceRecord>, Error> {
        let _ = (site_id, device_type);
        Err(Error::unsupported(self.vendor(), Capability::Devices))
    }

    async fn get_device(&self, site_id: &str, device_id: &str) -> Result<DeviceRecord, Error> {
        let _ = (site_id, device_id);
        Err(Error::unsupported(self.vendor(), Capability::Devices))
    }

    async fn update_device(
        &self,
        site_id: &str,
        device_id: &str,
        update: &DeviceUpdate,
    ) -> Result<DeviceRecord, Error> {
        let _ = (site_id, device_id, update);
        Err(Error::unsupported(self.vendor(), Capability::Devices))
    }

    /// Assign an inventory device (by MAC) to a site and apply an initial
    /// configuration.
    async fn assign_device(
        &self,
        site_id: &str,
        mac: &str,
        update: &DeviceUpdate,
    ) -> Result<DeviceRecord, Error> {
        let _ = (site_id, mac, update);
        Err(Error::unsupported(self.vendor(), Capability::Devices))
    }

    // ── WLANs / profiles ──────────────────────────────────────────────

    async fn list_wlans(&self) -> Result<Vec<WlanRecord>, Error> {
        Err(Error::unsupported(self.vendor(), Capability::Wlans))
    }

    async fn list_device_profiles(&self) -> Result<Vec<ProfileRecord>, Error> {
        Err(Error::unsupported(self.vendor(), Capability::Profiles))
    }

    async fn list_rf_templates(&self) -> Result<Vec<ProfileRecord>, Error> {
        Err(Error::unsupported(self.vendor(), Capability::RfTemplates))
    }

    // ── Search ────────────────────────────────────────────────────────

    async fn search_devices(&self, query: &str) -> Result<Vec<SearchHit>, Error> {
        let _ = query;
        Err(Error::unsupported(self.vendor(), Capability::Search))
    }
}

/// Connection settings handed to a [`VendorFactory`].
#[derive(Debug, Clone, Default)]
pub struct VendorSettings {
    pub label: String,
    pub vendor: String,
    pub base_url: Option<String>,
    pub org_id: Option<String>,
    pub api_token: Option<SecretString>,
    /// Backing file for the fixture adapter.
    pub fixture: Option<PathBuf>,
    pub timeout_secs: u64,
    /// Adapter-specific free-form options.
    pub options: BTreeMap<String, String>,
}

/// Builds clients for one adapter kind.
pub trait VendorFactory: Send + Sync {
    /// Adapter name this factory answers to in configuration.
    fn adapter(&self) -> &str;

    fn build(&self, settings: &VendorSettings) -> Result<Arc<dyn VendorClient>, Error>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct SitesOnly;

    #[async_trait]
    impl VendorClient for SitesOnly {
        fn vendor(&self) -> &str {
            "bare"
        }

        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::empty().with(Capability::Sites)
        }

        async fn list_sites(&self) -> Result<Vec<SiteRecord>, Error> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn missing_capabilities_report_unsupported() {
        let client = SitesOnly;
        assert!(client.list_sites().await.unwrap().is_empty());

        let err = client.list_wlans().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Unsupported {
                capability: Capability::Wlans,
                ..
            }
        ));
        assert!(client.writable_device_types().is_empty());
    }

    #[test]
    fn settings_debug_redacts_token() {
        let settings = VendorSettings {
            label: "lab".into(),
            api_token: Some(SecretString::from("hunter2".to_string())),
            ..VendorSettings::default()
        };
        let dbg = format!("{settings:?}");
        assert!(!dbg.contains("hunter2"));
    }
}
