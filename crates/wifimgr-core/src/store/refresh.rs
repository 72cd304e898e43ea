// ── Full refresh fetch sequence ──
//
// Pulls everything one vendor knows into a `RefreshSnapshot`, then folds
// it into a brand-new `ApiCache`. Nothing here touches the published
// snapshot: the caller swaps the result in only when every required step
// succeeded.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use wifimgr_api::{
    Capability, DeviceRecord, DeviceType, InventoryRecord, ProfileRecord, SiteRecord, VendorClient,
    WlanRecord,
};

use crate::convert::Source;
use crate::error::CoreError;
use crate::model::{ApiCache, DeviceStatus};

const DEVICE_TYPES: [DeviceType; 3] = [DeviceType::Ap, DeviceType::Switch, DeviceType::Gateway];

/// Raw vendor records fetched during a single refresh.
#[derive(Debug, Default)]
pub(crate) struct RefreshSnapshot {
    pub sites: Vec<SiteRecord>,
    pub inventory: Vec<InventoryRecord>,
    pub configs: Vec<DeviceRecord>,
    pub wlans: Vec<WlanRecord>,
    pub device_profiles: Vec<ProfileRecord>,
    pub rf_templates: Vec<ProfileRecord>,
}

fn step<'a>(label: &'a str, step: &'static str) -> impl FnOnce(wifimgr_api::Error) -> CoreError + 'a {
    move |source| match source {
        wifimgr_api::Error::Unsupported { .. } => CoreError::vendor(label, source),
        source => CoreError::RefreshStep {
            label: label.to_owned(),
            step,
            source,
        },
    }
}

/// Run the fetch sequence: sites, inventory, configs, then the optional
/// WLAN and profile groups.
pub(crate) async fn fetch_snapshot(
    label: &str,
    client: &dyn VendorClient,
) -> Result<RefreshSnapshot, CoreError> {
    let caps = client.capabilities();
    let mut snap = RefreshSnapshot {
        sites: client.list_sites().await.map_err(step(label, "sites"))?,
        inventory: client
            .list_inventory()
            .await
            .map_err(step(label, "inventory"))?,
        ..RefreshSnapshot::default()
    };
    debug!(label, sites = snap.sites.len(), inventory = snap.inventory.len(), "fetched sites and inventory");

    if !caps.contains(Capability::Devices) {
        debug!(label, "vendor has no device capability; skipping configs");
    } else if client.lazy_device_configs() {
        debug!(label, "device configs are fetched on demand");
    } else {
        for site in &snap.sites {
            for device_type in DEVICE_TYPES {
                let records = client
                    .list_device_configs(&site.id, device_type)
                    .await
                    .map_err(step(label, "device configs"))?;
                snap.configs.extend(records);
            }
        }
        debug!(label, configs = snap.configs.len(), "fetched device configs");
    }

    if caps.contains(Capability::Wlans) {
        snap.wlans = client.list_wlans().await.map_err(step(label, "wlans"))?;
    }
    if caps.contains(Capability::Profiles) {
        snap.device_profiles = client
            .list_device_profiles()
            .await
            .map_err(step(label, "device profiles"))?;
    }
    if caps.contains(Capability::RfTemplates) {
        snap.rf_templates = client
            .list_rf_templates()
            .await
            .map_err(step(label, "rf templates"))?;
    }

    Ok(snap)
}

impl RefreshSnapshot {
    /// Fold the raw records into a fresh cache. Records with an
    /// unparseable MAC are dropped with a warning.
    pub(crate) fn into_cache(self, label: &str, vendor: &str, now: DateTime<Utc>) -> ApiCache {
        let source = Source { label, vendor };
        let mut cache = ApiCache::empty(label, vendor);

        cache.sites = self
            .sites
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();

        for rec in self.inventory {
            let status = rec.status.clone();
            match source.inventory_item(rec) {
                Ok(item) => {
                    if let Some(status) = status {
                        cache
                            .device_status
                            .insert(item.mac.clone(), DeviceStatus { status });
                    }
                    cache.inventory.insert(item.device_type, item.mac.clone(), item);
                }
                Err(e) => warn!(label, error = %e, "skipping inventory record"),
            }
        }

        for rec in self.configs {
            let status = rec.status.clone();
            match source.device_config(rec) {
                Ok(config) => {
                    if let Some(status) = status {
                        cache
                            .device_status
                            .insert(config.mac.clone(), DeviceStatus { status });
                    }
                    cache.upsert_device(config);
                }
                Err(e) => warn!(label, error = %e, "skipping device config"),
            }
        }

        cache.wlans = self.wlans;
        cache.device_profiles = by_id(self.device_profiles);
        cache.rf_templates = by_id(self.rf_templates);
        cache.meta.last_refresh = Some(now);
        cache.rebuild_indexes();
        cache
    }
}

fn by_id(records: Vec<ProfileRecord>) -> HashMap<String, ProfileRecord> {
    records.into_iter().map(|p| (p.id.clone(), p)).collect()
}
