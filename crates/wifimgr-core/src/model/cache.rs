// ── Per-vendor cache snapshot ──
//
// One `ApiCache` holds everything known about one API label at one point
// in time. Snapshots are immutable once published: refreshes build a new
// value and swap it in, and single-device merges clone-then-swap.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::device::{DeviceConfig, DeviceStatus, InventoryItem};
use super::mac::MacAddress;
use wifimgr_api::{DeviceType, ProfileRecord, SiteRecord, WlanRecord};

/// Bumped whenever the on-disk layout changes incompatibly.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub label: String,
    pub vendor: String,
    pub last_refresh: Option<DateTime<Utc>>,
    pub schema_version: u32,
}

/// Site name ↔ id lookup tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteIndex {
    pub by_name: HashMap<String, String>,
    pub by_id: HashMap<String, String>,
}

/// One map per device family, keyed by canonical MAC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct DeviceTables<T> {
    #[serde(default)]
    pub ap: HashMap<MacAddress, T>,
    #[serde(default)]
    pub switch: HashMap<MacAddress, T>,
    #[serde(default)]
    pub gateway: HashMap<MacAddress, T>,
}

impl<T> Default for DeviceTables<T> {
    fn default() -> Self {
        Self {
            ap: HashMap::new(),
            switch: HashMap::new(),
            gateway: HashMap::new(),
        }
    }
}

impl<T> DeviceTables<T> {
    pub fn table(&self, device_type: DeviceType) -> &HashMap<MacAddress, T> {
        match device_type {
            DeviceType::Ap => &self.ap,
            DeviceType::Switch => &self.switch,
            DeviceType::Gateway => &self.gateway,
        }
    }

    pub fn table_mut(&mut self, device_type: DeviceType) -> &mut HashMap<MacAddress, T> {
        match device_type {
            DeviceType::Ap => &mut self.ap,
            DeviceType::Switch => &mut self.switch,
            DeviceType::Gateway => &mut self.gateway,
        }
    }

    pub fn get(&self, device_type: DeviceType, mac: &MacAddress) -> Option<&T> {
        self.table(device_type).get(mac)
    }

    pub fn insert(&mut self, device_type: DeviceType, mac: MacAddress, value: T) {
        self.table_mut(device_type).insert(mac, value);
    }

    /// Look a MAC up in every family.
    pub fn find(&self, mac: &MacAddress) -> Option<(DeviceType, &T)> {
        [DeviceType::Ap, DeviceType::Switch, DeviceType::Gateway]
            .into_iter()
            .find_map(|t| self.table(t).get(mac).map(|v| (t, v)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeviceType, &MacAddress, &T)> {
        let ap = self.ap.iter().map(|(m, v)| (DeviceType::Ap, m, v));
        let sw = self.switch.iter().map(|(m, v)| (DeviceType::Switch, m, v));
        let gw = self.gateway.iter().map(|(m, v)| (DeviceType::Gateway, m, v));
        ap.chain(sw).chain(gw)
    }

    pub fn len(&self) -> usize {
        self.ap.len() + self.switch.len() + self.gateway.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Snapshot of one API label's remote state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCache {
    pub meta: CacheMeta,
    #[serde(default)]
    pub sites: HashMap<String, SiteRecord>,
    #[serde(default)]
    pub site_index: SiteIndex,
    #[serde(default)]
    pub inventory: DeviceTables<InventoryItem>,
    #[serde(default)]
    pub configs: DeviceTables<DeviceConfig>,
    #[serde(default)]
    pub device_status: HashMap<MacAddress, DeviceStatus>,
    #[serde(default)]
    pub wlans: Vec<WlanRecord>,
    #[serde(default)]
    pub device_profiles: HashMap<String, ProfileRecord>,
    #[serde(default)]
    pub rf_templates: HashMap<String, ProfileRecord>,
    /// Device profile name → id.
    #[serde(default)]
    pub profile_index: HashMap<String, String>,
}

impl ApiCache {
    /// A never-refreshed cache.
    pub fn empty(label: impl Into<String>, vendor: impl Into<String>) -> Self {
        Self {
            meta: CacheMeta {
                label: label.into(),
                vendor: vendor.into(),
                last_refresh: None,
                schema_version: CACHE_SCHEMA_VERSION,
            },
            sites: HashMap::new(),
            site_index: SiteIndex::default(),
            inventory: DeviceTables::default(),
            configs: DeviceTables::default(),
            device_status: HashMap::new(),
            wlans: Vec::new(),
            device_profiles: HashMap::new(),
            rf_templates: HashMap::new(),
            profile_index: HashMap::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.meta.label
    }

    pub fn vendor(&self) -> &str {
        &self.meta.vendor
    }

    pub fn is_populated(&self) -> bool {
        self.meta.last_refresh.is_some()
    }

    /// Time since the last full refresh, `None` if never refreshed.
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.meta.last_refresh.map(|t| now - t)
    }

    /// Derive the lookup indexes from the canonical tables. When two
    /// sites (or profiles) share a name, the lowest id keeps it.
    pub fn rebuild_indexes(&mut self) {
        let mut sites: Vec<_> = self.sites.iter().collect();
        sites.sort_by(|a, b| a.0.cmp(b.0));

        let mut index = SiteIndex::default();
        for (id, site) in sites {
            index.by_id.insert(id.clone(), site.name.clone());
            if let Some(kept) = index.by_name.get(&site.name) {
                warn!(
                    label = %self.meta.label,
                    site = %site.name,
                    kept = %kept,
                    ignored = %id,
                    "duplicate site name within one API; lowest id wins"
                );
                continue;
            }
            index.by_name.insert(site.name.clone(), id.clone());
        }
        self.site_index = index;

        // Highest id first, so the lowest id is inserted last and stays.
        let mut profiles: Vec<_> = self.device_profiles.values().collect();
        profiles.sort_by(|a, b| b.id.cmp(&a.id));
        self.profile_index = profiles
            .into_iter()
            .map(|p| (p.name.clone(), p.id.clone()))
            .collect();
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn site_id(&self, name: &str) -> Option<&str> {
        self.site_index.by_name.get(name).map(String::as_str)
    }

    pub fn site(&self, id: &str) -> Option<&SiteRecord> {
        self.sites.get(id)
    }

    pub fn site_by_name(&self, name: &str) -> Option<&SiteRecord> {
        self.site_id(name).and_then(|id| self.sites.get(id))
    }

    pub fn device(&self, mac: &MacAddress) -> Option<(DeviceType, &InventoryItem)> {
        self.inventory.find(mac)
    }

    pub fn config(&self, device_type: DeviceType, mac: &MacAddress) -> Option<&DeviceConfig> {
        self.configs.get(device_type, mac)
    }

    pub fn profile_by_name(&self, name: &str) -> Option<&ProfileRecord> {
        self.profile_index
            .get(name)
            .and_then(|id| self.device_profiles.get(id))
    }

    /// Inventory items of one family assigned to a site.
    pub fn devices_at_site<'a>(
        &'a self,
        site_id: &'a str,
        device_type: DeviceType,
    ) -> impl Iterator<Item = &'a InventoryItem> + 'a {
        self.inventory
            .table(device_type)
            .values()
            .filter(move |item| item.site_id.as_deref() == Some(site_id))
    }

    // ── Mutation (private copies only) ───────────────────────────────

    /// Record a device config and keep its inventory row consistent.
    /// Only ever called on a clone that has not been published yet.
    pub(crate) fn upsert_device(&mut self, config: DeviceConfig) {
        let device_type = config.device_type;
        let mac = config.mac.clone();

        let item = self
            .inventory
            .table_mut(device_type)
            .entry(mac.clone())
            .or_insert_with(|| InventoryItem {
                mac: mac.clone(),
                device_type,
                id: None,
                name: None,
                serial: None,
                model: None,
                site_id: None,
                source_api: config.source_api.clone(),
                source_vendor: config.source_vendor.clone(),
            });
        item.id = Some(config.id.clone());
        item.site_id = Some(config.site_id.clone());
        if config.name.is_some() {
            item.name.clone_from(&config.name);
        }

        self.configs.insert(device_type, mac, config);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::device::DeviceSettings;

    fn site(id: &str, name: &str) -> SiteRecord {
        SiteRecord {
            id: id.into(),
            name: name.into(),
            country_code: None,
            timezone: None,
            address: None,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn indexes_follow_tables() {
        let mut cache = ApiCache::empty("mist", "mist");
        cache.sites.insert("s-1".into(), site("s-1", "HQ"));
        cache.sites.insert("s-2".into(), site("s-2", "LAB"));
        cache.rebuild_indexes();

        assert_eq!(cache.site_id("HQ"), Some("s-1"));
        assert_eq!(cache.site_index.by_id["s-2"], "LAB");
        assert_eq!(cache.site_by_name("LAB").unwrap().id, "s-2");
        assert!(cache.site_id("nope").is_none());
    }

    #[test]
    fn duplicate_site_names_keep_lowest_id() {
        for order in [["s-9", "s-3"], ["s-3", "s-9"]] {
            let mut cache = ApiCache::empty("mist", "mist");
            for id in order {
                cache.sites.insert(id.into(), site(id, "HQ"));
            }
            cache.sites.insert("s-5".into(), site("s-5", "LAB"));
            cache.rebuild_indexes();

            assert_eq!(cache.site_id("HQ"), Some("s-3"));
            assert_eq!(cache.site_index.by_id["s-9"], "HQ");
            assert_eq!(cache.site_id("LAB"), Some("s-5"));
        }
    }

    #[test]
    fn upsert_device_creates_inventory_row() {
        let mut cache = ApiCache::empty("mist", "mist");
        let mac = MacAddress::parse("001122334455").unwrap();
        cache.upsert_device(DeviceConfig {
            id: "d-1".into(),
            mac: mac.clone(),
            device_type: DeviceType::Ap,
            site_id: "s-1".into(),
            name: Some("AP-1".into()),
            source_api: "mist".into(),
            source_vendor: "mist".into(),
            settings: DeviceSettings::default(),
        });

        let (kind, item) = cache.device(&mac).unwrap();
        assert_eq!(kind, DeviceType::Ap);
        assert_eq!(item.site_id.as_deref(), Some("s-1"));
        assert_eq!(item.name.as_deref(), Some("AP-1"));
        assert!(cache.config(DeviceType::Ap, &mac).is_some());
        assert_eq!(cache.devices_at_site("s-1", DeviceType::Ap).count(), 1);
    }

    #[test]
    fn snapshot_survives_json_round_trip() {
        let mut cache = ApiCache::empty("mist", "mist");
        cache.sites.insert("s-1".into(), site("s-1", "HQ"));
        cache.rebuild_indexes();
        let json = serde_json::to_string(&cache).unwrap();
        let back: ApiCache = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cache);
    }
}
