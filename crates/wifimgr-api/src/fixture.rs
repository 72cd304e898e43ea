// Fixture adapter
//
// A file-backed vendor. Holds a complete vendor state document in memory,
// answers every capability from it, and writes mutations back to the
// backing file when one is configured. Used for lab sites, offline
// operation, and tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::capability::{Capability, CapabilitySet};
use crate::client::{VendorClient, VendorFactory, VendorSettings};
use crate::error::Error;
use crate::models::{
    DeviceRecord, DeviceType, DeviceUpdate, InventoryRecord, ProfileRecord, SearchHit, SiteRecord,
    WlanRecord,
};

/// Complete vendor state as stored in a fixture file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureData {
    #[serde(default = "default_vendor")]
    pub vendor: String,
    #[serde(default)]
    pub sites: Vec<SiteRecord>,
    #[serde(default)]
    pub inventory: Vec<InventoryRecord>,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
    #[serde(default)]
    pub wlans: Vec<WlanRecord>,
    #[serde(default)]
    pub device_profiles: Vec<ProfileRecord>,
    #[serde(default)]
    pub rf_templates: Vec<ProfileRecord>,
}

fn default_vendor() -> String {
    "fixture".into()
}

impl FixtureData {
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| Error::Deserialization {
            message: format!("{}: {e}", path.display()),
            body: raw,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(path, body)?;
        Ok(())
    }
}

/// Strip separators and lowercase, so vendor MAC spellings compare equal.
fn mac_key(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Recursively merge `patch` into `target`. Objects merge key-by-key;
/// every other value replaces what was there.
pub fn deep_merge(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Vendor client answering from a [`FixtureData`] document.
pub struct FixtureClient {
    vendor: String,
    capabilities: CapabilitySet,
    lazy_configs: bool,
    path: Option<PathBuf>,
    state: RwLock<FixtureData>,
}

impl FixtureClient {
    pub fn new(data: FixtureData) -> Self {
        Self {
            vendor: data.vendor.clone(),
            capabilities: CapabilitySet::all(),
            lazy_configs: false,
            path: None,
            state: RwLock::new(data),
        }
    }

    /// Load from a fixture file and persist writes back to it.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let data = FixtureData::from_file(&path)?;
        debug!(path = %path.display(), sites = data.sites.len(), "loaded fixture");
        Ok(Self::new(data).persist_to(path))
    }

    #[must_use]
    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn with_lazy_configs(mut self, lazy: bool) -> Self {
        self.lazy_configs = lazy;
        self
    }

    #[must_use]
    pub fn persist_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Current state document (cloned).
    pub async fn data(&self) -> FixtureData {
        self.state.read().await.clone()
    }

    fn require(&self, capability: Capability) -> Result<(), Error> {
        if self.capabilities.contains(capability) {
            Ok(())
        } else {
            Err(Error::unsupported(&self.vendor, capability))
        }
    }

    fn persist(&self, data: &FixtureData) -> Result<(), Error> {
        if let Some(ref path) = self.path {
            trace!(path = %path.display(), "persisting fixture");
            data.save(path)?;
        }
        Ok(())
    }
}

#[async_trait]
impl VendorClient for FixtureClient {
    fn vendor(&self) -> &str {
        &self.vendor
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities.clone()
    }

    fn lazy_device_configs(&self) -> bool {
        self.lazy_configs
    }

    async fn list_sites(&self) -> Result<Vec<SiteRecord>, Error> {
        self.require(Capability::Sites)?;
        Ok(self.state.read().await.sites.clone())
    }

    async fn get_site(&self, site_id: &str) -> Result<SiteRecord, Error> {
        self.require(Capability::Sites)?;
        self.state
            .read()
            .await
            .sites
            .iter()
            .find(|s| s.id == site_id)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: "site",
                id: site_id.into(),
            })
    }

    async fn list_inventory(&self) -> Result<Vec<InventoryRecord>, Error> {
        self.require(Capability::Inventory)?;
        Ok(self.state.read().await.inventory.clone())
    }

    async fn list_device_configs(
        &self,
        site_id: &str,
        device_type: DeviceType,
    ) -> Result<Vec<DeviceRecord>, Error> {
        self.require(Capability::Devices)?;
        Ok(self
            .state
            .read()
            .await
            .devices
            .iter()
            .filter(|d| d.site_id == site_id && d.device_type == device_type)
            .cloned()
            .collect())
    }

    async fn get_device(&self, site_id: &str, device_id: &str) -> Result<DeviceRecord, Error> {
        self.require(Capability::Devices)?;
        self.state
            .read()
            .await
            .devices
            .iter()
            .find(|d| d.site_id == site_id && d.id == device_id)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: "device",
                id: device_id.into(),
            })
    }

    async fn update_device(
        &self,
        site_id: &str,
        device_id: &str,
        update: &DeviceUpdate,
    ) -> Result<DeviceRecord, Error> {
        self.require(Capability::Devices)?;
        let mut state = self.state.write().await;
        let device = state
            .devices
            .iter_mut()
            .find(|d| d.site_id == site_id && d.id == device_id)
            .ok_or_else(|| Error::NotFound {
                kind: "device",
                id: device_id.into(),
            })?;
        if device.device_type != update.device_type {
            return Err(Error::Rejected {
                message: format!(
                    "device {device_id} is a {}, not a {}",
                    device.device_type, update.device_type
                ),
            });
        }

        deep_merge(&mut device.config, &update.patch);
        if let Some(name) = update.patch.get("name").and_then(Value::as_str) {
            device.name = Some(name.to_owned());
        }
        let updated = device.clone();

        let mac = mac_key(&updated.mac);
        if let Some(item) = state.inventory.iter_mut().find(|i| mac_key(&i.mac) == mac) {
            item.name.clone_from(&updated.name);
        }

        self.persist(&state)?;
        debug!(device_id, site_id, "fixture device updated");
        Ok(updated)
    }

    async fn assign_device(
        &self,
        site_id: &str,
        mac: &str,
        update: &DeviceUpdate,
    ) -> Result<DeviceRecord, Error> {
        self.require(Capability::Devices)?;
        let mut state = self.state.write().await;
        if !state.sites.iter().any(|s| s.id == site_id) {
            return Err(Error::NotFound {
                kind: "site",
                id: site_id.into(),
            });
        }

        let key = mac_key(mac);
        let item = state
            .inventory
            .iter_mut()
            .find(|i| mac_key(&i.mac) == key)
            .ok_or_else(|| Error::NotFound {
                kind: "inventory device",
                id: mac.into(),
            })?;
        if item.device_type != update.device_type {
            return Err(Error::Rejected {
                message: format!(
                    "device {mac} is a {}, not a {}",
                    item.device_type, update.device_type
                ),
            });
        }

        let id = item.id.clone().unwrap_or_else(|| format!("dev-{key}"));
        item.id = Some(id.clone());
        item.site_id = Some(site_id.to_owned());
        if let Some(name) = update.patch.get("name").and_then(Value::as_str) {
            item.name = Some(name.to_owned());
        }
        let item = item.clone();

        let record = match state.devices.iter_mut().find(|d| d.id == id) {
            Some(existing) => {
                existing.site_id = site_id.to_owned();
                deep_merge(&mut existing.config, &update.patch);
                existing.name.clone_from(&item.name);
                existing.clone()
            }
            None => {
                let record = DeviceRecord {
                    id,
                    mac: item.mac.clone(),
                    device_type: item.device_type,
                    site_id: site_id.to_owned(),
                    name: item.name.clone(),
                    status: item.status.clone(),
                    config: update.patch.clone(),
                };
                state.devices.push(record.clone());
                record
            }
        };

        self.persist(&state)?;
        debug!(mac, site_id, "fixture device assigned");
        Ok(record)
    }

    async fn list_wlans(&self) -> Result<Vec<WlanRecord>, Error> {
        self.require(Capability::Wlans)?;
        Ok(self.state.read().await.wlans.clone())
    }

    async fn list_device_profiles(&self) -> Result<Vec<ProfileRecord>, Error> {
        self.require(Capability::Profiles)?;
        Ok(self.state.read().await.device_profiles.clone())
    }

    async fn list_rf_templates(&self) -> Result<Vec<ProfileRecord>, Error> {
        self.require(Capability::RfTemplates)?;
        Ok(self.state.read().await.rf_templates.clone())
    }

    async fn search_devices(&self, query: &str) -> Result<Vec<SearchHit>, Error> {
        self.require(Capability::Search)?;
        let needle = query.to_lowercase();
        let mac_needle = mac_key(query);
        Ok(self
            .state
            .read()
            .await
            .inventory
            .iter()
            .filter(|i| {
                (!mac_needle.is_empty() && mac_key(&i.mac).contains(&mac_needle))
                    || i
                        .name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&needle))
            })
            .map(|i| SearchHit {
                mac: i.mac.clone(),
                name: i.name.clone(),
                site_id: i.site_id.clone(),
                device_type: i.device_type,
            })
            .collect())
    }
}

/// Factory for the `fixture` adapter.
///
/// Recognised options: `lazy_configs = "true"` and `capabilities`, a
/// comma-separated subset such as `"sites,inventory,devices"`.
#[derive(Debug, Default)]
pub struct FixtureFactory;

impl VendorFactory for FixtureFactory {
    fn adapter(&self) -> &str {
        "fixture"
    }

    fn build(&self, settings: &VendorSettings) -> Result<Arc<dyn VendorClient>, Error> {
        let path = settings.fixture.as_ref().ok_or_else(|| {
            Error::Config(format!("api '{}' has no fixture file configured", settings.label))
        })?;
        let mut client = FixtureClient::from_file(path)?;

        if !settings.vendor.is_empty() {
            client = client.with_vendor(settings.vendor.clone());
        }
        if let Some(lazy) = settings.options.get("lazy_configs") {
            client = client.with_lazy_configs(lazy == "true");
        }
        if let Some(raw) = settings.options.get("capabilities") {
            let capabilities = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<Capability>()
                        .map_err(|_| Error::Config(format!("unknown capability '{s}'")))
                })
                .collect::<Result<CapabilitySet, Error>>()?;
            client = client.with_capabilities(capabilities);
        }

        Ok(Arc::new(client))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_preserves_untouched_keys() {
        let mut target = json!({
            "name": "ap-1",
            "radio_config": {"band_5": {"channel": 40, "power": 12}}
        })
        .as_object()
        .cloned()
        .unwrap();
        let patch = json!({"radio_config": {"band_5": {"channel": 36}}})
            .as_object()
            .cloned()
            .unwrap();

        deep_merge(&mut target, &patch);

        assert_eq!(
            Value::Object(target),
            json!({
                "name": "ap-1",
                "radio_config": {"band_5": {"channel": 36, "power": 12}}
            })
        );
    }

    #[test]
    fn mac_key_ignores_separators_and_case() {
        assert_eq!(mac_key("AA:BB:cc-dd.EE:ff"), "aabbccddeeff");
    }

    #[test]
    fn factory_requires_fixture_path() {
        let settings = VendorSettings {
            label: "lab".into(),
            ..VendorSettings::default()
        };
        let err = FixtureFactory.build(&settings).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
