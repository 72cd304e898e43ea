// ── Cross-vendor read facade ──
//
// Resolves sites, devices and profiles by name, id or MAC without the
// caller knowing which API owns them. Each lookup is an index hit per
// snapshot. A name that matches in more than one API is an `Ambiguous`
// error in single-entity lookups; list lookups return every match.

use std::sync::Arc;

use serde::Serialize;

use wifimgr_api::{DeviceType, ProfileRecord, SiteRecord};

use crate::error::CoreError;
use crate::model::{ApiCache, DeviceConfig, InventoryItem, MacAddress};
use crate::store::CacheManager;

/// A site together with the API that owns it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteRef {
    pub label: String,
    pub vendor: String,
    pub site: SiteRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRef {
    pub label: String,
    pub vendor: String,
    pub device_type: DeviceType,
    pub item: InventoryItem,
    /// Site name, if the device is assigned and the site is cached.
    pub site_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigRef {
    pub label: String,
    pub config: DeviceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileRef {
    pub label: String,
    pub profile: ProfileRecord,
}

trait Owned {
    fn owner(&self) -> &str;
}

impl Owned for SiteRef {
    fn owner(&self) -> &str {
        &self.label
    }
}

impl Owned for DeviceRef {
    fn owner(&self) -> &str {
        &self.label
    }
}

impl Owned for ConfigRef {
    fn owner(&self) -> &str {
        &self.label
    }
}

impl Owned for ProfileRef {
    fn owner(&self) -> &str {
        &self.label
    }
}

/// Exactly one match, or a typed error saying why not.
fn exactly_one<T: Owned>(
    entity_type: &'static str,
    identifier: &str,
    mut matches: Vec<T>,
) -> Result<T, CoreError> {
    match matches.len() {
        0 => Err(CoreError::not_found(entity_type, identifier)),
        1 => Ok(matches.remove(0)),
        _ => Err(CoreError::Ambiguous {
            entity_type,
            identifier: identifier.to_owned(),
            labels: matches.iter().map(|m| m.owner().to_owned()).collect(),
        }),
    }
}

fn parse_mac(raw: &str) -> Result<MacAddress, CoreError> {
    MacAddress::parse(raw).map_err(|e| CoreError::Validation(e.to_string()))
}

fn site_ref(cache: &ApiCache, site: &SiteRecord) -> SiteRef {
    SiteRef {
        label: cache.label().to_owned(),
        vendor: cache.vendor().to_owned(),
        site: site.clone(),
    }
}

#[derive(Debug, Clone)]
pub struct CacheAccessor {
    caches: Arc<CacheManager>,
}

impl CacheAccessor {
    pub fn new(caches: Arc<CacheManager>) -> Self {
        Self { caches }
    }

    fn snapshots(&self) -> Vec<Arc<ApiCache>> {
        self.caches.all_caches()
    }

    // ── Sites ────────────────────────────────────────────────────────

    /// Every API's match for `name`, ordered by label.
    pub fn find_exact_site_matches(&self, name: &str) -> Vec<SiteRef> {
        self.snapshots()
            .iter()
            .filter_map(|cache| cache.site_by_name(name).map(|s| site_ref(cache, s)))
            .collect()
    }

    /// The one site named `name`. Errors with `Ambiguous` when more than
    /// one API has it.
    pub fn site_by_name(&self, name: &str) -> Result<SiteRef, CoreError> {
        exactly_one("site", name, self.find_exact_site_matches(name))
    }

    pub fn site_by_name_and_api(&self, name: &str, label: &str) -> Result<SiteRef, CoreError> {
        let cache = self.caches.get_api_cache(label)?;
        cache
            .site_by_name(name)
            .map(|s| site_ref(&cache, s))
            .ok_or_else(|| CoreError::not_found("site", format!("{name} (api {label})")))
    }

    pub fn site_by_id(&self, id: &str) -> Result<SiteRef, CoreError> {
        let matches = self
            .snapshots()
            .iter()
            .filter_map(|cache| cache.site(id).map(|s| site_ref(cache, s)))
            .collect();
        exactly_one("site id", id, matches)
    }

    /// All sites across all APIs, or one API's sites. Sorted by name, then
    /// label.
    pub fn all_sites(&self, label: Option<&str>) -> Result<Vec<SiteRef>, CoreError> {
        let caches = match label {
            Some(label) => vec![self.caches.get_api_cache(label)?],
            None => self.snapshots(),
        };
        let mut sites: Vec<SiteRef> = caches
            .iter()
            .flat_map(|cache| cache.sites.values().map(|s| site_ref(cache, s)))
            .collect();
        sites.sort_by(|a, b| {
            a.site
                .name
                .cmp(&b.site.name)
                .then_with(|| a.label.cmp(&b.label))
        });
        Ok(sites)
    }

    // ── Devices ──────────────────────────────────────────────────────

    /// Every inventory entry for `mac` across APIs.
    pub fn find_device_matches(&self, mac: &str) -> Result<Vec<DeviceRef>, CoreError> {
        let mac = parse_mac(mac)?;
        Ok(self
            .snapshots()
            .iter()
            .filter_map(|cache| {
                cache.device(&mac).map(|(device_type, item)| DeviceRef {
                    label: cache.label().to_owned(),
                    vendor: cache.vendor().to_owned(),
                    device_type,
                    item: item.clone(),
                    site_name: item
                        .site_id
                        .as_deref()
                        .and_then(|id| cache.site_index.by_id.get(id).cloned()),
                })
            })
            .collect())
    }

    /// Accepts any MAC spelling.
    pub fn device_by_mac(&self, mac: &str) -> Result<DeviceRef, CoreError> {
        let matches = self.find_device_matches(mac)?;
        exactly_one("device", mac, matches)
    }

    /// Cached config of any device family.
    pub fn device_config_by_mac(&self, mac: &str) -> Result<ConfigRef, CoreError> {
        let parsed = parse_mac(mac)?;
        let matches = self
            .snapshots()
            .iter()
            .filter_map(|cache| {
                cache.configs.find(&parsed).map(|(_, config)| ConfigRef {
                    label: cache.label().to_owned(),
                    config: config.clone(),
                })
            })
            .collect();
        exactly_one("device config", mac, matches)
    }

    pub fn ap_config_by_mac(&self, mac: &str) -> Result<ConfigRef, CoreError> {
        let parsed = parse_mac(mac)?;
        let matches = self
            .snapshots()
            .iter()
            .filter_map(|cache| {
                cache
                    .config(DeviceType::Ap, &parsed)
                    .map(|config| ConfigRef {
                        label: cache.label().to_owned(),
                        config: config.clone(),
                    })
            })
            .collect();
        exactly_one("ap config", mac, matches)
    }

    // ── Profiles ─────────────────────────────────────────────────────

    fn scoped(&self, label: Option<&str>) -> Result<Vec<Arc<ApiCache>>, CoreError> {
        match label {
            Some(label) => Ok(vec![self.caches.get_api_cache(label)?]),
            None => Ok(self.snapshots()),
        }
    }

    pub fn device_profile_by_id(
        &self,
        id: &str,
        label: Option<&str>,
    ) -> Result<ProfileRef, CoreError> {
        let matches = self
            .scoped(label)?
            .iter()
            .filter_map(|cache| {
                cache.device_profiles.get(id).map(|p| ProfileRef {
                    label: cache.label().to_owned(),
                    profile: p.clone(),
                })
            })
            .collect();
        exactly_one("device profile", id, matches)
    }

    pub fn device_profile_by_name(
        &self,
        name: &str,
        label: Option<&str>,
    ) -> Result<ProfileRef, CoreError> {
        let matches = self
            .scoped(label)?
            .iter()
            .filter_map(|cache| {
                cache.profile_by_name(name).map(|p| ProfileRef {
                    label: cache.label().to_owned(),
                    profile: p.clone(),
                })
            })
            .collect();
        exactly_one("device profile", name, matches)
    }

    pub fn rf_template_by_id(&self, id: &str, label: Option<&str>) -> Result<ProfileRef, CoreError> {
        let matches = self
            .scoped(label)?
            .iter()
            .filter_map(|cache| {
                cache.rf_templates.get(id).map(|p| ProfileRef {
                    label: cache.label().to_owned(),
                    profile: p.clone(),
                })
            })
            .collect();
        exactly_one("rf template", id, matches)
    }
}
