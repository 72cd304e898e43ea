// ── Cache manager ──
//
// Owns one published snapshot per registered API label. Readers take a
// cheap `Arc<ApiCache>` and keep a consistent view for as long as they
// hold it; writers build a complete replacement and swap it in. The swap
// is per label, so a refresh of one vendor never touches another.

mod persist;
mod refresh;

pub use persist::{CacheStore, LoadStatus};

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wifimgr_api::{DeviceRecord, DeviceType};

use crate::convert::Source;
use crate::error::CoreError;
use crate::model::{ApiCache, DeviceConfig, DeviceStatus, MacAddress};
use crate::registry::ClientRegistry;

/// Per-label state: the published snapshot plus the locks that order
/// writers.
struct Slot {
    snapshot: ArcSwap<ApiCache>,
    load_status: LoadStatus,
    /// Held for a whole refresh so two refreshes of one label never race.
    refresh: Mutex<()>,
    /// Held around swap + persist so disk always ends with the newest
    /// snapshot.
    write: Mutex<()>,
}

/// Outcome of refreshing several labels at once.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub succeeded: Vec<String>,
    pub failures: BTreeMap<String, CoreError>,
}

impl RefreshReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Collapse into a single error when anything failed.
    pub fn into_result(self) -> Result<Vec<String>, CoreError> {
        if self.failures.is_empty() {
            return Ok(self.succeeded);
        }
        Err(CoreError::PartialRefreshFailure {
            total: self.total(),
            failed: self
                .failures
                .into_iter()
                .map(|(label, e)| (label, e.to_string()))
                .collect(),
        })
    }
}

pub struct CacheManager {
    registry: Arc<ClientRegistry>,
    store: CacheStore,
    slots: DashMap<String, Arc<Slot>>,
}

impl CacheManager {
    /// Create a manager for every registered label, loading whatever
    /// snapshots are on disk.
    pub fn load(registry: Arc<ClientRegistry>, store: CacheStore) -> Self {
        let slots = DashMap::new();
        for label in registry.labels() {
            let vendor = registry.vendor(&label).unwrap_or_default().to_owned();
            let (cache, load_status) = store.load(&label, &vendor);
            slots.insert(
                label,
                Arc::new(Slot {
                    snapshot: ArcSwap::from_pointee(cache),
                    load_status,
                    refresh: Mutex::new(()),
                    write: Mutex::new(()),
                }),
            );
        }
        Self {
            registry,
            store,
            slots,
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    fn slot(&self, label: &str) -> Result<Arc<Slot>, CoreError> {
        self.slots
            .get(label)
            .map(|s| Arc::clone(s.value()))
            .ok_or_else(|| self.registry.not_configured(label))
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Current snapshot for `label`. Possibly empty, never partial.
    pub fn get_api_cache(&self, label: &str) -> Result<Arc<ApiCache>, CoreError> {
        Ok(self.slot(label)?.snapshot.load_full())
    }

    /// Every snapshot, ordered by label.
    pub fn all_caches(&self) -> Vec<Arc<ApiCache>> {
        self.registry
            .labels()
            .iter()
            .filter_map(|label| self.get_api_cache(label).ok())
            .collect()
    }

    /// Time since the last successful refresh, `None` if never refreshed.
    pub fn cache_age(&self, label: &str) -> Result<Option<chrono::Duration>, CoreError> {
        Ok(self.get_api_cache(label)?.age(Utc::now()))
    }

    /// What startup found on disk for `label`.
    pub fn load_status(&self, label: &str) -> Result<LoadStatus, CoreError> {
        Ok(self.slot(label)?.load_status.clone())
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Fetch everything for `label` and publish it. On any failure,
    /// including cancellation, the previous snapshot stays published.
    pub async fn refresh_api(
        &self,
        cancel: &CancellationToken,
        label: &str,
    ) -> Result<Arc<ApiCache>, CoreError> {
        let slot = self.slot(label)?;
        let client = self.registry.client(label)?;
        let vendor = client.vendor().to_owned();

        let _refreshing = slot.refresh.lock().await;
        debug!(label, %vendor, "refreshing cache");

        let snapshot = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                warn!(label, "refresh cancelled; keeping previous snapshot");
                return Err(CoreError::Cancelled { label: label.to_owned() });
            }
            result = refresh::fetch_snapshot(label, client.as_ref()) => result?,
        };
        let cache = Arc::new(snapshot.into_cache(label, &vendor, Utc::now()));

        let _writing = slot.write.lock().await;
        self.store.save(&cache)?;
        slot.snapshot.store(Arc::clone(&cache));

        info!(
            label,
            sites = cache.sites.len(),
            inventory = cache.inventory.len(),
            configs = cache.configs.len(),
            "cache refreshed"
        );
        Ok(cache)
    }

    /// Refresh every registered label concurrently. One failure never
    /// blocks or rolls back another label's result.
    pub async fn refresh_all_apis(self: &Arc<Self>, cancel: &CancellationToken) -> RefreshReport {
        let labels = self.registry.labels();
        let mut tasks = JoinSet::new();
        for label in &labels {
            let manager = Arc::clone(self);
            let cancel = cancel.clone();
            let label = label.clone();
            tasks.spawn(async move {
                let result = manager.refresh_api(&cancel, &label).await;
                (label, result)
            });
        }

        let mut report = RefreshReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((label, Ok(_))) => report.succeeded.push(label),
                Ok((label, Err(e))) => {
                    warn!(label = %label, error = %e, "refresh failed");
                    report.failures.insert(label, e);
                }
                Err(join_err) => warn!(error = %join_err, "refresh task aborted"),
            }
        }
        // A task that panicked never reported its label.
        for label in labels {
            if !report.succeeded.contains(&label) && !report.failures.contains_key(&label) {
                report.failures.insert(
                    label,
                    CoreError::Internal("refresh task aborted".into()),
                );
            }
        }
        report.succeeded.sort();

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failures.len(),
            "refresh finished"
        );
        report
    }

    // ── Incremental updates ──────────────────────────────────────────

    /// Fetch one device's config if the snapshot doesn't have it yet.
    /// Returns `true` when a fetch happened.
    pub async fn ensure_device_config(
        &self,
        cancel: &CancellationToken,
        label: &str,
        device_type: DeviceType,
        mac: &MacAddress,
    ) -> Result<bool, CoreError> {
        let cache = self.get_api_cache(label)?;
        if cache.config(device_type, mac).is_some() {
            return Ok(false);
        }
        let item = cache
            .inventory
            .get(device_type, mac)
            .ok_or_else(|| CoreError::not_found("device", mac.as_str()))?;
        let (Some(site_id), Some(device_id)) = (item.site_id.as_deref(), item.id.as_deref())
        else {
            debug!(label, %mac, "device is unassigned; no config to fetch");
            return Ok(false);
        };

        let client = self.registry.client(label)?;
        let record = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(CoreError::Cancelled { label: label.to_owned() });
            }
            result = client.get_device(site_id, device_id) => {
                result.map_err(|e| CoreError::vendor(label, e))?
            }
        };
        self.merge_device_record(label, record).await?;
        debug!(label, %mac, "fetched device config on demand");
        Ok(true)
    }

    /// Fetch missing configs for `macs`, one at a time. Devices that are
    /// not in the inventory are skipped. Returns how many were fetched.
    pub async fn ensure_device_configs_for_site(
        &self,
        cancel: &CancellationToken,
        label: &str,
        device_type: DeviceType,
        macs: &[MacAddress],
    ) -> Result<usize, CoreError> {
        let cache = self.get_api_cache(label)?;
        let mut fetched = 0;
        for mac in macs {
            if cache.inventory.get(device_type, mac).is_none() {
                continue;
            }
            if self
                .ensure_device_config(cancel, label, device_type, mac)
                .await?
            {
                fetched += 1;
            }
        }
        Ok(fetched)
    }

    /// Merge a device record returned by the vendor into the snapshot and
    /// persist it. Readers holding the old snapshot are unaffected.
    pub async fn merge_device_record(
        &self,
        label: &str,
        record: DeviceRecord,
    ) -> Result<DeviceConfig, CoreError> {
        let slot = self.slot(label)?;
        let vendor = slot.snapshot.load().vendor().to_owned();
        let status = record.status.clone();
        let config = Source {
            label,
            vendor: &vendor,
        }
        .device_config(record)
        .map_err(|e| CoreError::Validation(e.to_string()))?;

        let _writing = slot.write.lock().await;
        slot.snapshot.rcu(|current| {
            let mut next = ApiCache::clone(current);
            if let Some(status) = &status {
                next.device_status.insert(
                    config.mac.clone(),
                    DeviceStatus {
                        status: status.clone(),
                    },
                );
            }
            next.upsert_device(config.clone());
            next
        });
        self.store.save(&slot.snapshot.load())?;
        Ok(config)
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("labels", &self.registry.labels())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wifimgr_api::{Capability, CapabilitySet, FixtureClient, FixtureData};

    fn data() -> FixtureData {
        serde_json::from_value(json!({
            "vendor": "mist",
            "sites": [{"id": "s-1", "name": "LAB-01"}],
            "inventory": [
                {"mac": "001122334455", "type": "ap", "id": "d-1", "site_id": "s-1"},
                {"mac": "0011223344aa", "type": "ap"}
            ],
            "devices": [
                {"id": "d-1", "mac": "001122334455", "type": "ap", "site_id": "s-1",
                 "config": {"name": "AP-1"}}
            ]
        }))
        .unwrap()
    }

    fn manager(dir: &TempDir, client: FixtureClient) -> Arc<CacheManager> {
        let mut registry = ClientRegistry::new();
        registry.insert("mist", Arc::new(client));
        Arc::new(CacheManager::load(
            Arc::new(registry),
            CacheStore::new(dir.path()),
        ))
    }

    #[tokio::test]
    async fn refresh_publishes_and_persists() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, FixtureClient::new(data()));
        assert_eq!(mgr.load_status("mist").unwrap(), LoadStatus::Missing);
        assert!(mgr.cache_age("mist").unwrap().is_none());

        mgr.refresh_api(&CancellationToken::new(), "mist").await.unwrap();
        assert_eq!(mgr.get_api_cache("mist").unwrap().site_id("LAB-01"), Some("s-1"));
        assert!(mgr.store().path_for("mist").exists());

        // A second manager over the same directory sees the snapshot.
        let again = manager(&dir, FixtureClient::new(data()));
        assert_eq!(again.load_status("mist").unwrap(), LoadStatus::Loaded);
        assert!(again.get_api_cache("mist").unwrap().is_populated());
    }

    #[tokio::test]
    async fn cancelled_refresh_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, FixtureClient::new(data()));
        let before = mgr.get_api_cache("mist").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = mgr.refresh_api(&cancel, "mist").await.unwrap_err();
        assert!(matches!(err, CoreError::Cancelled { .. }));
        assert!(Arc::ptr_eq(&before, &mgr.get_api_cache("mist").unwrap()));
    }

    #[tokio::test]
    async fn unknown_label_is_not_configured() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, FixtureClient::new(data()));
        assert!(matches!(
            mgr.get_api_cache("meraki"),
            Err(CoreError::NotConfigured { .. })
        ));
    }

    #[tokio::test]
    async fn lazy_configs_are_fetched_once() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, FixtureClient::new(data()).with_lazy_configs(true));
        let cancel = CancellationToken::new();
        mgr.refresh_api(&cancel, "mist").await.unwrap();

        let mac = MacAddress::parse("001122334455").unwrap();
        let unassigned = MacAddress::parse("0011223344aa").unwrap();
        assert!(mgr.get_api_cache("mist").unwrap().config(DeviceType::Ap, &mac).is_none());

        let fetched = mgr
            .ensure_device_configs_for_site(&cancel, "mist", DeviceType::Ap, &[mac.clone(), unassigned])
            .await
            .unwrap();
        assert_eq!(fetched, 1);
        assert!(
            !mgr.ensure_device_config(&cancel, "mist", DeviceType::Ap, &mac)
                .await
                .unwrap()
        );
        let cache = mgr.get_api_cache("mist").unwrap();
        assert_eq!(cache.config(DeviceType::Ap, &mac).unwrap().name.as_deref(), Some("AP-1"));
    }

    #[tokio::test]
    async fn missing_capability_on_demand_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let client = FixtureClient::new(data())
            .with_capabilities(CapabilitySet::all().without(Capability::Devices));
        let mgr = manager(&dir, client);
        let cancel = CancellationToken::new();
        mgr.refresh_api(&cancel, "mist").await.unwrap();

        let mac = MacAddress::parse("001122334455").unwrap();
        let err = mgr
            .ensure_device_config(&cancel, "mist", DeviceType::Ap, &mac)
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            CoreError::Unsupported { operation, label } if operation == "devices" && label == "mist"
        ));
    }

    #[tokio::test]
    async fn merge_swaps_a_copy() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, FixtureClient::new(data()));
        mgr.refresh_api(&CancellationToken::new(), "mist").await.unwrap();
        let before = mgr.get_api_cache("mist").unwrap();

        mgr.merge_device_record(
            "mist",
            DeviceRecord {
                id: "d-1".into(),
                mac: "00:11:22:33:44:55".into(),
                device_type: DeviceType::Ap,
                site_id: "s-1".into(),
                name: Some("AP-renamed".into()),
                status: None,
                config: json!({"name": "AP-renamed"}).as_object().cloned().unwrap(),
            },
        )
        .await
        .unwrap();

        let mac = MacAddress::parse("001122334455").unwrap();
        assert_eq!(before.config(DeviceType::Ap, &mac).unwrap().name.as_deref(), Some("AP-1"));
        let after = mgr.get_api_cache("mist").unwrap();
        assert_eq!(
            after.config(DeviceType::Ap, &mac).unwrap().name.as_deref(),
            Some("AP-renamed")
        );
    }
}
