// ── Client registry ──
//
// Named vendor clients built from configuration. Metadata (vendor type,
// capabilities, health) is captured once at registration so it can be
// queried without touching the network. A client that fails to build is
// recorded as a failure; it never prevents the others from registering.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use wifimgr_api::{
    Capability, CapabilitySet, DeviceType, FixtureFactory, VendorClient, VendorFactory,
    VendorSettings,
};

use crate::error::CoreError;

/// Metadata captured when a client registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiInfo {
    pub label: String,
    pub vendor: String,
    pub capabilities: CapabilitySet,
    pub lazy_configs: bool,
    pub writable: Vec<DeviceType>,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ClientHealth {
    Ready,
    Failed { reason: String },
}

/// A label whose client could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationFailure {
    pub label: String,
    pub vendor: String,
    pub reason: String,
}

struct Registered {
    info: ApiInfo,
    client: Arc<dyn VendorClient>,
}

/// Factories by adapter name.
#[derive(Default, Clone)]
pub struct FactoryTable {
    factories: HashMap<String, Arc<dyn VendorFactory>>,
}

impl FactoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table pre-loaded with the adapters shipped in `wifimgr-api`.
    pub fn with_builtin() -> Self {
        let mut table = Self::new();
        table.register(Arc::new(FixtureFactory));
        table
    }

    pub fn register(&mut self, factory: Arc<dyn VendorFactory>) {
        self.factories.insert(factory.adapter().to_owned(), factory);
    }

    pub fn get(&self, adapter: &str) -> Option<&Arc<dyn VendorFactory>> {
        self.factories.get(adapter)
    }

    pub fn adapters(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for FactoryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryTable")
            .field("adapters", &self.adapters())
            .finish_non_exhaustive()
    }
}

/// Holds every configured vendor client, keyed by label.
#[derive(Default)]
pub struct ClientRegistry {
    clients: BTreeMap<String, Registered>,
    failures: BTreeMap<String, RegistrationFailure>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a client for `settings.label` with `factory`. Returns `false`
    /// (and records the failure) if the factory errors.
    pub fn register(&mut self, settings: &VendorSettings, factory: &dyn VendorFactory) -> bool {
        match factory.build(settings) {
            Ok(client) => {
                self.insert(&settings.label, client);
                true
            }
            Err(e) => {
                warn!(label = %settings.label, error = %e, "vendor client failed to initialize");
                self.record_failure(&settings.label, &settings.vendor, e.to_string());
                false
            }
        }
    }

    /// Register every `(adapter, settings)` pair, looking adapters up in
    /// `factories`. Unknown adapters are recorded as failures.
    pub fn build<I>(entries: I, factories: &FactoryTable) -> Self
    where
        I: IntoIterator<Item = (String, VendorSettings)>,
    {
        let mut registry = Self::new();
        for (adapter, settings) in entries {
            match factories.get(&adapter) {
                Some(factory) => {
                    registry.register(&settings, factory.as_ref());
                }
                None => {
                    let reason = format!(
                        "unknown adapter '{adapter}' (available: {})",
                        factories.adapters().join(", ")
                    );
                    warn!(label = %settings.label, %reason, "vendor client not registered");
                    registry.record_failure(&settings.label, &settings.vendor, reason);
                }
            }
        }
        registry
    }

    /// Register an already-built client.
    pub fn insert(&mut self, label: &str, client: Arc<dyn VendorClient>) {
        let info = ApiInfo {
            label: label.to_owned(),
            vendor: client.vendor().to_owned(),
            capabilities: client.capabilities(),
            lazy_configs: client.lazy_device_configs(),
            writable: client.writable_device_types(),
            read_only: false,
        };
        debug!(label, vendor = %info.vendor, capabilities = %info.capabilities, "registered vendor client");
        self.failures.remove(label);
        self.clients.insert(label.to_owned(), Registered { info, client });
    }

    /// Forbid writes through `label` regardless of adapter capabilities.
    pub fn set_read_only(&mut self, label: &str, read_only: bool) {
        if let Some(entry) = self.clients.get_mut(label) {
            entry.info.read_only = read_only;
        }
    }

    /// Record that `label` could not be set up. Replaces any client
    /// registered under the same label.
    pub fn record_failure(&mut self, label: &str, vendor: &str, reason: String) {
        self.clients.remove(label);
        self.failures.insert(
            label.to_owned(),
            RegistrationFailure {
                label: label.to_owned(),
                vendor: vendor.to_owned(),
                reason,
            },
        );
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn client(&self, label: &str) -> Result<Arc<dyn VendorClient>, CoreError> {
        self.clients
            .get(label)
            .map(|r| Arc::clone(&r.client))
            .ok_or_else(|| self.not_configured(label))
    }

    pub fn vendor(&self, label: &str) -> Option<&str> {
        self.clients.get(label).map(|r| r.info.vendor.as_str())
    }

    pub fn info(&self, label: &str) -> Option<&ApiInfo> {
        self.clients.get(label).map(|r| &r.info)
    }

    /// `true` if `label` has a working client.
    pub fn has_api(&self, label: &str) -> bool {
        self.clients.contains_key(label)
    }

    /// Labels with a working client, sorted.
    pub fn labels(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn health(&self, label: &str) -> Option<ClientHealth> {
        if self.clients.contains_key(label) {
            Some(ClientHealth::Ready)
        } else {
            self.failures.get(label).map(|f| ClientHealth::Failed {
                reason: f.reason.clone(),
            })
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &RegistrationFailure> {
        self.failures.values()
    }

    /// Capability gate checked before any write.
    pub fn is_apply_supported(
        &self,
        label: &str,
        device_type: DeviceType,
    ) -> Result<(), CoreError> {
        let info = self.info(label).ok_or_else(|| self.not_configured(label))?;
        let reject = |reason: String| CoreError::ApplyRejected {
            label: label.to_owned(),
            reason,
        };

        if info.read_only {
            return Err(reject("API is configured read-only".into()));
        }
        for needed in [Capability::Sites, Capability::Inventory, Capability::Devices] {
            if !info.capabilities.contains(needed) {
                return Err(reject(format!(
                    "{} adapter does not implement {needed}",
                    info.vendor
                )));
            }
        }
        if !info.writable.contains(&device_type) {
            return Err(reject(format!(
                "{} adapter cannot write {device_type} configuration",
                info.vendor
            )));
        }
        Ok(())
    }

    pub(crate) fn not_configured(&self, label: &str) -> CoreError {
        CoreError::NotConfigured {
            label: label.to_owned(),
            configured: self.labels(),
        }
    }
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("labels", &self.labels())
            .field("failures", &self.failures.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wifimgr_api::{Error as ApiError, FixtureClient, FixtureData};

    struct Broken;

    impl VendorFactory for Broken {
        fn adapter(&self) -> &str {
            "broken"
        }

        fn build(&self, _settings: &VendorSettings) -> Result<Arc<dyn VendorClient>, ApiError> {
            Err(ApiError::Config("no token".into()))
        }
    }

    fn fixture(vendor: &str) -> Arc<dyn VendorClient> {
        Arc::new(FixtureClient::new(FixtureData {
            vendor: vendor.into(),
            ..FixtureData::default()
        }))
    }

    fn settings(label: &str) -> VendorSettings {
        VendorSettings {
            label: label.into(),
            vendor: "meraki".into(),
            ..VendorSettings::default()
        }
    }

    #[test]
    fn failed_factory_does_not_block_others() {
        let mut registry = ClientRegistry::new();
        registry.insert("mist", fixture("mist"));
        assert!(!registry.register(&settings("meraki"), &Broken));

        assert!(registry.has_api("mist"));
        assert!(!registry.has_api("meraki"));
        assert_eq!(registry.labels(), vec!["mist".to_string()]);
        assert_eq!(registry.health("mist"), Some(ClientHealth::Ready));
        assert!(matches!(
            registry.health("meraki"),
            Some(ClientHealth::Failed { .. })
        ));
        assert_eq!(registry.health("nope"), None);
        assert_eq!(registry.failures().count(), 1);
    }

    #[test]
    fn unknown_adapter_is_a_failure() {
        let registry = ClientRegistry::build(
            [("carrier-pigeon".to_string(), settings("x"))],
            &FactoryTable::with_builtin(),
        );
        assert!(registry.is_empty());
        let failure = registry.failures().next().unwrap();
        assert!(failure.reason.contains("carrier-pigeon"));
        assert!(failure.reason.contains("fixture"));
    }

    #[test]
    fn client_lookup_reports_configured_labels() {
        let mut registry = ClientRegistry::new();
        registry.insert("mist", fixture("mist"));
        let err = registry.client("meraki").err().unwrap();
        match err {
            CoreError::NotConfigured { label, configured } => {
                assert_eq!(label, "meraki");
                assert_eq!(configured, vec!["mist".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.vendor("mist"), Some("mist"));
    }

    #[test]
    fn apply_gate_checks_capabilities_and_read_only() {
        let mut registry = ClientRegistry::new();
        registry.insert("full", fixture("mist"));
        registry.insert(
            "ro",
            Arc::new(
                FixtureClient::new(FixtureData::default())
                    .with_capabilities(CapabilitySet::all().without(Capability::Devices)),
            ),
        );

        assert!(registry.is_apply_supported("full", DeviceType::Ap).is_ok());
        assert!(matches!(
            registry.is_apply_supported("ro", DeviceType::Ap),
            Err(CoreError::ApplyRejected { .. })
        ));

        registry.set_read_only("full", true);
        assert!(matches!(
            registry.is_apply_supported("full", DeviceType::Switch),
            Err(CoreError::ApplyRejected { .. })
        ));
        assert!(matches!(
            registry.is_apply_supported("ghost", DeviceType::Ap),
            Err(CoreError::NotConfigured { .. })
        ));
    }
}
