// ── Diff/apply engine ──
//
// Per invocation: resolve the owning API, refresh its cache if needed,
// load the intent, compute the diff, then either report it or write each
// changed device through the vendor client. Writes are sequential, one
// device at a time, and each device succeeds or fails on its own.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wifimgr_api::{DeviceType, DeviceUpdate};

use crate::accessor::CacheAccessor;
use crate::backup::{BackupEntry, BackupManager};
use crate::config::RefreshPolicy;
use crate::diff::{DesiredDevice, DiffScope, SiteDiff, Verdict, compute_site_diff};
use crate::error::CoreError;
use crate::intent::{IntentCatalog, IntentDevice, IntentFile, IntentSite, LoadedIntent};
use crate::model::MacAddress;
use crate::store::CacheManager;

// ── Requests ─────────────────────────────────────────────────────────

/// When to refresh the owning API's cache before diffing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshMode {
    /// Refresh if the cache was never populated, or is stale and
    /// auto-refresh is on.
    #[default]
    IfNeeded,
    Always,
    Never,
}

/// Input to `diff`, `apply` and `import_site`.
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub site: String,
    pub device_type: DeviceType,
    /// Explicit API label; wins over the site's declared API.
    pub target_api: Option<String>,
    /// Write devices even when nothing differs.
    pub force: bool,
    pub dry_run: bool,
    pub refresh: RefreshMode,
}

impl ApplyRequest {
    pub fn new(site: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            site: site.into(),
            device_type,
            target_api: None,
            force: false,
            dry_run: false,
            refresh: RefreshMode::default(),
        }
    }

    #[must_use]
    pub fn with_api(mut self, label: impl Into<String>) -> Self {
        self.target_api = Some(label.into());
        self
    }

    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn refresh(mut self, mode: RefreshMode) -> Self {
        self.refresh = mode;
        self
    }
}

// ── Results ──────────────────────────────────────────────────────────

/// How the owning API was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ResolutionSource {
    Override,
    Intent,
    Cache,
    SingleApi,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub label: String,
    pub source: ResolutionSource,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiffOutcome {
    pub diff: SiteDiff,
    pub resolution: Resolution,
    pub intent_path: PathBuf,
    pub refreshed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceFailure {
    pub mac: MacAddress,
    pub verdict: Verdict,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub diff: SiteDiff,
    pub label: String,
    pub dry_run: bool,
    pub written: Vec<MacAddress>,
    pub skipped: Vec<MacAddress>,
    pub failures: Vec<DeviceFailure>,
    pub backup: Option<BackupEntry>,
    pub warnings: Vec<String>,
    /// Cancellation stopped the write loop early.
    pub cancelled: bool,
}

impl ApplyOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub site: String,
    pub label: String,
    pub intent_path: PathBuf,
    pub added: Vec<MacAddress>,
    pub backup: Option<BackupEntry>,
}

// ── Engine ───────────────────────────────────────────────────────────

struct Plan {
    diff: SiteDiff,
    resolution: Resolution,
    intent: LoadedIntent,
    refreshed: bool,
}

#[derive(Debug, Clone)]
pub struct ApplyEngine {
    caches: Arc<CacheManager>,
    accessor: CacheAccessor,
    catalog: IntentCatalog,
    backups: BackupManager,
    refresh: RefreshPolicy,
}

impl ApplyEngine {
    pub fn new(
        caches: Arc<CacheManager>,
        catalog: IntentCatalog,
        backups: BackupManager,
        refresh: RefreshPolicy,
    ) -> Self {
        Self {
            accessor: CacheAccessor::new(Arc::clone(&caches)),
            caches,
            catalog,
            backups,
            refresh,
        }
    }

    /// Pick the API that owns `site`. Precedence: explicit override, the
    /// site's declared API, a cache hit, the only configured API.
    pub fn resolve_api_for_site(
        &self,
        site: &str,
        declared: Option<&str>,
        target: Option<&str>,
    ) -> Result<Resolution, CoreError> {
        let registry = self.caches.registry();
        let known = |label: &str| {
            if registry.has_api(label) {
                Ok(label.to_owned())
            } else {
                Err(registry.not_configured(label))
            }
        };

        if let Some(target) = target {
            let label = known(target)?;
            let mut warnings = Vec::new();
            if let Some(declared) = declared.filter(|d| *d != target) {
                warn!(site, declared, target, "API override conflicts with the site's declared API");
                warnings.push(format!(
                    "site '{site}' declares API '{declared}'; using override '{target}'"
                ));
            }
            return Ok(Resolution {
                label,
                source: ResolutionSource::Override,
                warnings,
            });
        }

        if let Some(declared) = declared {
            return Ok(Resolution {
                label: known(declared)?,
                source: ResolutionSource::Intent,
                warnings: Vec::new(),
            });
        }

        let matches = self.accessor.find_exact_site_matches(site);
        match matches.len() {
            0 => {}
            1 => {
                return Ok(Resolution {
                    label: matches[0].label.clone(),
                    source: ResolutionSource::Cache,
                    warnings: Vec::new(),
                });
            }
            _ => {
                return Err(CoreError::Ambiguous {
                    entity_type: "site",
                    identifier: site.to_owned(),
                    labels: matches.into_iter().map(|m| m.label).collect(),
                });
            }
        }

        let labels = registry.labels();
        if let [only] = labels.as_slice() {
            return Ok(Resolution {
                label: only.clone(),
                source: ResolutionSource::SingleApi,
                warnings: Vec::new(),
            });
        }

        Err(CoreError::UnresolvedSite {
            site: site.to_owned(),
            configured: labels,
        })
    }

    /// Refresh `label` according to `mode` and the refresh policy.
    /// Returns `true` if a refresh ran.
    pub async fn refresh_if_needed(
        &self,
        cancel: &CancellationToken,
        label: &str,
        mode: RefreshMode,
    ) -> Result<bool, CoreError> {
        let needed = match mode {
            RefreshMode::Never => false,
            RefreshMode::Always => true,
            RefreshMode::IfNeeded => match self.caches.cache_age(label)? {
                None => true,
                Some(age) => {
                    self.refresh.auto
                        && age.to_std().unwrap_or_default() > self.refresh.max_age
                }
            },
        };
        if needed {
            self.caches.refresh_api(cancel, label).await?;
        }
        Ok(needed)
    }

    /// Compute the diff for one site and device family. Never writes.
    pub async fn diff(
        &self,
        cancel: &CancellationToken,
        request: &ApplyRequest,
    ) -> Result<DiffOutcome, CoreError> {
        let intent = self.catalog.load_site(&request.site)?;
        let plan = self.plan(cancel, request, intent, false).await?;
        Ok(DiffOutcome {
            intent_path: plan.intent.path,
            diff: plan.diff,
            resolution: plan.resolution,
            refreshed: plan.refreshed,
        })
    }

    /// Diff, then write every pending device. The intent file is backed up
    /// before the first write.
    #[allow(clippy::too_many_lines)]
    pub async fn apply(
        &self,
        cancel: &CancellationToken,
        request: &ApplyRequest,
    ) -> Result<ApplyOutcome, CoreError> {
        let intent = self.catalog.load_site(&request.site)?;
        let plan = self.plan(cancel, request, intent, !request.dry_run).await?;
        let label = plan.resolution.label.clone();

        let mut outcome = ApplyOutcome {
            diff: plan.diff.clone(),
            label: label.clone(),
            dry_run: request.dry_run,
            written: Vec::new(),
            skipped: plan
                .diff
                .devices
                .iter()
                .filter(|d| !request.force && d.verdict == Verdict::NoOp)
                .map(|d| d.mac.clone())
                .collect(),
            failures: Vec::new(),
            backup: None,
            warnings: plan.resolution.warnings.clone(),
            cancelled: false,
        };

        let pending: Vec<_> = plan.diff.pending(request.force).collect();
        if request.dry_run || pending.is_empty() {
            debug!(site = %request.site, pending = pending.len(), dry_run = request.dry_run, "nothing written");
            return Ok(outcome);
        }

        outcome.backup = self.backups.create_backup(&plan.intent.path)?;
        let client = self.caches.registry().client(&label)?;
        let site_id = plan.diff.site_id.as_str();

        for (index, device) in pending.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(site = %request.site, remaining = pending.len() - index, "apply cancelled between writes");
                outcome.cancelled = true;
                outcome
                    .skipped
                    .extend(pending[index..].iter().map(|d| d.mac.clone()));
                break;
            }

            let update = DeviceUpdate {
                device_type: request.device_type,
                patch: device.desired.clone(),
            };
            let result = match (device.verdict, device.device_id.as_deref()) {
                (Verdict::Create, _) | (_, None) => {
                    client.assign_device(site_id, device.mac.as_str(), &update).await
                }
                (_, Some(device_id)) => client.update_device(site_id, device_id, &update).await,
            };

            match result {
                Ok(record) => {
                    if let Err(e) = self.caches.merge_device_record(&label, record).await {
                        warn!(mac = %device.mac, error = %e, "device written but cache merge failed");
                        outcome.warnings.push(format!(
                            "{}: written, but the cache was not updated ({e}); run a refresh",
                            device.mac.colon_form()
                        ));
                    }
                    debug!(mac = %device.mac, verdict = %device.verdict, "device written");
                    outcome.written.push(device.mac.clone());
                }
                Err(e) => {
                    warn!(mac = %device.mac, error = %e, "device write failed");
                    outcome.failures.push(DeviceFailure {
                        mac: device.mac.clone(),
                        verdict: device.verdict,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            site = %request.site,
            label = %label,
            written = outcome.written.len(),
            failed = outcome.failures.len(),
            "apply finished"
        );
        Ok(outcome)
    }

    /// Declare every unmanaged live device of the site in the intent file,
    /// name only. A site that no intent file declares yet gets a new file.
    pub async fn import_site(
        &self,
        cancel: &CancellationToken,
        request: &ApplyRequest,
    ) -> Result<ImportOutcome, CoreError> {
        let intent = match self.catalog.load_site(&request.site) {
            Ok(intent) => intent,
            Err(CoreError::NotFound { .. }) => self.new_intent(&request.site),
            Err(e) => return Err(e),
        };
        let plan = self.plan(cancel, request, intent, false).await?;
        let mut intent = plan.intent;
        let label = plan.resolution.label;

        let mut added = Vec::new();
        {
            let site = intent
                .file
                .config
                .sites
                .entry(request.site.clone())
                .or_default();
            if site.api.is_none() {
                site.api = Some(label.clone());
            }
            for device in &plan.diff.unmanaged {
                if site.add_placeholder(request.device_type, &device.mac, device.name.clone()) {
                    added.push(device.mac.clone());
                }
            }
        }

        let mut backup = None;
        if !added.is_empty() {
            backup = self.backups.create_backup(&intent.path)?;
            if let Some(dir) = intent.path.parent() {
                std::fs::create_dir_all(dir).map_err(|e| CoreError::io(dir, e))?;
            }
            intent.file.save(&intent.path)?;
            info!(site = %request.site, added = added.len(), path = %intent.path.display(), "imported devices into intent");
        }

        Ok(ImportOutcome {
            site: request.site.clone(),
            label,
            intent_path: intent.path,
            added,
            backup,
        })
    }

    fn new_intent(&self, site: &str) -> LoadedIntent {
        let stem: String = site
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let mut file = IntentFile::new();
        file.config.sites.insert(site.to_owned(), IntentSite::default());
        LoadedIntent {
            path: self.catalog.dir().join(format!("{stem}.yaml")),
            site: site.to_owned(),
            file,
        }
    }

    async fn plan(
        &self,
        cancel: &CancellationToken,
        request: &ApplyRequest,
        intent: LoadedIntent,
        check_apply: bool,
    ) -> Result<Plan, CoreError> {
        let declared = intent.site()?;
        let resolution = self.resolve_api_for_site(
            &request.site,
            declared.api.as_deref(),
            request.target_api.as_deref(),
        )?;
        let label = resolution.label.as_str();
        debug!(site = %request.site, label, source = %resolution.source, "resolved API");

        if check_apply {
            self.caches
                .registry()
                .is_apply_supported(label, request.device_type)?;
        }

        let refreshed = self.refresh_if_needed(cancel, label, request.refresh).await?;

        let cache = self.caches.get_api_cache(label)?;
        let site_id = cache
            .site_id(&request.site)
            .ok_or_else(|| CoreError::not_found("site", format!("{} (api {label})", request.site)))?
            .to_owned();

        let declared_devices = declared.devices(request.device_type)?;
        let lazy = self
            .caches
            .registry()
            .info(label)
            .is_some_and(|info| info.lazy_configs);
        let cache = if lazy {
            let macs: Vec<MacAddress> = declared_devices.iter().map(|(m, _)| m.clone()).collect();
            let fetched = self
                .caches
                .ensure_device_configs_for_site(cancel, label, request.device_type, &macs)
                .await?;
            debug!(label, fetched, "on-demand device configs");
            self.caches.get_api_cache(label)?
        } else {
            cache
        };

        let desired = declared_devices
            .into_iter()
            .map(|(mac, device)| {
                Ok(DesiredDevice {
                    document: self.desired_document(label, device)?,
                    mac,
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        let diff = compute_site_diff(
            &cache,
            DiffScope {
                site: &request.site,
                site_id: &site_id,
                device_type: request.device_type,
            },
            &desired,
        );

        Ok(Plan {
            diff,
            resolution,
            intent,
            refreshed,
        })
    }

    /// Wire document for one declared device, with the profile name
    /// resolved to the owning API's profile id.
    fn desired_document(
        &self,
        label: &str,
        device: &IntentDevice,
    ) -> Result<serde_json::Map<String, serde_json::Value>, CoreError> {
        let mut document = device.settings.to_wire();
        if let Some(name) = &device.deviceprofile_name {
            let profile = self.accessor.device_profile_by_name(name, Some(label))?;
            document.insert(
                "deviceprofile_id".into(),
                serde_json::Value::String(profile.profile.id),
            );
        }
        Ok(document)
    }
}
