// ── Fleet service object ──
//
// Built once per process from a registry and a `FleetConfig`, then passed
// by reference to whatever drives it. Owns every component; there is no
// global state anywhere in the crate.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::accessor::CacheAccessor;
use crate::backup::{BackupEntry, BackupManager, BackupValidation, CleanupReport, RollbackOutcome};
use crate::config::FleetConfig;
use crate::engine::{ApplyEngine, ApplyOutcome, ApplyRequest, DiffOutcome, ImportOutcome};
use crate::error::CoreError;
use crate::intent::IntentCatalog;
use crate::model::ApiCache;
use crate::registry::ClientRegistry;
use crate::store::{CacheManager, CacheStore, RefreshReport};

#[derive(Debug)]
pub struct Fleet {
    config: FleetConfig,
    caches: Arc<CacheManager>,
    accessor: CacheAccessor,
    catalog: IntentCatalog,
    backups: BackupManager,
    engine: ApplyEngine,
}

impl Fleet {
    /// Wire every component together and load persisted cache snapshots.
    pub fn from_parts(registry: ClientRegistry, config: FleetConfig) -> Self {
        let caches = Arc::new(CacheManager::load(
            Arc::new(registry),
            CacheStore::new(&config.cache_dir),
        ));
        let catalog = IntentCatalog::new(&config.intent_dir);
        let backups = BackupManager::new(catalog.clone(), config.backup.clone());
        let engine = ApplyEngine::new(
            Arc::clone(&caches),
            catalog.clone(),
            backups.clone(),
            config.refresh.clone(),
        );
        Self {
            accessor: CacheAccessor::new(Arc::clone(&caches)),
            config,
            caches,
            catalog,
            backups,
            engine,
        }
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn registry(&self) -> &ClientRegistry {
        self.caches.registry()
    }

    pub fn caches(&self) -> &Arc<CacheManager> {
        &self.caches
    }

    pub fn accessor(&self) -> &CacheAccessor {
        &self.accessor
    }

    pub fn catalog(&self) -> &IntentCatalog {
        &self.catalog
    }

    pub fn engine(&self) -> &ApplyEngine {
        &self.engine
    }

    // ── Refresh ──────────────────────────────────────────────────────

    pub async fn refresh_api(
        &self,
        cancel: &CancellationToken,
        label: &str,
    ) -> Result<Arc<ApiCache>, CoreError> {
        self.caches.refresh_api(cancel, label).await
    }

    pub async fn refresh_all_apis(&self, cancel: &CancellationToken) -> RefreshReport {
        self.caches.refresh_all_apis(cancel).await
    }

    // ── Diff / apply ─────────────────────────────────────────────────

    pub async fn diff(
        &self,
        cancel: &CancellationToken,
        request: &ApplyRequest,
    ) -> Result<DiffOutcome, CoreError> {
        self.engine.diff(cancel, request).await
    }

    pub async fn apply(
        &self,
        cancel: &CancellationToken,
        request: &ApplyRequest,
    ) -> Result<ApplyOutcome, CoreError> {
        self.engine.apply(cancel, request).await
    }

    pub async fn import_site(
        &self,
        cancel: &CancellationToken,
        request: &ApplyRequest,
    ) -> Result<ImportOutcome, CoreError> {
        self.engine.import_site(cancel, request).await
    }

    // ── Backups ──────────────────────────────────────────────────────

    pub fn rollback(&self, site: &str, serial: u32) -> Result<RollbackOutcome, CoreError> {
        self.backups.rollback(site, serial)
    }

    pub fn list_backups(&self, site: Option<&str>) -> Result<Vec<BackupEntry>, CoreError> {
        self.backups.list_backups(site)
    }

    /// `None` uses the configured retention window.
    pub fn cleanup_backups(&self, retention_days: Option<u32>) -> Result<CleanupReport, CoreError> {
        let days = retention_days.unwrap_or(self.config.backup.retention_days);
        self.backups.cleanup_backups(days)
    }

    pub fn validate_backup(&self, path: &Path) -> Result<BackupValidation, CoreError> {
        self.backups.validate_backup(path)
    }
}
