//! Configuration for wifimgr.
//!
//! One TOML file holds global defaults, filesystem paths, backup and
//! refresh policy, and a table of named API profiles. This crate loads it
//! (file + `WIFIMGR_` environment overlay), resolves API tokens, and
//! translates it into the core's `FleetConfig` and a populated
//! `ClientRegistry`. The core never sees these types.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use wifimgr_api::VendorSettings;
use wifimgr_core::{BackupPolicy, ClientRegistry, FactoryTable, FleetConfig, RefreshPolicy};

/// Keyring service name for stored API tokens.
const KEYRING_SERVICE: &str = "wifimgr";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API token for '{label}': {reason}")]
    NoCredentials { label: String, reason: String },

    #[error("API '{label}' is not defined in the configuration")]
    UnknownApi { label: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub paths: Paths,

    #[serde(default)]
    pub backup: BackupSection,

    #[serde(default)]
    pub refresh: RefreshSection,

    /// API profiles keyed by label.
    #[serde(default)]
    pub apis: BTreeMap<String, ApiProfile>,

    /// Directory of the file this config was loaded from. Relative paths
    /// in the file are resolved against it.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Vendor request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// Where snapshots and intent files live. Unset paths fall back to the
/// platform cache and config directories.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Paths {
    pub cache_dir: Option<PathBuf>,
    pub intent_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupSection {
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for BackupSection {
    fn default() -> Self {
        Self {
            max_backups: default_max_backups(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_max_backups() -> usize {
    10
}
fn default_retention_days() -> u32 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshSection {
    /// Refresh a stale cache before diffing.
    #[serde(default)]
    pub auto: bool,

    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

impl Default for RefreshSection {
    fn default() -> Self {
        Self {
            auto: false,
            max_age_secs: default_max_age_secs(),
        }
    }
}

fn default_max_age_secs() -> u64 {
    3600
}

/// One configured vendor API.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiProfile {
    /// Vendor name reported for this API (e.g. "mist", "meraki").
    pub vendor: String,

    /// Client implementation to build; defaults to `vendor`.
    pub adapter: Option<String>,

    pub base_url: Option<String>,

    pub org_id: Option<String>,

    /// API token (plaintext, prefer keyring or env var).
    pub api_token: Option<String>,

    /// Environment variable name containing the API token.
    pub api_token_env: Option<String>,

    /// Backing file for the fixture adapter.
    pub fixture: Option<PathBuf>,

    /// Override `defaults.timeout`.
    pub timeout: Option<u64>,

    /// Refuse writes through this API.
    #[serde(default)]
    pub read_only: bool,

    /// Adapter-specific options, passed through untouched.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl ApiProfile {
    pub fn adapter(&self) -> &str {
        self.adapter.as_deref().unwrap_or(&self.vendor)
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "wifimgr", "wifimgr")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("wifimgr");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn default_cache_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("cache"),
        |dirs| dirs.cache_dir().join("apis"),
    )
}

fn default_intent_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("intent"),
        |dirs| dirs.config_dir().join("intent"),
    )
}

// ── Loading / saving ────────────────────────────────────────────────

fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("WIFIMGR_").split("__"))
}

/// Load `path` with the environment overlay. A missing file yields the
/// defaults (plus whatever the environment sets).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let mut config: Config = figment_for(path).extract()?;
    config.base_dir = path.parent().map(Path::to_path_buf);
    debug!(path = %path.display(), apis = config.apis.len(), "configuration loaded");
    Ok(config)
}

/// Load from the canonical path.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the API token for `label`: the profile's `api_token_env`
/// variable, then the system keyring, then plaintext `api_token`.
///
/// `Ok(None)` means no token is configured at all, which is fine for
/// adapters that need none. Naming an environment variable that is unset,
/// with nothing further down the chain, is an error.
pub fn resolve_api_token(
    profile: &ApiProfile,
    label: &str,
) -> Result<Option<SecretString>, ConfigError> {
    resolve_token_with(
        profile,
        label,
        |name| std::env::var(name).ok(),
        |label| {
            keyring::Entry::new(KEYRING_SERVICE, &format!("{label}/api-token"))
                .and_then(|entry| entry.get_password())
                .ok()
        },
    )
}

fn resolve_token_with(
    profile: &ApiProfile,
    label: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<Option<SecretString>, ConfigError> {
    if let Some(value) = profile.api_token_env.as_deref().and_then(&env) {
        return Ok(Some(SecretString::from(value)));
    }
    if let Some(value) = keyring(label) {
        return Ok(Some(SecretString::from(value)));
    }
    if let Some(value) = &profile.api_token {
        return Ok(Some(SecretString::from(value.clone())));
    }
    match &profile.api_token_env {
        Some(name) => Err(ConfigError::NoCredentials {
            label: label.to_owned(),
            reason: format!("environment variable {name} is not set"),
        }),
        None => Ok(None),
    }
}

/// Store a token in the system keyring for `label`.
pub fn store_api_token(label: &str, token: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{label}/api-token"))
        .and_then(|entry| entry.set_password(token))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Resolve a path from the file against the file's directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.paths
            .cache_dir
            .as_deref()
            .map_or_else(default_cache_dir, |p| self.resolve_path(p))
    }

    pub fn intent_dir(&self) -> PathBuf {
        self.paths
            .intent_dir
            .as_deref()
            .map_or_else(default_intent_dir, |p| self.resolve_path(p))
    }

    pub fn fleet_config(&self) -> FleetConfig {
        FleetConfig {
            cache_dir: self.cache_dir(),
            intent_dir: self.intent_dir(),
            backup: BackupPolicy {
                max_backups: self.backup.max_backups,
                retention_days: self.backup.retention_days,
            },
            refresh: RefreshPolicy {
                auto: self.refresh.auto,
                max_age: Duration::from_secs(self.refresh.max_age_secs),
            },
        }
    }

    pub fn profile(&self, label: &str) -> Result<&ApiProfile, ConfigError> {
        self.apis.get(label).ok_or_else(|| ConfigError::UnknownApi {
            label: label.to_owned(),
        })
    }

    /// Connection settings for one API, token resolved.
    pub fn vendor_settings(&self, label: &str) -> Result<VendorSettings, ConfigError> {
        let profile = self.profile(label)?;
        if profile.vendor.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: format!("apis.{label}.vendor"),
                reason: "must not be empty".into(),
            });
        }
        Ok(VendorSettings {
            label: label.to_owned(),
            vendor: profile.vendor.clone(),
            base_url: profile.base_url.clone(),
            org_id: profile.org_id.clone(),
            api_token: resolve_api_token(profile, label)?,
            fixture: profile.fixture.as_deref().map(|p| self.resolve_path(p)),
            timeout_secs: profile.timeout.unwrap_or(self.defaults.timeout),
            options: profile.options.clone(),
        })
    }

    /// Build a client for every configured API. An API whose settings
    /// can't be resolved is recorded as a registration failure; the
    /// others are still built.
    pub fn build_registry(&self, factories: &FactoryTable) -> ClientRegistry {
        let mut entries = Vec::new();
        let mut unresolved = Vec::new();
        for (label, profile) in &self.apis {
            match self.vendor_settings(label) {
                Ok(settings) => entries.push((profile.adapter().to_owned(), settings)),
                Err(e) => {
                    warn!(label = %label, error = %e, "API settings could not be resolved");
                    unresolved.push((label, profile, e.to_string()));
                }
            }
        }

        let mut registry = ClientRegistry::build(entries, factories);
        for (label, profile, reason) in unresolved {
            registry.record_failure(label, &profile.vendor, reason);
        }
        for (label, profile) in &self.apis {
            if profile.read_only {
                registry.set_read_only(label, true);
            }
        }
        registry
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;
    use wifimgr_core::ClientHealth;

    const SAMPLE: &str = r#"
[paths]
cache_dir = "cache"
intent_dir = "/srv/intent"

[backup]
max_backups = 3

[refresh]
auto = true
max_age_secs = 60

[apis.lab]
vendor = "mist"
adapter = "fixture"
fixture = "lab.json"
read_only = true

[apis.prod]
vendor = "meraki"
api_token = "plain"
timeout = 5
"#;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(config.apis.is_empty());
        assert_eq!(config.defaults.output, "table");
        assert_eq!(config.backup.max_backups, 10);
        assert!(!config.refresh.auto);
    }

    #[test]
    fn file_sections_become_fleet_config() {
        let dir = TempDir::new().unwrap();
        let config = load_config_from(&write_config(&dir, SAMPLE)).unwrap();

        let fleet = config.fleet_config();
        assert_eq!(fleet.cache_dir, dir.path().join("cache"));
        assert_eq!(fleet.intent_dir, PathBuf::from("/srv/intent"));
        assert_eq!(fleet.backup.max_backups, 3);
        assert_eq!(fleet.backup.retention_days, 30);
        assert!(fleet.refresh.auto);
        assert_eq!(fleet.refresh.max_age, Duration::from_secs(60));
    }

    #[test]
    fn vendor_settings_resolve_paths_and_timeouts() {
        let dir = TempDir::new().unwrap();
        let config = load_config_from(&write_config(&dir, SAMPLE)).unwrap();

        let lab = config.vendor_settings("lab").unwrap();
        assert_eq!(lab.fixture, Some(dir.path().join("lab.json")));
        assert_eq!(lab.timeout_secs, 30);
        assert!(lab.api_token.is_none());

        let prod = config.vendor_settings("prod").unwrap();
        assert_eq!(prod.timeout_secs, 5);
        assert_eq!(config.profile("prod").unwrap().adapter(), "meraki");

        assert!(matches!(
            config.vendor_settings("nope"),
            Err(ConfigError::UnknownApi { .. })
        ));
    }

    #[test]
    fn environment_overlays_the_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            jail.set_env("WIFIMGR_DEFAULTS__COLOR", "never");

            let config = load_config_from(Path::new("config.toml")).unwrap();
            assert_eq!(config.defaults.color, "never");
            assert_eq!(config.refresh.max_age_secs, 60);
            assert_eq!(config.apis["prod"].vendor, "meraki");
            Ok(())
        });
    }

    #[test]
    fn token_chain_prefers_env_then_keyring_then_plaintext() {
        let profile = ApiProfile {
            vendor: "mist".into(),
            api_token: Some("plain".into()),
            api_token_env: Some("MIST_TOKEN".into()),
            ..ApiProfile::default()
        };
        let reveal = |t: Option<SecretString>| t.map(|s| s.expose_secret().to_owned());

        let from_env = resolve_token_with(
            &profile,
            "mist",
            |_| Some("env".into()),
            |_| Some("keyring".into()),
        );
        assert_eq!(reveal(from_env.unwrap()).as_deref(), Some("env"));

        let from_keyring =
            resolve_token_with(&profile, "mist", |_| None, |_| Some("keyring".into()));
        assert_eq!(reveal(from_keyring.unwrap()).as_deref(), Some("keyring"));

        let plain = resolve_token_with(&profile, "mist", |_| None, |_| None);
        assert_eq!(reveal(plain.unwrap()).as_deref(), Some("plain"));
    }

    #[test]
    fn named_but_unset_env_var_is_an_error() {
        let profile = ApiProfile {
            vendor: "mist".into(),
            api_token_env: Some("MIST_TOKEN".into()),
            ..ApiProfile::default()
        };
        let err = resolve_token_with(&profile, "mist", |_| None, |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { .. }));

        let tokenless = ApiProfile {
            vendor: "fixture".into(),
            ..ApiProfile::default()
        };
        assert!(resolve_token_with(&tokenless, "lab", |_| None, |_| None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn registry_marks_read_only_and_records_failures() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("lab.json"),
            r#"{"vendor": "mist", "sites": [{"id": "s-1", "name": "LAB-01"}]}"#,
        )
        .unwrap();
        let config = load_config_from(&write_config(&dir, SAMPLE)).unwrap();

        let registry = config.build_registry(&FactoryTable::with_builtin());
        assert_eq!(registry.labels(), vec!["lab".to_string()]);
        assert!(registry.info("lab").unwrap().read_only);
        assert_eq!(registry.vendor("lab"), Some("mist"));
        assert!(matches!(
            registry.health("prod"),
            Some(ClientHealth::Failed { .. })
        ));
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = TempDir::new().unwrap();
        let config = load_config_from(&write_config(&dir, SAMPLE)).unwrap();
        let copy = dir.path().join("nested").join("copy.toml");
        save_config(&config, &copy).unwrap();

        let reloaded = load_config_from(&copy).unwrap();
        assert_eq!(
            reloaded.apis.keys().collect::<Vec<_>>(),
            config.apis.keys().collect::<Vec<_>>()
        );
        assert!(reloaded.apis["lab"].read_only);
    }
}
