// ── Intent files ──
//
// Operator-owned declarative files, JSON or YAML:
//
//   version: 1
//   config:
//     sites:
//       LAB-01:
//         api: mist
//         devices:
//           ap:
//             "00:11:22:33:44:55": { name: AP-1 }
//
// The core reads these and never rewrites them, except to add placeholder
// entries on import.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use wifimgr_api::DeviceType;

use crate::error::CoreError;
use crate::model::{DeviceSettings, MacAddress, normalize_mac};

/// Highest intent format version this build understands.
pub const CURRENT_INTENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentFile {
    pub version: u32,
    #[serde(default)]
    pub config: IntentConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentConfig {
    #[serde(default)]
    pub sites: BTreeMap<String, IntentSite>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentSite {
    /// API label that owns this site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub site_config: Map<String, Value>,
    #[serde(default)]
    pub devices: IntentDevices,
}

/// Declared devices per family, keyed by MAC as the operator wrote it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentDevices {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ap: BTreeMap<String, IntentDevice>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub switch: BTreeMap<String, IntentDevice>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gateway: BTreeMap<String, IntentDevice>,
}

/// Declared configuration of one device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentDevice {
    /// Device profile reference, resolved to `deviceprofile_id` per API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviceprofile_name: Option<String>,
    #[serde(flatten)]
    pub settings: DeviceSettings,
}

impl IntentDevices {
    pub fn table(&self, device_type: DeviceType) -> &BTreeMap<String, IntentDevice> {
        match device_type {
            DeviceType::Ap => &self.ap,
            DeviceType::Switch => &self.switch,
            DeviceType::Gateway => &self.gateway,
        }
    }

    pub fn table_mut(&mut self, device_type: DeviceType) -> &mut BTreeMap<String, IntentDevice> {
        match device_type {
            DeviceType::Ap => &mut self.ap,
            DeviceType::Switch => &mut self.switch,
            DeviceType::Gateway => &mut self.gateway,
        }
    }
}

impl IntentSite {
    /// Declared devices of one family with parsed MACs, in key order.
    pub fn devices(
        &self,
        device_type: DeviceType,
    ) -> Result<Vec<(MacAddress, &IntentDevice)>, CoreError> {
        self.devices
            .table(device_type)
            .iter()
            .map(|(raw, device)| {
                MacAddress::parse(raw)
                    .map(|mac| (mac, device))
                    .map_err(|e| CoreError::Validation(e.to_string()))
            })
            .collect()
    }

    /// Declare a device with only a name. Returns `false` if the MAC is
    /// already declared under any spelling.
    pub fn add_placeholder(
        &mut self,
        device_type: DeviceType,
        mac: &MacAddress,
        name: Option<String>,
    ) -> bool {
        let table = self.devices.table_mut(device_type);
        if table.keys().any(|k| normalize_mac(k) == mac.as_str()) {
            return false;
        }
        table.insert(
            mac.colon_form(),
            IntentDevice {
                deviceprofile_name: None,
                settings: DeviceSettings {
                    name,
                    ..DeviceSettings::default()
                },
            },
        );
        true
    }
}

// ── Formats ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentFormat {
    Json,
    Yaml,
}

impl IntentFormat {
    /// Format implied by a file name. A trailing backup serial
    /// (`sites.yaml.3`) is ignored.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let base = match name.rsplit_once('.') {
            Some((stem, serial)) if !serial.is_empty() && serial.bytes().all(|b| b.is_ascii_digit()) => stem,
            _ => name,
        };
        let ext = base.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

fn intent_err(path: &Path, message: impl Into<String>) -> CoreError {
    CoreError::Intent {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

impl IntentFile {
    pub fn new() -> Self {
        Self {
            version: CURRENT_INTENT_VERSION,
            config: IntentConfig::default(),
        }
    }

    /// Parse and validate `raw` as the format implied by `path`.
    pub fn parse(path: &Path, raw: &str) -> Result<Self, CoreError> {
        let format = IntentFormat::from_path(path)
            .ok_or_else(|| intent_err(path, "unrecognized extension (expected .json, .yaml or .yml)"))?;
        let file: Self = match format {
            IntentFormat::Json => serde_json::from_str(raw).map_err(|e| intent_err(path, e.to_string()))?,
            IntentFormat::Yaml => serde_yaml::from_str(raw).map_err(|e| intent_err(path, e.to_string()))?,
        };
        file.validate().map_err(|message| intent_err(path, message))?;
        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        Self::parse(path, &raw)
    }

    /// Structural checks: supported version, valid MAC keys, no MAC
    /// declared twice within one family.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=CURRENT_INTENT_VERSION).contains(&self.version) {
            return Err(format!(
                "unsupported version {} (supported: 1..={CURRENT_INTENT_VERSION})",
                self.version
            ));
        }
        for (site, decl) in &self.config.sites {
            for device_type in [DeviceType::Ap, DeviceType::Switch, DeviceType::Gateway] {
                let mut seen = BTreeMap::new();
                for raw in decl.devices.table(device_type).keys() {
                    let mac = MacAddress::parse(raw)
                        .map_err(|e| format!("site '{site}', {device_type}: {e}"))?;
                    if let Some(first) = seen.insert(mac, raw) {
                        return Err(format!(
                            "site '{site}', {device_type}: '{first}' and '{raw}' are the same device"
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn site(&self, name: &str) -> Option<&IntentSite> {
        self.config.sites.get(name)
    }

    pub fn site_mut(&mut self, name: &str) -> Option<&mut IntentSite> {
        self.config.sites.get_mut(name)
    }

    pub fn render(&self, path: &Path) -> Result<String, CoreError> {
        match IntentFormat::from_path(path) {
            Some(IntentFormat::Json) => {
                let mut body = serde_json::to_string_pretty(self)?;
                body.push('\n');
                Ok(body)
            }
            Some(IntentFormat::Yaml) => {
                serde_yaml::to_string(self).map_err(|e| CoreError::Serialization(e.to_string()))
            }
            None => Err(intent_err(path, "unrecognized extension")),
        }
    }

    /// Write to `path` via a temp file + rename.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let body = self.render(path)?;
        write_atomic(path, body.as_bytes())
    }
}

impl Default for IntentFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace `path` with `contents` without ever exposing a partial file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), CoreError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| CoreError::io(dir, e))?;
    tmp.write_all(contents).map_err(|e| CoreError::io(path, e))?;
    tmp.persist(path).map_err(|e| CoreError::io(path, e.error))?;
    Ok(())
}

// ── Catalog ──────────────────────────────────────────────────────────

/// An intent file and the site it was loaded for.
#[derive(Debug, Clone)]
pub struct LoadedIntent {
    pub path: PathBuf,
    pub site: String,
    pub file: IntentFile,
}

impl LoadedIntent {
    pub fn site(&self) -> Result<&IntentSite, CoreError> {
        self.file
            .site(&self.site)
            .ok_or_else(|| CoreError::not_found("intent site", &self.site))
    }
}

/// Finds which intent file declares which site.
#[derive(Debug, Clone)]
pub struct IntentCatalog {
    dir: PathBuf,
}

impl IntentCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Intent files in the directory, sorted. A missing directory has none.
    pub fn files(&self) -> Result<Vec<PathBuf>, CoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoreError::io(&self.dir, e)),
        };
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| CoreError::io(&self.dir, e))?.path();
            if !path.is_file() {
                continue;
            }
            // Live files only; backups carry a numeric suffix.
            let is_live = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "json" | "yaml" | "yml"));
            if is_live {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Every declared site and the file declaring it. Unreadable files are
    /// skipped with a warning.
    pub fn sites(&self) -> Result<Vec<(String, PathBuf)>, CoreError> {
        let mut sites = Vec::new();
        for path in self.files()? {
            match IntentFile::load(&path) {
                Ok(file) => sites.extend(file.config.sites.into_keys().map(|s| (s, path.clone()))),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping intent file"),
            }
        }
        sites.sort();
        Ok(sites)
    }

    /// The one file declaring `site`.
    pub fn locate(&self, site: &str) -> Result<PathBuf, CoreError> {
        let mut found = Vec::new();
        let mut first_error = None;
        for path in self.files()? {
            match IntentFile::load(&path) {
                Ok(file) if file.site(site).is_some() => found.push(path),
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping intent file");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        match found.len() {
            // The site may be in the file that failed to parse.
            0 => Err(first_error.unwrap_or_else(|| CoreError::not_found("intent site", site))),
            1 => Ok(found.remove(0)),
            _ => Err(CoreError::Ambiguous {
                entity_type: "intent site",
                identifier: site.to_owned(),
                labels: found.iter().map(|p| p.display().to_string()).collect(),
            }),
        }
    }

    pub fn load_site(&self, site: &str) -> Result<LoadedIntent, CoreError> {
        let path = self.locate(site)?;
        let file = IntentFile::load(&path)?;
        debug!(site, path = %path.display(), "loaded intent");
        Ok(LoadedIntent {
            path,
            site: site.to_owned(),
            file,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Channel;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const LAB_YAML: &str = "\
version: 1
config:
  sites:
    LAB-01:
      api: mist
      devices:
        ap:
          \"00:11:22:33:44:55\":
            name: AP-1
            deviceprofile_name: standard
            radio_config:
              band_5:
                channel: 36
";

    #[test]
    fn yaml_intent_parses_into_typed_settings() {
        let file = IntentFile::parse(Path::new("lab.yaml"), LAB_YAML).unwrap();
        let site = file.site("LAB-01").unwrap();
        assert_eq!(site.api.as_deref(), Some("mist"));

        let devices = site.devices(DeviceType::Ap).unwrap();
        assert_eq!(devices.len(), 1);
        let (mac, device) = &devices[0];
        assert_eq!(mac.as_str(), "001122334455");
        assert_eq!(device.deviceprofile_name.as_deref(), Some("standard"));
        let band_5 = device.settings.radio_config.as_ref().unwrap().band_5.as_ref().unwrap();
        assert_eq!(band_5.channel, Some(Channel::Fixed(36)));
    }

    #[test]
    fn auto_channel_is_accepted_in_intent() {
        let yaml = LAB_YAML.replace("channel: 36", "channel: auto");
        let file = IntentFile::parse(Path::new("lab.yaml"), &yaml).unwrap();
        let devices = file.site("LAB-01").unwrap().devices(DeviceType::Ap).unwrap();
        let band_5 = devices[0].1.settings.radio_config.as_ref().unwrap().band_5.as_ref().unwrap();
        assert_eq!(band_5.channel, Some(Channel::Auto));

        let bad = LAB_YAML.replace("channel: 36", "channel: sometimes");
        assert!(matches!(
            IntentFile::parse(Path::new("lab.yaml"), &bad),
            Err(CoreError::Intent { .. })
        ));
    }

    #[test]
    fn version_is_required_and_bounded() {
        let missing = IntentFile::parse(Path::new("a.json"), r#"{"config": {}}"#);
        assert!(matches!(missing, Err(CoreError::Intent { .. })));

        let future = IntentFile::parse(Path::new("a.json"), r#"{"version": 2}"#);
        let err = future.unwrap_err().to_string();
        assert!(err.contains("unsupported version 2"), "{err}");
    }

    #[test]
    fn bad_and_duplicate_macs_are_rejected() {
        let bad = r#"{"version": 1, "config": {"sites": {"S": {"devices": {"ap": {"xyz": {}}}}}}}"#;
        assert!(IntentFile::parse(Path::new("a.json"), bad).is_err());

        let dup = r#"{"version": 1, "config": {"sites": {"S": {"devices": {"ap": {
            "00:11:22:33:44:55": {}, "001122334455": {}}}}}}}"#;
        let err = IntentFile::parse(Path::new("a.json"), dup).unwrap_err().to_string();
        assert!(err.contains("same device"), "{err}");
    }

    #[test]
    fn format_ignores_backup_serial() {
        assert_eq!(IntentFormat::from_path(Path::new("x/sites.yml.12")), Some(IntentFormat::Yaml));
        assert_eq!(IntentFormat::from_path(Path::new("sites.JSON")), Some(IntentFormat::Json));
        assert_eq!(IntentFormat::from_path(Path::new("sites.toml")), None);
    }

    #[test]
    fn catalog_locates_sites_and_flags_duplicates() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("lab.yaml"), LAB_YAML).unwrap();
        std::fs::write(
            dir.path().join("hq.json"),
            r#"{"version": 1, "config": {"sites": {"HQ": {}}}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("lab.yaml.0"), "not even yaml: [").unwrap();

        let catalog = IntentCatalog::new(dir.path());
        assert_eq!(catalog.files().unwrap().len(), 2);
        assert_eq!(catalog.locate("HQ").unwrap(), dir.path().join("hq.json"));
        assert!(catalog.locate("nowhere").unwrap_err().is_not_found());

        std::fs::write(
            dir.path().join("copy.json"),
            r#"{"version": 1, "config": {"sites": {"HQ": {}}}}"#,
        )
        .unwrap();
        assert!(matches!(
            catalog.locate("HQ"),
            Err(CoreError::Ambiguous { .. })
        ));
    }

    #[test]
    fn placeholder_is_added_once_and_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lab.yaml");
        let mut file = IntentFile::parse(&path, LAB_YAML).unwrap();
        let site = file.site_mut("LAB-01").unwrap();

        let known = MacAddress::parse("001122334455").unwrap();
        let new = MacAddress::parse("aabbccddeeff").unwrap();
        assert!(!site.add_placeholder(DeviceType::Ap, &known, Some("dup".into())));
        assert!(site.add_placeholder(DeviceType::Ap, &new, Some("AP-2".into())));

        file.save(&path).unwrap();
        let back = IntentFile::load(&path).unwrap();
        let ap = &back.site("LAB-01").unwrap().devices.ap;
        assert_eq!(ap["aa:bb:cc:dd:ee:ff"].settings.name.as_deref(), Some("AP-2"));
        assert_eq!(ap.len(), 2);
    }
}
