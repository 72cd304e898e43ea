// ── Device domain types ──

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::mac::MacAddress;
use wifimgr_api::DeviceType;

/// One claimed device as seen in a vendor's inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub mac: MacAddress,
    pub device_type: DeviceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    /// API label the item was read from.
    pub source_api: String,
    pub source_vendor: String,
}

/// Live configuration of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub id: String,
    pub mac: MacAddress,
    pub device_type: DeviceType,
    pub site_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub source_api: String,
    pub source_vendor: String,
    pub settings: DeviceSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub status: String,
}

/// Vendor-neutral device configuration.
///
/// The typed fields are the core schema shared by every vendor; anything
/// else lives in `vendor`, which is flattened back into the document on
/// the wire. Every field is optional so that "not declared" stays distinct
/// from "declared empty".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radio_config: Option<RadioConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviceprofile_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_config: Option<Map<String, Value>>,
    /// Vendor extension block.
    #[serde(flatten)]
    pub vendor: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadioConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band_24: Option<RadioBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band_5: Option<RadioBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band_6: Option<RadioBand>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadioBand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Radio channel: a fixed number, or `auto` to leave selection to the
/// vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Auto,
    Fixed(u32),
}

impl Serialize for Channel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Auto => serializer.serialize_str("auto"),
            Self::Fixed(n) => serializer.serialize_u32(*n),
        }
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Fixed(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Fixed(n) => Ok(Self::Fixed(n)),
            Raw::Text(text) if text == "auto" => Ok(Self::Auto),
            Raw::Text(text) => Err(D::Error::custom(format!(
                "invalid channel '{text}': expected a number or \"auto\""
            ))),
        }
    }
}

impl DeviceSettings {
    /// Parse a vendor document. Documents whose core fields don't fit the
    /// schema (e.g. `"power": "max"`) are kept whole in the extension
    /// block so no data is lost.
    pub fn from_wire(doc: Map<String, Value>) -> Self {
        match serde_json::from_value::<Self>(Value::Object(doc.clone())) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(error = %e, "device document outside core schema; keeping raw");
                Self {
                    vendor: doc,
                    ..Self::default()
                }
            }
        }
    }

    /// Flatten back to a single JSON document.
    pub fn to_wire(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Effective display name, whichever representation carries it.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or_else(|| self.vendor.get("name").and_then(Value::as_str))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn core_fields_are_typed_and_rest_is_vendor() {
        let settings = DeviceSettings::from_wire(doc(json!({
            "name": "AP-1",
            "radio_config": {"band_5": {"channel": 36, "antenna_mode": "4x4"}},
            "led": {"enabled": false}
        })));

        assert_eq!(settings.name.as_deref(), Some("AP-1"));
        let band_5 = settings.radio_config.as_ref().unwrap().band_5.as_ref().unwrap();
        assert_eq!(band_5.channel, Some(Channel::Fixed(36)));
        assert_eq!(band_5.extra["antenna_mode"], json!("4x4"));
        assert_eq!(settings.vendor["led"], json!({"enabled": false}));
    }

    #[test]
    fn wire_round_trip_is_lossless() {
        let original = doc(json!({
            "name": "AP-1",
            "tags": ["lobby"],
            "radio_config": {"band_24": {"disabled": true}},
            "height": 2.5
        }));
        let settings = DeviceSettings::from_wire(original.clone());
        assert_eq!(settings.to_wire(), original);
    }

    #[test]
    fn auto_channel_is_in_schema() {
        let original = doc(json!({
            "radio_config": {"band_24": {"channel": "auto"}, "band_5": {"channel": 149}}
        }));
        let settings = DeviceSettings::from_wire(original.clone());
        let radio = settings.radio_config.as_ref().unwrap();
        assert_eq!(radio.band_24.as_ref().unwrap().channel, Some(Channel::Auto));
        assert_eq!(radio.band_5.as_ref().unwrap().channel, Some(Channel::Fixed(149)));
        assert_eq!(settings.to_wire(), original);
    }

    #[test]
    fn off_schema_document_is_kept_raw() {
        let original = doc(json!({
            "name": "AP-1",
            "radio_config": {"band_5": {"channel": "dfs", "power": "max"}}
        }));
        let settings = DeviceSettings::from_wire(original.clone());
        assert!(settings.radio_config.is_none());
        assert_eq!(settings.display_name(), Some("AP-1"));
        assert_eq!(settings.to_wire(), original);
    }
}
