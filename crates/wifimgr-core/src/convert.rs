// ── Wire-to-domain conversions ──
//
// Bridges `wifimgr_api` records into cache model types. Every record is
// stamped with the label and vendor it came from, and every MAC goes
// through canonical normalization here, once.

use wifimgr_api::{DeviceRecord, InventoryRecord};

use crate::model::{DeviceConfig, DeviceSettings, InventoryItem, MacAddress, MacParseError};

/// Provenance stamped onto converted records.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Source<'a> {
    pub label: &'a str,
    pub vendor: &'a str,
}

impl Source<'_> {
    pub fn inventory_item(&self, rec: InventoryRecord) -> Result<InventoryItem, MacParseError> {
        Ok(InventoryItem {
            mac: MacAddress::parse(&rec.mac)?,
            device_type: rec.device_type,
            id: rec.id,
            name: rec.name,
            serial: rec.serial,
            model: rec.model,
            site_id: rec.site_id,
            source_api: self.label.to_owned(),
            source_vendor: self.vendor.to_owned(),
        })
    }

    pub fn device_config(&self, rec: DeviceRecord) -> Result<DeviceConfig, MacParseError> {
        let mac = MacAddress::parse(&rec.mac)?;
        let mut settings = DeviceSettings::from_wire(rec.config);
        if settings.display_name().is_none() {
            settings.name.clone_from(&rec.name);
        }
        let name = rec
            .name
            .or_else(|| settings.display_name().map(str::to_owned));

        Ok(DeviceConfig {
            id: rec.id,
            mac,
            device_type: rec.device_type,
            site_id: rec.site_id,
            name,
            source_api: self.label.to_owned(),
            source_vendor: self.vendor.to_owned(),
            settings,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wifimgr_api::DeviceType;

    const SOURCE: Source<'static> = Source {
        label: "mist-prod",
        vendor: "mist",
    };

    #[test]
    fn inventory_mac_is_canonical() {
        let item = SOURCE
            .inventory_item(InventoryRecord {
                mac: "00:11:22:AA:BB:CC".into(),
                device_type: DeviceType::Switch,
                id: None,
                name: None,
                serial: Some("S1".into()),
                model: None,
                site_id: None,
                status: None,
            })
            .unwrap();
        assert_eq!(item.mac.as_str(), "001122aabbcc");
        assert_eq!(item.source_api, "mist-prod");
    }

    #[test]
    fn record_name_fills_missing_settings_name() {
        let config = SOURCE
            .device_config(DeviceRecord {
                id: "d-1".into(),
                mac: "001122aabbcc".into(),
                device_type: DeviceType::Ap,
                site_id: "s-1".into(),
                name: Some("AP-1".into()),
                status: None,
                config: json!({"notes": "lobby"}).as_object().cloned().unwrap(),
            })
            .unwrap();
        assert_eq!(config.settings.name.as_deref(), Some("AP-1"));
        assert_eq!(config.settings.notes.as_deref(), Some("lobby"));
    }

    #[test]
    fn bad_mac_is_rejected() {
        let result = SOURCE.inventory_item(InventoryRecord {
            mac: "garbage".into(),
            device_type: DeviceType::Ap,
            id: None,
            name: None,
            serial: None,
            model: None,
            site_id: None,
            status: None,
        });
        assert!(result.is_err());
    }
}
