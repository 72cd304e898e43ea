#![allow(clippy::unwrap_used)]
// Integration tests for `FixtureClient` backed by a temporary file.

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use wifimgr_api::{
    Capability, CapabilitySet, DeviceType, DeviceUpdate, Error, FixtureClient, FixtureData,
    FixtureFactory, VendorClient, VendorFactory, VendorSettings,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn sample() -> FixtureData {
    serde_json::from_value(json!({
        "vendor": "mist",
        "sites": [{"id": "s-1", "name": "LAB-01"}],
        "inventory": [
            {"mac": "00:11:22:33:44:55", "type": "ap", "serial": "A100", "model": "AP45"},
            {"mac": "aa:bb:cc:dd:ee:ff", "type": "ap", "id": "d-2", "site_id": "s-1", "name": "AP-2"}
        ],
        "devices": [
            {
                "id": "d-2", "mac": "aa:bb:cc:dd:ee:ff", "type": "ap", "site_id": "s-1",
                "name": "AP-2",
                "config": {"radio_config": {"band_5": {"channel": 40, "power": 10}}}
            }
        ]
    }))
    .unwrap()
}

fn write_fixture(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("mist.json");
    sample().save(&path).unwrap();
    path
}

fn patch(value: serde_json::Value) -> DeviceUpdate {
    DeviceUpdate {
        device_type: DeviceType::Ap,
        patch: value.as_object().cloned().unwrap(),
    }
}

// ── Reads ───────────────────────────────────────────────────────────

#[tokio::test]
async fn lists_configs_per_site_and_type() {
    let client = FixtureClient::new(sample());

    let aps = client.list_device_configs("s-1", DeviceType::Ap).await.unwrap();
    assert_eq!(aps.len(), 1);
    assert_eq!(aps[0].id, "d-2");

    let switches = client
        .list_device_configs("s-1", DeviceType::Switch)
        .await
        .unwrap();
    assert!(switches.is_empty());
}

#[tokio::test]
async fn disabled_capability_is_unsupported() {
    let client = FixtureClient::new(sample())
        .with_capabilities(CapabilitySet::all().without(Capability::Wlans));

    let result = client.list_wlans().await;
    assert!(
        matches!(result, Err(Error::Unsupported { capability: Capability::Wlans, .. })),
        "expected Unsupported, got: {result:?}"
    );
}

#[tokio::test]
async fn search_matches_mac_in_any_spelling() {
    let client = FixtureClient::new(sample());
    let hits = client.search_devices("0011.2233.4455").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].mac, "00:11:22:33:44:55");
}

// ── Writes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn update_merges_and_persists() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir);
    let client = FixtureClient::from_file(&path).unwrap();

    let updated = client
        .update_device(
            "s-1",
            "d-2",
            &patch(json!({"radio_config": {"band_5": {"channel": 36}}})),
        )
        .await
        .unwrap();

    assert_eq!(
        updated.config["radio_config"]["band_5"],
        json!({"channel": 36, "power": 10})
    );

    let on_disk = FixtureData::from_file(&path).unwrap();
    assert_eq!(
        on_disk.devices[0].config["radio_config"]["band_5"]["channel"],
        json!(36)
    );
}

#[tokio::test]
async fn assign_claims_inventory_device() {
    let client = FixtureClient::new(sample());

    let record = client
        .assign_device("s-1", "001122334455", &patch(json!({"name": "AP-1"})))
        .await
        .unwrap();

    assert_eq!(record.site_id, "s-1");
    assert_eq!(record.name.as_deref(), Some("AP-1"));

    let data = client.data().await;
    let item = data
        .inventory
        .iter()
        .find(|i| i.mac == "00:11:22:33:44:55")
        .unwrap();
    assert_eq!(item.site_id.as_deref(), Some("s-1"));
    assert_eq!(item.id.as_deref(), Some("dev-001122334455"));
}

#[tokio::test]
async fn assign_unknown_mac_is_not_found() {
    let client = FixtureClient::new(sample());
    let err = client
        .assign_device("s-1", "ff:ff:ff:ff:ff:ff", &patch(json!({})))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn update_rejects_wrong_device_type() {
    let client = FixtureClient::new(sample());
    let update = DeviceUpdate {
        device_type: DeviceType::Switch,
        patch: serde_json::Map::new(),
    };
    let err = client.update_device("s-1", "d-2", &update).await.unwrap_err();
    assert!(matches!(err, Error::Rejected { .. }));
}

// ── Factory ─────────────────────────────────────────────────────────

#[tokio::test]
async fn factory_applies_options() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir);
    let mut settings = VendorSettings {
        label: "mist-lab".into(),
        vendor: "mist".into(),
        fixture: Some(path),
        ..VendorSettings::default()
    };
    settings
        .options
        .insert("capabilities".into(), "sites,inventory".into());
    settings.options.insert("lazy_configs".into(), "true".into());

    let client = FixtureFactory.build(&settings).unwrap();
    assert_eq!(client.vendor(), "mist");
    assert!(client.lazy_device_configs());
    assert!(client.capabilities().contains(Capability::Sites));
    assert!(!client.capabilities().contains(Capability::Devices));
    assert!(client.writable_device_types().is_empty());
}
