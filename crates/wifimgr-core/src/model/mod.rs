// ── Domain model ──

pub mod cache;
pub mod device;
pub mod mac;

pub use cache::{ApiCache, CACHE_SCHEMA_VERSION, CacheMeta, DeviceTables, SiteIndex};
pub use device::{Channel, DeviceConfig, DeviceSettings, DeviceStatus, InventoryItem, RadioBand, RadioConfig};
pub use mac::{MacAddress, MacParseError, normalize_mac};
pub use wifimgr_api::DeviceType;
