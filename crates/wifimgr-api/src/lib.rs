// wifimgr-api: vendor client boundary (capability-set trait + wire models)

pub mod capability;
pub mod client;
pub mod error;
pub mod fixture;
pub mod models;

pub use capability::{Capability, CapabilitySet};
pub use client::{VendorClient, VendorFactory, VendorSettings};
pub use error::Error;
pub use fixture::{FixtureClient, FixtureData, FixtureFactory};
pub use models::{
    DeviceRecord, DeviceType, DeviceUpdate, InventoryRecord, ProfileRecord, SearchHit, SiteRecord,
    WlanRecord,
};
