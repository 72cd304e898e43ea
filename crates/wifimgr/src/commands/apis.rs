//! `apis`: configured vendor APIs, their health and cache state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;

use wifimgr_core::{ClientHealth, Fleet, LoadStatus};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct ApiStatus {
    label: String,
    vendor: String,
    health: ClientHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    capabilities: Option<String>,
    read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache: Option<LoadStatus>,
    last_refresh: Option<DateTime<Utc>>,
    sites: usize,
    devices: usize,
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ApiRow {
    #[tabled(rename = "API")]
    label: String,
    #[tabled(rename = "Vendor")]
    vendor: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Capabilities")]
    capabilities: String,
    #[tabled(rename = "Sites")]
    sites: usize,
    #[tabled(rename = "Devices")]
    devices: usize,
    #[tabled(rename = "Refreshed")]
    refreshed: String,
}

impl From<&ApiStatus> for ApiRow {
    fn from(s: &ApiStatus) -> Self {
        let status = match &s.health {
            ClientHealth::Ready if s.read_only => "ready (read-only)".into(),
            ClientHealth::Ready => "ready".into(),
            ClientHealth::Failed { reason } => format!("failed: {reason}"),
        };
        let refreshed = match (&s.cache, s.last_refresh) {
            (Some(LoadStatus::Corrupt { .. }), None) => "corrupt, refresh needed".into(),
            (_, Some(at)) => format!("{} ago", util::format_age(Utc::now() - at)),
            (_, None) => "never".into(),
        };
        Self {
            label: s.label.clone(),
            vendor: s.vendor.clone(),
            status,
            capabilities: s.capabilities.clone().unwrap_or_default(),
            sites: s.sites,
            devices: s.devices,
            refreshed,
        }
    }
}

fn collect(fleet: &Fleet) -> Vec<ApiStatus> {
    let registry = fleet.registry();
    let mut statuses = Vec::new();

    for label in registry.labels() {
        let Some(info) = registry.info(&label) else {
            continue;
        };
        let cache = fleet.caches().get_api_cache(&label).ok();
        statuses.push(ApiStatus {
            vendor: info.vendor.clone(),
            health: ClientHealth::Ready,
            capabilities: Some(info.capabilities.to_string()),
            read_only: info.read_only,
            cache: fleet.caches().load_status(&label).ok(),
            last_refresh: cache.as_ref().and_then(|c| c.meta.last_refresh),
            sites: cache.as_ref().map_or(0, |c| c.sites.len()),
            devices: cache.as_ref().map_or(0, |c| c.inventory.len()),
            label,
        });
    }

    for failure in registry.failures() {
        statuses.push(ApiStatus {
            label: failure.label.clone(),
            vendor: failure.vendor.clone(),
            health: ClientHealth::Failed {
                reason: failure.reason.clone(),
            },
            capabilities: None,
            read_only: false,
            cache: None,
            last_refresh: None,
            sites: 0,
            devices: 0,
        });
    }

    statuses.sort_by(|a, b| a.label.cmp(&b.label));
    statuses
}

pub fn handle(fleet: &Fleet, global: &GlobalOpts) -> Result<(), CliError> {
    let statuses = collect(fleet);
    let out = output::render_list(global.output, &statuses, ApiRow::from)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
