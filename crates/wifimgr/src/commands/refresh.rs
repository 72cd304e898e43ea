//! `refresh`: rebuild cache snapshots from the vendors.

use serde::Serialize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use wifimgr_core::Fleet;

use crate::cli::{GlobalOpts, RefreshArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct RefreshResult {
    label: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sites: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    devices: Option<usize>,
}

#[derive(Tabled)]
struct RefreshRow {
    #[tabled(rename = "API")]
    label: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Sites")]
    sites: String,
    #[tabled(rename = "Devices")]
    devices: String,
}

impl From<&RefreshResult> for RefreshRow {
    fn from(r: &RefreshResult) -> Self {
        let count = |n: Option<usize>| n.map(|n| n.to_string()).unwrap_or_default();
        Self {
            label: r.label.clone(),
            result: r.error.clone().unwrap_or_else(|| "refreshed".into()),
            sites: count(r.sites),
            devices: count(r.devices),
        }
    }
}

fn succeeded(fleet: &Fleet, label: String) -> RefreshResult {
    let cache = fleet.caches().get_api_cache(&label).ok();
    RefreshResult {
        sites: cache.as_ref().map(|c| c.sites.len()),
        devices: cache.as_ref().map(|c| c.inventory.len()),
        label,
        ok: true,
        error: None,
    }
}

pub async fn handle(
    fleet: &Fleet,
    cancel: &CancellationToken,
    args: RefreshArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(label) = args.api {
        let bar = util::spinner(format!("refreshing {label}"), global.quiet);
        let result = fleet.refresh_api(cancel, &label).await;
        bar.finish_and_clear();
        result?;

        let results = [succeeded(fleet, label)];
        let out = output::render_list(global.output, &results, RefreshRow::from)?;
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    let bar = util::spinner(
        format!("refreshing {} APIs", fleet.registry().len()),
        global.quiet,
    );
    let report = fleet.refresh_all_apis(cancel).await;
    bar.finish_and_clear();

    let mut results: Vec<RefreshResult> = report
        .succeeded
        .iter()
        .map(|label| succeeded(fleet, label.clone()))
        .collect();
    results.extend(report.failures.iter().map(|(label, err)| RefreshResult {
        label: label.clone(),
        ok: false,
        error: Some(err.to_string()),
        sites: None,
        devices: None,
    }));
    results.sort_by(|a, b| a.label.cmp(&b.label));

    let out = output::render_list(global.output, &results, RefreshRow::from)?;
    output::print_output(&out, global.quiet);

    // A lone failure keeps its own exit code.
    if report.total() == 1 {
        return match report.failures.into_values().next() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        };
    }
    report.into_result().map(|_| ()).map_err(CliError::from)
}
