use std::fmt::Write as _;

use serde::Serialize;

use wifimgr_core::{ConfigRef, DeviceRef, Fleet};

use crate::cli::{DeviceArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct DeviceView {
    #[serde(flatten)]
    device: DeviceRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<ConfigRef>,
}

fn detail(view: &DeviceView) -> String {
    let d = &view.device;
    let dash = || "-".to_owned();
    let mut out = String::new();
    let _ = writeln!(out, "MAC:      {}", d.item.mac.colon_form());
    let _ = writeln!(out, "Type:     {}", d.device_type);
    let _ = writeln!(out, "Name:     {}", d.item.name.clone().unwrap_or_else(dash));
    let _ = writeln!(out, "Model:    {}", d.item.model.clone().unwrap_or_else(dash));
    let _ = writeln!(out, "Serial:   {}", d.item.serial.clone().unwrap_or_else(dash));
    let site = match (&d.site_name, &d.item.site_id) {
        (Some(name), Some(id)) => format!("{name} ({id})"),
        (None, Some(id)) => id.clone(),
        _ => "unassigned".into(),
    };
    let _ = writeln!(out, "Site:     {site}");
    let _ = write!(out, "API:      {} ({})", d.label, d.vendor);

    if let Some(cfg) = &view.config {
        let settings = serde_yaml::to_string(&cfg.config.settings).unwrap_or_default();
        let _ = write!(out, "\n\nConfig ({}):\n{}", cfg.config.id, settings.trim_end());
    }
    out
}

pub fn handle(fleet: &Fleet, args: &DeviceArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let device = fleet.accessor().device_by_mac(&args.mac)?;
    let config = if args.show_config {
        Some(fleet.accessor().device_config_by_mac(&args.mac)?)
    } else {
        None
    };

    let view = DeviceView { device, config };
    let out = output::render_single(global.output, &view, detail)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
