// ── Diff rendering ──
//
// Plain-text renderings of a `SiteDiff`. Unchanged devices are omitted.
// Callers add color.

use std::fmt::Write;

use serde_json::Value;

use super::{DeviceDiff, SiteDiff, Verdict};

const UNSET: &str = "(unset)";

fn value(v: Option<&Value>) -> String {
    match v {
        None => UNSET.to_owned(),
        Some(Value::String(s)) => format!("{s:?}"),
        Some(other) => other.to_string(),
    }
}

fn header(device: &DeviceDiff) -> String {
    match &device.name {
        Some(name) => format!("{} {} ({name})", device.verdict, device.mac.colon_form()),
        None => format!("{} {}", device.verdict, device.mac.colon_form()),
    }
}

fn summary(diff: &SiteDiff) -> String {
    let c = diff.counts();
    format!(
        "{} to create, {} to update, {} unchanged, {} unmanaged",
        c.create, c.update, c.no_op, c.unmanaged
    )
}

fn unmanaged(out: &mut String, diff: &SiteDiff) {
    for device in &diff.unmanaged {
        let name = device.name.as_deref().unwrap_or("-");
        let _ = writeln!(out, "# unmanaged {} ({name})", device.mac.colon_form());
    }
}

/// Line-oriented diff with one hunk per changed device.
pub fn render_unified(diff: &SiteDiff) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- live/{}/{} ({})", diff.site, diff.device_type, diff.label);
    let _ = writeln!(out, "+++ intent/{}/{}", diff.site, diff.device_type);

    for device in diff.devices.iter().filter(|d| d.verdict != Verdict::NoOp) {
        let _ = writeln!(out, "@@ {} @@", header(device));
        for change in &device.changes {
            if device.verdict == Verdict::Update {
                let _ = writeln!(out, "- {} = {}", change.path, value(change.old.as_ref()));
            }
            let _ = writeln!(out, "+ {} = {}", change.path, value(Some(&change.new)));
        }
    }
    unmanaged(&mut out, diff);
    out.push_str(&summary(diff));
    out.push('\n');
    out
}

/// Side-by-side diff: live on the left, intent on the right.
pub fn render_split(diff: &SiteDiff) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} / {} ({})", diff.site, diff.device_type, diff.label);

    for device in diff.devices.iter().filter(|d| d.verdict != Verdict::NoOp) {
        let rows: Vec<(String, String)> = device
            .changes
            .iter()
            .map(|c| {
                (
                    format!("{}: {}", c.path, value(c.old.as_ref())),
                    format!("{}: {}", c.path, value(Some(&c.new))),
                )
            })
            .collect();
        let width = rows
            .iter()
            .map(|(left, _)| left.chars().count())
            .chain(std::iter::once("live".len()))
            .max()
            .unwrap_or(0);

        let _ = writeln!(out, "\n== {} ==", header(device));
        let _ = writeln!(out, "{:<width$} | intent", "live");
        for (left, right) in rows {
            let _ = writeln!(out, "{left:<width$} | {right}");
        }
    }
    if !diff.unmanaged.is_empty() {
        out.push('\n');
        unmanaged(&mut out, diff);
    }
    out.push('\n');
    out.push_str(&summary(diff));
    out.push('\n');
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::diff::{FieldChange, UnmanagedDevice};
    use crate::model::MacAddress;
    use serde_json::{Map, json};
    use wifimgr_api::DeviceType;

    fn sample() -> SiteDiff {
        SiteDiff {
            site: "LAB-01".into(),
            site_id: "s-1".into(),
            label: "mist".into(),
            device_type: DeviceType::Ap,
            devices: vec![
                DeviceDiff {
                    mac: MacAddress::parse("001122334455").unwrap(),
                    device_type: DeviceType::Ap,
                    name: Some("AP-1".into()),
                    device_id: Some("d-1".into()),
                    verdict: Verdict::Update,
                    changes: vec![FieldChange {
                        path: "radio_config.band_5.channel".into(),
                        old: Some(json!(40)),
                        new: json!(36),
                    }],
                    desired: Map::new(),
                },
                DeviceDiff {
                    mac: MacAddress::parse("001122334466").unwrap(),
                    device_type: DeviceType::Ap,
                    name: None,
                    device_id: Some("d-2".into()),
                    verdict: Verdict::NoOp,
                    changes: Vec::new(),
                    desired: Map::new(),
                },
            ],
            unmanaged: vec![UnmanagedDevice {
                mac: MacAddress::parse("0011223344ff").unwrap(),
                name: Some("stray".into()),
            }],
        }
    }

    #[test]
    fn unified_shows_old_and_new() {
        let text = render_unified(&sample());
        assert!(text.contains("@@ update 00:11:22:33:44:55 (AP-1) @@"));
        assert!(text.contains("- radio_config.band_5.channel = 40"));
        assert!(text.contains("+ radio_config.band_5.channel = 36"));
        assert!(!text.contains("00:11:22:33:44:66"));
        assert!(text.contains("# unmanaged 00:11:22:33:44:ff (stray)"));
        assert!(text.ends_with("0 to create, 1 to update, 1 unchanged, 1 unmanaged\n"));
    }

    #[test]
    fn split_aligns_columns() {
        let text = render_split(&sample());
        let row = text
            .lines()
            .find(|l| l.starts_with("radio_config"))
            .unwrap();
        assert_eq!(
            row,
            "radio_config.band_5.channel: 40 | radio_config.band_5.channel: 36"
        );
        let width = "radio_config.band_5.channel: 40".len();
        assert!(text.contains(&format!("{:<width$} | intent", "live")));
    }
}
