// ── Intent vs. live diff ──
//
// Compares every field the intent declares against the cached live value
// at the same path. Fields the intent leaves out are never compared and
// never written: applying is a merge, not a replace. Results are plain
// values computed fresh on each call.

mod render;

pub use render::{render_split, render_unified};

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use wifimgr_api::DeviceType;

use crate::model::{ApiCache, MacAddress};

/// What applying would do to one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Verdict {
    NoOp,
    Update,
    Create,
}

/// One differing leaf. `old` is `None` when the live document has nothing
/// at that path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub path: String,
    pub old: Option<Value>,
    pub new: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceDiff {
    pub mac: MacAddress,
    pub device_type: DeviceType,
    pub name: Option<String>,
    /// Live device id, when the device is already at the site.
    pub device_id: Option<String>,
    pub verdict: Verdict,
    pub changes: Vec<FieldChange>,
    /// The intent-declared document; sent as the patch on apply.
    #[serde(skip)]
    pub desired: Map<String, Value>,
}

/// A live device at the site that the intent does not declare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmanagedDevice {
    pub mac: MacAddress,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteDiff {
    pub site: String,
    pub site_id: String,
    pub label: String,
    pub device_type: DeviceType,
    /// Sorted by MAC.
    pub devices: Vec<DeviceDiff>,
    pub unmanaged: Vec<UnmanagedDevice>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffCounts {
    pub create: usize,
    pub update: usize,
    pub no_op: usize,
    pub unmanaged: usize,
}

impl SiteDiff {
    pub fn counts(&self) -> DiffCounts {
        let mut counts = DiffCounts {
            unmanaged: self.unmanaged.len(),
            ..DiffCounts::default()
        };
        for device in &self.devices {
            match device.verdict {
                Verdict::Create => counts.create += 1,
                Verdict::Update => counts.update += 1,
                Verdict::NoOp => counts.no_op += 1,
            }
        }
        counts
    }

    /// `true` when at least one device would be written without `force`.
    pub fn has_changes(&self) -> bool {
        self.devices.iter().any(|d| d.verdict != Verdict::NoOp)
    }

    /// Devices an apply would write.
    pub fn pending(&self, force: bool) -> impl Iterator<Item = &DeviceDiff> {
        self.devices
            .iter()
            .filter(move |d| force || d.verdict != Verdict::NoOp)
    }
}

/// One declared device, already resolved into the vendor-neutral wire
/// document that should be live.
#[derive(Debug, Clone)]
pub struct DesiredDevice {
    pub mac: MacAddress,
    pub document: Map<String, Value>,
}

/// Location of the diff inside one API's cache.
#[derive(Debug, Clone, Copy)]
pub struct DiffScope<'a> {
    pub site: &'a str,
    pub site_id: &'a str,
    pub device_type: DeviceType,
}

/// Diff `desired` against the live state of one site in `cache`.
pub fn compute_site_diff(cache: &ApiCache, scope: DiffScope<'_>, desired: &[DesiredDevice]) -> SiteDiff {
    let mut devices: Vec<DeviceDiff> = desired
        .iter()
        .map(|want| device_diff(cache, scope, want))
        .collect();
    devices.sort_by(|a, b| a.mac.cmp(&b.mac));

    let declared: BTreeSet<&MacAddress> = desired.iter().map(|d| &d.mac).collect();
    let mut unmanaged: Vec<UnmanagedDevice> = cache
        .devices_at_site(scope.site_id, scope.device_type)
        .filter(|item| !declared.contains(&item.mac))
        .map(|item| UnmanagedDevice {
            mac: item.mac.clone(),
            name: item.name.clone(),
        })
        .collect();
    unmanaged.sort_by(|a, b| a.mac.cmp(&b.mac));

    SiteDiff {
        site: scope.site.to_owned(),
        site_id: scope.site_id.to_owned(),
        label: cache.label().to_owned(),
        device_type: scope.device_type,
        devices,
        unmanaged,
    }
}

fn device_diff(cache: &ApiCache, scope: DiffScope<'_>, want: &DesiredDevice) -> DeviceDiff {
    let item = cache
        .inventory
        .get(scope.device_type, &want.mac)
        .filter(|item| item.site_id.as_deref() == Some(scope.site_id));

    let declared_name = want.document.get("name").and_then(Value::as_str).map(str::to_owned);

    let Some(item) = item else {
        // Not at this site yet: every declared field is new.
        let changes = leaves(&want.document)
            .into_iter()
            .map(|(path, value)| FieldChange {
                path: join(&path),
                old: None,
                new: value.clone(),
            })
            .collect();
        return DeviceDiff {
            mac: want.mac.clone(),
            device_type: scope.device_type,
            name: declared_name,
            device_id: None,
            verdict: Verdict::Create,
            changes,
            desired: want.document.clone(),
        };
    };

    let live_config = cache.config(scope.device_type, &want.mac);
    let live = live_config
        .map(|c| c.settings.to_wire())
        .unwrap_or_default();
    let changes = compare(&want.document, &live);
    let verdict = if changes.is_empty() {
        Verdict::NoOp
    } else {
        Verdict::Update
    };

    DeviceDiff {
        mac: want.mac.clone(),
        device_type: scope.device_type,
        name: declared_name
            .or_else(|| item.name.clone())
            .or_else(|| live_config.and_then(|c| c.settings.display_name().map(str::to_owned))),
        device_id: item.id.clone(),
        verdict,
        changes,
        desired: want.document.clone(),
    }
}

/// Field-level changes for every leaf declared in `intent`.
pub fn compare(intent: &Map<String, Value>, live: &Map<String, Value>) -> Vec<FieldChange> {
    leaves(intent)
        .into_iter()
        .filter_map(|(path, want)| {
            let have = lookup(live, &path);
            if have.is_some_and(|have| satisfies(have, want)) {
                None
            } else {
                Some(FieldChange {
                    path: join(&path),
                    old: have.cloned(),
                    new: want.clone(),
                })
            }
        })
        .collect()
}

/// Leaf values of a document with their key paths. Arrays and empty
/// objects count as leaves; see [`satisfies`] for how the latter match.
fn leaves(doc: &Map<String, Value>) -> Vec<(Vec<&str>, &Value)> {
    fn walk<'a>(prefix: &mut Vec<&'a str>, doc: &'a Map<String, Value>, out: &mut Vec<(Vec<&'a str>, &'a Value)>) {
        for (key, value) in doc {
            prefix.push(key);
            match value {
                Value::Object(inner) if !inner.is_empty() => walk(prefix, inner, out),
                _ => out.push((prefix.clone(), value)),
            }
            prefix.pop();
        }
    }
    let mut out = Vec::new();
    walk(&mut Vec::new(), doc, &mut out);
    out
}

fn lookup<'a>(doc: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (last, parents) = path.split_last()?;
    let mut current = doc;
    for key in parents {
        current = current.get(*key)?.as_object()?;
    }
    current.get(*last)
}

fn join(path: &[&str]) -> String {
    path.join(".")
}

/// Whether a live leaf already meets the declared one. An empty declared
/// object only asks for an object to exist, since merging it adds nothing.
fn satisfies(have: &Value, want: &Value) -> bool {
    match (have, want) {
        (Value::Object(_), Value::Object(w)) if w.is_empty() => true,
        _ => values_equal(have, want),
    }
}

/// Equality that treats `5` and `5.0` as the same number.
#[allow(clippy::float_cmp)]
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => a == b,
    }
}
