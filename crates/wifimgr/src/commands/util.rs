//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use wifimgr_core::{ApplyRequest, DeviceType, RefreshMode};

use crate::cli::{DeviceKind, RefreshChoice, SiteTarget};
use crate::error::CliError;

pub fn device_type(kind: DeviceKind) -> DeviceType {
    match kind {
        DeviceKind::Ap => DeviceType::Ap,
        DeviceKind::Switch => DeviceType::Switch,
        DeviceKind::Gateway => DeviceType::Gateway,
    }
}

pub fn refresh_mode(choice: RefreshChoice) -> RefreshMode {
    match choice {
        RefreshChoice::Auto => RefreshMode::IfNeeded,
        RefreshChoice::Always => RefreshMode::Always,
        RefreshChoice::Never => RefreshMode::Never,
    }
}

/// Engine request for a site target; callers add force / dry-run.
pub fn request(target: &SiteTarget) -> ApplyRequest {
    let mut request = ApplyRequest::new(target.site.clone(), device_type(target.device_type))
        .refresh(refresh_mode(target.refresh));
    if let Some(api) = &target.api {
        request = request.with_api(api.clone());
    }
    request
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
/// Without a terminal there is nobody to ask, so that is an error.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Spinner on stderr while a vendor call runs. Hidden when quiet or when
/// stderr is not a terminal.
pub fn spinner(message: impl Into<String>, quiet: bool) -> ProgressBar {
    if quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Human-readable age, e.g. `3m`, `2h`, `5d`.
pub fn format_age(age: chrono::Duration) -> String {
    let secs = age.num_seconds().max(0);
    match secs {
        0..60 => format!("{secs}s"),
        60..3600 => format!("{}m", secs / 60),
        3600..86_400 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86_400),
    }
}
