//! `diff`, `apply` and `import`: intent reconciliation for one site.

use std::fmt::Write as _;

use tokio_util::sync::CancellationToken;

use wifimgr_core::diff::{render_split, render_unified};
use wifimgr_core::{ApplyOutcome, DiffOutcome, Fleet, ImportOutcome, RefreshMode, SiteDiff};

use crate::cli::{ApplyArgs, DiffArgs, GlobalOpts, ImportArgs};
use crate::error::CliError;
use crate::output;

use super::util;

fn render_diff(diff: &SiteDiff, split: bool, global: &GlobalOpts) -> String {
    let text = if split {
        render_split(diff)
    } else {
        render_unified(diff)
    };
    output::colorize_diff(&text, output::should_color(global.color))
}

fn warn_all(warnings: &[String], quiet: bool) {
    for warning in warnings {
        output::status(&format!("warning: {warning}"), quiet);
    }
}

// ── diff ─────────────────────────────────────────────────────────────

pub async fn diff(
    fleet: &Fleet,
    cancel: &CancellationToken,
    args: DiffArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let request = util::request(&args.target);
    let bar = util::spinner(format!("diffing {}", request.site), global.quiet);
    let result = fleet.diff(cancel, &request).await;
    bar.finish_and_clear();
    let outcome = result?;

    warn_all(&outcome.resolution.warnings, global.quiet);
    let out = output::render_single(global.output, &outcome, |o: &DiffOutcome| {
        render_diff(&o.diff, args.split, global)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── apply ────────────────────────────────────────────────────────────

fn apply_report(outcome: &ApplyOutcome) -> String {
    let mut out = String::new();
    let (verb, count) = if outcome.dry_run {
        (
            "would write",
            outcome.diff.devices.len() - outcome.skipped.len(),
        )
    } else {
        ("wrote", outcome.written.len())
    };
    let _ = write!(
        out,
        "{}: {verb} {count} device(s), skipped {}",
        outcome.label,
        outcome.skipped.len()
    );
    if let Some(backup) = &outcome.backup {
        let _ = write!(out, "\nintent backed up to {}", backup.path.display());
    }
    for failure in &outcome.failures {
        let _ = write!(
            out,
            "\nfailed {} ({}): {}",
            failure.mac.colon_form(),
            failure.verdict,
            failure.error
        );
    }
    out
}

fn check_outcome(outcome: &ApplyOutcome) -> Result<(), CliError> {
    if outcome.cancelled {
        return Err(CliError::Interrupted {
            written: outcome.written.len(),
        });
    }
    if !outcome.failures.is_empty() {
        return Err(CliError::ApplyFailed {
            failed: outcome.failures.len(),
            total: outcome.written.len() + outcome.failures.len(),
        });
    }
    Ok(())
}

pub async fn apply(
    fleet: &Fleet,
    cancel: &CancellationToken,
    args: ApplyArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let request = util::request(&args.target)
        .force(args.force)
        .dry_run(args.dry_run);

    if args.dry_run {
        let outcome = fleet.apply(cancel, &request).await?;
        warn_all(&outcome.warnings, global.quiet);
        let out = output::render_single(global.output, &outcome, |o: &ApplyOutcome| {
            format!(
                "{}\n\n{}",
                render_diff(&o.diff, args.split, global),
                apply_report(o)
            )
        })?;
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    // Show what will change before asking.
    let bar = util::spinner(format!("diffing {}", request.site), global.quiet);
    let planned = fleet.diff(cancel, &request).await;
    bar.finish_and_clear();
    let planned = planned?;
    warn_all(&planned.resolution.warnings, global.quiet);

    if !args.force && !planned.diff.has_changes() {
        output::status(
            &format!("{} is already converged, nothing to apply", request.site),
            global.quiet,
        );
        return Ok(());
    }

    let pending = planned.diff.pending(args.force).count();
    if matches!(global.output, crate::cli::OutputFormat::Table) {
        output::print_output(&render_diff(&planned.diff, args.split, global), global.quiet);
    }
    let prompt = format!(
        "Write {pending} device(s) to {} via {}?",
        request.site, planned.resolution.label
    );
    if !util::confirm(&prompt, "apply", global.yes)? {
        output::status("Aborted.", global.quiet);
        return Ok(());
    }

    // The diff above already honoured the refresh choice.
    let request = request
        .with_api(planned.resolution.label.clone())
        .refresh(RefreshMode::Never);
    let bar = util::spinner(format!("applying {pending} device(s)"), global.quiet);
    let result = fleet.apply(cancel, &request).await;
    bar.finish_and_clear();
    let outcome = result?;

    warn_all(&outcome.warnings, global.quiet);
    let out = output::render_single(global.output, &outcome, apply_report)?;
    output::print_output(&out, global.quiet);
    check_outcome(&outcome)
}

// ── import ───────────────────────────────────────────────────────────

fn import_report(outcome: &ImportOutcome) -> String {
    let mut out = format!(
        "{}: declared {} device(s) from {} in {}",
        outcome.site,
        outcome.added.len(),
        outcome.label,
        outcome.intent_path.display()
    );
    for mac in &outcome.added {
        let _ = write!(out, "\n  + {}", mac.colon_form());
    }
    if let Some(backup) = &outcome.backup {
        let _ = write!(out, "\nintent backed up to {}", backup.path.display());
    }
    out
}

pub async fn import(
    fleet: &Fleet,
    cancel: &CancellationToken,
    args: ImportArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let request = util::request(&args.target);
    let bar = util::spinner(format!("importing {}", request.site), global.quiet);
    let result = fleet.import_site(cancel, &request).await;
    bar.finish_and_clear();
    let outcome = result?;

    let out = output::render_single(global.output, &outcome, import_report)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wifimgr_core::{DeviceFailure, DeviceType, MacAddress, Verdict};

    fn outcome() -> ApplyOutcome {
        ApplyOutcome {
            diff: SiteDiff {
                site: "LAB-01".into(),
                site_id: "site-lab".into(),
                label: "lab".into(),
                device_type: DeviceType::Ap,
                devices: Vec::new(),
                unmanaged: Vec::new(),
            },
            label: "lab".into(),
            dry_run: false,
            written: vec![MacAddress::parse("00:11:22:33:44:55").unwrap()],
            skipped: Vec::new(),
            failures: Vec::new(),
            backup: None,
            warnings: Vec::new(),
            cancelled: false,
        }
    }

    #[test]
    fn clean_apply_is_success() {
        let outcome = outcome();
        assert!(check_outcome(&outcome).is_ok());
        assert!(apply_report(&outcome).starts_with("lab: wrote 1 device(s)"));
    }

    #[test]
    fn failures_and_cancellation_are_partial() {
        let mut failed = outcome();
        failed.failures.push(DeviceFailure {
            mac: MacAddress::parse("aabbccddeeff").unwrap(),
            verdict: Verdict::Update,
            error: "rejected".into(),
        });
        let err = check_outcome(&failed).unwrap_err();
        assert!(matches!(err, CliError::ApplyFailed { failed: 1, total: 2 }));
        assert!(apply_report(&failed).contains("failed aa:bb:cc:dd:ee:ff (update): rejected"));

        let mut cancelled = outcome();
        cancelled.cancelled = true;
        assert!(matches!(
            check_outcome(&cancelled).unwrap_err(),
            CliError::Interrupted { written: 1 }
        ));
    }
}
