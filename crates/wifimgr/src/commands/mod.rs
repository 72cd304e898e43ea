//! Command dispatch: bridges CLI args -> `Fleet` calls -> output formatting.

pub mod apis;
pub mod backups;
pub mod device;
pub mod reconcile;
pub mod refresh;
pub mod sites;
pub mod util;

use tokio_util::sync::CancellationToken;
use wifimgr_core::Fleet;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a fleet-bound command to its handler.
pub async fn dispatch(
    cmd: Command,
    fleet: &Fleet,
    cancel: &CancellationToken,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Apis => apis::handle(fleet, global),
        Command::Refresh(args) => refresh::handle(fleet, cancel, args, global).await,
        Command::Sites(args) => sites::handle(fleet, &args, global),
        Command::Device(args) => device::handle(fleet, &args, global),
        Command::Diff(args) => reconcile::diff(fleet, cancel, args, global).await,
        Command::Apply(args) => reconcile::apply(fleet, cancel, args, global).await,
        Command::Import(args) => reconcile::import(fleet, cancel, args, global).await,
        Command::Backups(args) => backups::handle(fleet, args, global),
        Command::Rollback(args) => backups::rollback(fleet, &args, global),
        Command::Completions(_) => Err(CliError::Internal(
            "completions are generated before configuration is loaded".into(),
        )),
    }
}
