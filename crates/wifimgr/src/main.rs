mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use wifimgr_core::{FactoryTable, Fleet};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Shell completions don't need configuration
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "wifimgr", &mut std::io::stdout());
            Ok(())
        }

        // Backup validation only reads the given file
        Command::Backups(cli::BackupsArgs {
            command: cli::BackupsCommand::Validate { path },
        }) => commands::backups::validate(&path, &cli.global),

        cmd => {
            let fleet = build_fleet(&cli.global)?;
            let cancel = CancellationToken::new();
            spawn_interrupt_handler(cancel.clone());

            tracing::debug!(command = ?cmd, apis = fleet.registry().len(), "dispatching command");
            commands::dispatch(cmd, &fleet, &cancel, &cli.global).await
        }
    }
}

/// First Ctrl-C cancels in-flight work; vendor writes stop at the next
/// device boundary.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current operation");
            cancel.cancel();
        }
    });
}

/// Load configuration and build every vendor client.
fn build_fleet(global: &GlobalOpts) -> Result<Fleet, CliError> {
    let path = global
        .config
        .clone()
        .unwrap_or_else(wifimgr_config::config_path);
    let mut config =
        wifimgr_config::load_config_from(&path).map_err(|e| CliError::config(&path, e))?;
    if let Some(timeout) = global.timeout {
        config.defaults.timeout = timeout;
        for profile in config.apis.values_mut() {
            profile.timeout = Some(timeout);
        }
    }
    if config.apis.is_empty() {
        return Err(CliError::NoApis {
            path: path.display().to_string(),
        });
    }

    let registry = config.build_registry(&FactoryTable::with_builtin());
    Ok(Fleet::from_parts(registry, config.fleet_config()))
}
