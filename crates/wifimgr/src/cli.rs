//! Clap derive structures for the `wifimgr` CLI.
//!
//! Only clap types live here; build.rs compiles this file on its own to
//! render man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// wifimgr -- declare WiFi fleet config once, apply it to any vendor
#[derive(Debug, Parser)]
#[command(
    name = "wifimgr",
    version,
    about = "Reconcile declared WiFi intent against vendor network APIs",
    long_about = "Keeps a local snapshot of every configured vendor API (Mist, Meraki, ...),\n\
        diffs per-site intent files against live device configuration, and applies\n\
        the changes with a backup of the intent taken before every write.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "WIFIMGR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "WIFIMGR_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Vendor request timeout in seconds (overrides the config file)
    #[arg(long, env = "WIFIMGR_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Managed device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceKind {
    Ap,
    Switch,
    Gateway,
}

/// Cache refresh before a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum RefreshChoice {
    /// Refresh a never-populated cache, or a stale one when auto-refresh is on
    #[default]
    Auto,
    /// Always refresh first
    Always,
    /// Work from the cached snapshot only
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List configured APIs with health and cache state
    Apis,

    /// Refresh cached vendor state
    Refresh(RefreshArgs),

    /// List or look up sites across every API
    Sites(SitesArgs),

    /// Show one device by MAC address
    #[command(alias = "dev")]
    Device(DeviceArgs),

    /// Show what apply would change for a site
    Diff(DiffArgs),

    /// Push intent changes for a site to its vendor
    Apply(ApplyArgs),

    /// Declare a site's unmanaged devices in its intent file
    Import(ImportArgs),

    /// Manage intent file backups
    Backups(BackupsArgs),

    /// Restore an intent file from a backup
    Rollback(RollbackArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Cache ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Refresh only this API (default: all)
    #[arg(long)]
    pub api: Option<String>,
}

#[derive(Debug, Args)]
pub struct SitesArgs {
    /// Exact site name to look up
    pub name: Option<String>,

    /// Restrict to one API
    #[arg(long)]
    pub api: Option<String>,
}

#[derive(Debug, Args)]
pub struct DeviceArgs {
    /// MAC address, any common spelling
    pub mac: String,

    /// Include the cached configuration
    #[arg(long)]
    pub show_config: bool,
}

// ── Diff / apply ─────────────────────────────────────────────────────

/// Arguments shared by diff, apply and import.
#[derive(Debug, Args)]
pub struct SiteTarget {
    /// Site name as declared in the intent
    pub site: String,

    /// Device family
    #[arg(value_enum)]
    pub device_type: DeviceKind,

    /// Target API (overrides the site's declared API)
    #[arg(long)]
    pub api: Option<String>,

    /// Cache refresh policy before diffing
    #[arg(long, value_enum, default_value_t = RefreshChoice::Auto)]
    pub refresh: RefreshChoice,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    #[command(flatten)]
    pub target: SiteTarget,

    /// Side-by-side rendering
    #[arg(long)]
    pub split: bool,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub target: SiteTarget,

    /// Write devices even when nothing differs
    #[arg(long)]
    pub force: bool,

    /// Show the diff and stop
    #[arg(long)]
    pub dry_run: bool,

    /// Side-by-side rendering
    #[arg(long)]
    pub split: bool,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub target: SiteTarget,
}

// ── Backups ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct BackupsArgs {
    #[command(subcommand)]
    pub command: BackupsCommand,
}

#[derive(Debug, Subcommand)]
pub enum BackupsCommand {
    /// List backups, optionally for one site
    #[command(alias = "ls")]
    List {
        /// Site name
        site: Option<String>,
    },

    /// Delete backups older than the retention window
    Cleanup {
        /// Retention window in days (default: from config)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Check that a backup file parses as a valid intent
    Validate {
        /// Backup file path
        path: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct RollbackArgs {
    /// Site name
    pub site: String,

    /// Backup serial to restore (0 is the most recent)
    #[arg(long, default_value_t = 0)]
    pub serial: u32,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
