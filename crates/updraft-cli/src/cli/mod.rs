//! CLI for the updraft self-updater.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use updraft_core::config::{self, UpdaterConfig};
use updraft_core::settings::DEFAULT_SETTINGS_FILE;
use updraft_core::SettingsStore;

use commands::{run_check, run_checksum, run_status, run_update};

/// Top-level CLI for the updraft self-updater.
#[derive(Debug, Parser)]
#[command(name = "updraft")]
#[command(about = "updraft: sequential self-updater for installed applications", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download and apply every pending update, then launch the application.
    Run {
        /// Settings file (default: config `settings_path`, else ./settings.json).
        /// Relative paths inside it are taken from the file's directory.
        #[arg(long, value_name = "PATH")]
        settings: Option<PathBuf>,
        /// Do not start the application after updating.
        #[arg(long)]
        no_launch: bool,
    },

    /// List updates that would be applied, without downloading.
    Check {
        #[arg(long, value_name = "PATH")]
        settings: Option<PathBuf>,
    },

    /// Show the recorded version and update settings.
    Status {
        #[arg(long, value_name = "PATH")]
        settings: Option<PathBuf>,
    },

    /// Compute MD5 and SHA-256 of a file (e.g. to fill in a manifest entry).
    Checksum {
        /// Path to the file.
        path: String,
    },
}

/// Settings file to use: `--settings`, then the config override, then the default.
pub(crate) fn settings_store(flag: Option<PathBuf>, cfg: &UpdaterConfig) -> SettingsStore {
    let path = flag
        .or_else(|| cfg.settings_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    SettingsStore::new(path)
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                settings,
                no_launch,
            } => run_update(&cfg, settings_store(settings, &cfg), !no_launch).await?,
            CliCommand::Check { settings } => run_check(&cfg, settings_store(settings, &cfg)).await?,
            CliCommand::Status { settings } => run_status(&settings_store(settings, &cfg))?,
            CliCommand::Checksum { path } => run_checksum(Path::new(&path)).await?,
        }

        Ok(())
    }
}
