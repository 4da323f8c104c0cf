//! layersyncd - periodic layer sync daemon
//!
//! Loads `settings.json` from the layersync config directory (or the file
//! given with `--settings`), registers the configured accounts and runs
//! their passes on a timer. `--once` runs every schedule a single time and
//! `--init` writes a default settings file to edit.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use layersync::settings::SETTINGS_FILE;
use layersync::{PassOutcome, SyncSettings};
use log::{error, info};

mod daemon;

use daemon::Daemon;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Run every schedule once and exit
    #[arg(long)]
    once: bool,

    /// Settings file to use instead of the config directory's settings.json
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Write a default settings.json to the config directory and exit
    #[arg(long, conflicts_with_all = ["once", "settings"])]
    init: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    if cli.init {
        return write_default_settings();
    }

    let settings = match &cli.settings {
        Some(path) => SyncSettings::from_file(path)?,
        None => SyncSettings::load()?,
    };
    info!(
        "Syncing authority {} for account type {}",
        settings.authority, settings.account_type
    );

    let daemon = Daemon::new(settings)?;

    if cli.once {
        let reports = daemon.run_once().await?;
        let finished = reports
            .iter()
            .filter(|r| r.outcome == PassOutcome::Finished)
            .count();
        info!("Ran {} passes, {} finished", reports.len(), finished);
        if let Some(at) = daemon.scheduler().last_sync_at()? {
            info!("Last successful sync at {}", at.to_rfc3339());
        }
        return Ok(());
    }

    info!("layersyncd started");
    Arc::new(daemon).run().await
}

fn write_default_settings() -> Result<()> {
    if config::config_exists(SETTINGS_FILE) {
        bail!("{} already exists, not overwriting it", SETTINGS_FILE);
    }
    SyncSettings::default().save()?;
    if let Some(path) = config::config_path(SETTINGS_FILE) {
        info!("Wrote default settings to {}", path.display());
    }
    Ok(())
}
