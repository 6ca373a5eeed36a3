//! `updraft check` – list pending updates without downloading.

use anyhow::{Context, Result};
use updraft_core::config::UpdaterConfig;
use updraft_core::transport::TransportOptions;
use updraft_core::{CurlTransport, Orchestrator, SettingsStore};

pub async fn run_check(cfg: &UpdaterConfig, store: SettingsStore) -> Result<()> {
    let orchestrator = Orchestrator::new(CurlTransport::new(TransportOptions::from(cfg)), store);
    let (settings, queue) = orchestrator
        .pending_updates()
        .await
        .context("check for updates")?;

    println!("Installed version {}.", settings.current_version);
    if queue.is_empty() {
        println!("No updates available.");
        return Ok(());
    }
    println!("{:<8} {:<8} {}", "VERSION", "FROM", "URL");
    for d in &queue {
        println!("{:<8} {:<8} {}", d.version, d.minimum_version, d.file_address);
    }
    Ok(())
}
