//! `updraft run` – apply pending updates, then hand off to the application.

use anyhow::{bail, Context, Result};
use std::io::Write;
use updraft_core::config::UpdaterConfig;
use updraft_core::transport::TransportOptions;
use updraft_core::{CurlTransport, Orchestrator, ProgressEvent, SettingsStore, UpdateEvent};

use crate::launch;

pub async fn run_update(cfg: &UpdaterConfig, store: SettingsStore, launch_after: bool) -> Result<()> {
    let orchestrator = Orchestrator::new(CurlTransport::new(TransportOptions::from(cfg)), store);

    let cancel = orchestrator.cancel_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling download");
            cancel.cancel();
        }
    });

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel::<UpdateEvent>();
    let printer = tokio::spawn(async move {
        let mut line_open = false;
        while let Some(event) = events_rx.recv().await {
            line_open = print_event(&event, line_open);
        }
        if line_open {
            println!();
        }
    });

    println!("Checking for updates...");
    let result = orchestrator.run_update_cycle(Some(&events_tx)).await;
    drop(events_tx);
    let _ = printer.await;
    ctrl_c.abort();

    let report = result.context("update cycle")?;
    if let Some((version, err)) = report.failure() {
        println!("Update failed. Please try again later");
        bail!("update to version {} failed: {}", version, err);
    }
    if report.outcomes.is_empty() {
        println!("Application is up to date (version {}).", report.settings.current_version);
    } else {
        println!("Updated to version {}.", report.settings.current_version);
    }

    if launch_after {
        let exe = orchestrator.store().resolve(&report.settings.main_executable_path);
        if let Some(child) = launch::launch(&exe)? {
            println!("Launching application...");
            tracing::info!(pid = child.id(), "launched application");
        }
    }
    Ok(())
}

/// Print one event. Progress redraws a single line in place; `line_open`
/// says whether that line still needs terminating. Returns the new state.
fn print_event(event: &UpdateEvent, line_open: bool) -> bool {
    if let UpdateEvent::Progress { progress, .. } = event {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r  {}  ", progress_line(progress));
        let _ = out.flush();
        return true;
    }
    if line_open {
        println!();
    }
    match event {
        UpdateEvent::Resolved { count } => {
            tracing::debug!(count, "updates pending");
        }
        UpdateEvent::Started { index, count, version } => {
            println!("Downloading update {} of {} (version {})", index, count, version);
        }
        UpdateEvent::Applied { version, path } => {
            println!("  version {} saved to {}", version, path.display());
        }
        UpdateEvent::Failed { version, reason } => {
            eprintln!("  version {} failed: {}", version, reason);
        }
        UpdateEvent::Progress { .. } => {}
    }
    false
}

fn progress_line(p: &ProgressEvent) -> String {
    let done_mib = p.bytes_transferred as f64 / 1_048_576.0;
    if p.is_indeterminate() {
        format!("{:.1} MiB", done_mib)
    } else {
        let total_mib = p.total_bytes as f64 / 1_048_576.0;
        format!("{:.1} / {:.1} MiB ({}%)", done_mib, total_mib, p.percent_complete)
    }
}
