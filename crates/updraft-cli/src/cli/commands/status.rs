//! `updraft status` – show the recorded settings.

use anyhow::{Context, Result};
use updraft_core::SettingsStore;

pub fn run_status(store: &SettingsStore) -> Result<()> {
    let settings = store
        .load()
        .with_context(|| format!("load settings {}", store.path().display()))?;
    let exe = if settings.main_executable_path.as_os_str().is_empty() {
        "-".to_string()
    } else {
        settings.main_executable_path.display().to_string()
    };
    println!("{:<16} {}", "settings", store.path().display());
    println!("{:<16} {}", "version", settings.current_version);
    println!("{:<16} {}", "manifest", settings.update_server_address);
    println!("{:<16} {}", "install path", settings.update_install_path.display());
    println!("{:<16} {}", "executable", exe);
    Ok(())
}
