//! Hand off to the installed application.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// Start `exe` as an independent process and return it, or `None` when `exe`
/// is empty. The child runs in the executable's directory with no stdio of
/// ours attached.
pub fn launch(exe: &Path) -> Result<Option<Child>> {
    if exe.as_os_str().is_empty() {
        tracing::debug!("no executable configured, skipping launch");
        return Ok(None);
    }
    let exe = if exe.is_relative() {
        std::env::current_dir()
            .context("resolve working directory")?
            .join(exe)
    } else {
        exe.to_path_buf()
    };

    let mut cmd = Command::new(&exe);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if let Some(dir) = exe.parent() {
        cmd.current_dir(dir);
    }
    let child = cmd
        .spawn()
        .with_context(|| format!("launch {}", exe.display()))?;
    tracing::info!(exe = %exe.display(), "application started");
    Ok(Some(child))
}
