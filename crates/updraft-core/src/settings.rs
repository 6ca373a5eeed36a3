//! Locally recorded application version and updater settings.
//!
//! Stored as a pretty-printed JSON object next to the installed application:
//!
//! ```json
//! {
//!   "CurrentVersion": 5,
//!   "UpdateServerAddress": "https://updates.example.com/manifest.json",
//!   "UpdateInstallPath": "updates",
//!   "MainExePath": "app.exe"
//! }
//! ```
//!
//! Every persist is a full rewrite through a temp file in the same directory
//! followed by a rename, so readers only ever see a complete record.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::UpdateError;

/// Default settings file name, resolved against the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

/// Settings owned by the installed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSettings {
    /// Version currently installed. Never decreases.
    #[serde(rename = "CurrentVersion")]
    pub current_version: u32,
    /// Manifest URL.
    #[serde(rename = "UpdateServerAddress")]
    pub update_server_address: String,
    /// Directory packages are downloaded into.
    #[serde(rename = "UpdateInstallPath")]
    pub update_install_path: PathBuf,
    /// Executable to launch after the cycle; empty means do not launch.
    #[serde(rename = "MainExePath", default)]
    pub main_executable_path: PathBuf,
}

/// File-backed store for [`ApplicationSettings`].
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a path from the record. Relative paths are taken from the
    /// directory holding the settings file, so `--settings elsewhere/settings.json`
    /// finds its packages and executable next to it.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match self.path.parent() {
            Some(dir) if path.is_relative() && !dir.as_os_str().is_empty() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Read and parse the settings file.
    pub fn load(&self) -> Result<ApplicationSettings, UpdateError> {
        let data = std::fs::read_to_string(&self.path)
            .map_err(|e| UpdateError::io("read settings", &self.path, e))?;
        serde_json::from_str(&data)
            .map_err(|e| UpdateError::parse(format!("settings {}", self.path.display()), e))
    }

    /// Replace the settings file with `settings`.
    pub fn persist(&self, settings: &ApplicationSettings) -> Result<(), UpdateError> {
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| UpdateError::parse("serialize settings", e))?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| UpdateError::io("create temp settings", &dir, e))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| UpdateError::io("write temp settings", tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| UpdateError::io("sync temp settings", tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| UpdateError::io("replace settings", &self.path, e.error))?;

        tracing::debug!(
            path = %self.path.display(),
            current_version = settings.current_version,
            "settings persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ApplicationSettings {
        ApplicationSettings {
            current_version: 5,
            update_server_address: "https://updates.example.com/manifest.json".into(),
            update_install_path: PathBuf::from("updates"),
            main_executable_path: PathBuf::from("app.exe"),
        }
    }

    #[test]
    fn relative_paths_resolve_next_to_settings_file() {
        let store = SettingsStore::new("/opt/app/settings.json");
        assert_eq!(store.resolve(Path::new("updates")), PathBuf::from("/opt/app/updates"));
        assert_eq!(store.resolve(Path::new("/var/updates")), PathBuf::from("/var/updates"));

        // Bare file name: relative to the working directory, unchanged.
        let local = SettingsStore::new(DEFAULT_SETTINGS_FILE);
        assert_eq!(local.resolve(Path::new("app.exe")), PathBuf::from("app.exe"));
        assert_eq!(
            SettingsStore::new("conf/settings.json").resolve(Path::new("bin/app")),
            PathBuf::from("conf/bin/app")
        );
    }

    #[test]
    fn persist_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        store.persist(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn persisted_file_uses_wire_names_and_is_pretty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        store.persist(&sample()).unwrap();
        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("\"CurrentVersion\": 5"));
        assert!(text.contains("\"UpdateServerAddress\""));
        assert!(text.contains("\"UpdateInstallPath\""));
        assert!(text.contains("\"MainExePath\""));
        assert!(text.lines().count() > 1);
    }

    #[test]
    fn persist_replaces_whole_record_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{\"CurrentVersion\": 1, \"Junk\": true, \"UpdateServerAddress\": \"x\", \"UpdateInstallPath\": \"y\"}")
            .unwrap();
        let store = SettingsStore::new(&path);
        let mut s = store.load().unwrap();
        assert!(s.main_executable_path.as_os_str().is_empty());
        s.current_version = 2;
        store.persist(&s).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("Junk"));
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.load().unwrap().current_version, 2);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nope.json"));
        assert!(store.load().unwrap_err().is_io());
    }

    #[test]
    fn load_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{\"CurrentVersion\": \"five\"}").unwrap();
        assert!(SettingsStore::new(&path).load().unwrap_err().is_parse());
    }
}
