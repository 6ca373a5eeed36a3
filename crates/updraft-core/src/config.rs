use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// User-Agent sent when the config leaves it blank.
pub fn default_user_agent() -> String {
    format!("updraft/{}", env!("CARGO_PKG_VERSION"))
}

/// Updater tuning loaded from `~/.config/updraft/config.toml`.
///
/// This is the tool's own configuration. The installed application's version
/// record lives in [`crate::settings`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// User-Agent header sent on every request. Some hosts reject anonymous clients.
    pub user_agent: String,
    /// Seconds allowed for establishing a connection.
    pub connect_timeout_secs: u64,
    /// Abort a transfer slower than this many bytes per second...
    pub low_speed_limit_bytes: u32,
    /// ...for this many seconds.
    pub low_speed_time_secs: u64,
    /// Maximum redirects followed per request.
    pub max_redirections: u32,
    /// Settings file to use instead of `settings.json` in the working directory.
    pub settings_path: Option<PathBuf>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: 30,
            low_speed_limit_bytes: 1024,
            low_speed_time_secs: 60,
            max_redirections: 10,
            settings_path: None,
        }
    }
}

impl UpdaterConfig {
    /// Configured User-Agent, or the default when it is blank.
    pub fn effective_user_agent(&self) -> String {
        let ua = self.user_agent.trim();
        if ua.is_empty() {
            default_user_agent()
        } else {
            ua.to_string()
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("updraft")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<UpdaterConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = UpdaterConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit path. Missing keys take their defaults.
pub fn load_from_path(path: &Path) -> Result<UpdaterConfig> {
    let data = fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: UpdaterConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = UpdaterConfig::default();
        assert!(cfg.user_agent.starts_with("updraft/"));
        assert_eq!(cfg.connect_timeout_secs, 30);
        assert_eq!(cfg.low_speed_limit_bytes, 1024);
        assert_eq!(cfg.low_speed_time_secs, 60);
        assert_eq!(cfg.max_redirections, 10);
        assert!(cfg.settings_path.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut cfg = UpdaterConfig::default();
        cfg.settings_path = Some(PathBuf::from("/opt/app/settings.json"));
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: UpdaterConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.user_agent, cfg.user_agent);
        assert_eq!(parsed.settings_path, cfg.settings_path);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml = r#"
            user_agent = "launcher/1.0"
            connect_timeout_secs = 5
        "#;
        let cfg: UpdaterConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.user_agent, "launcher/1.0");
        assert_eq!(cfg.connect_timeout_secs, 5);
        assert_eq!(cfg.max_redirections, 10);
        assert!(cfg.settings_path.is_none());
    }

    #[test]
    fn blank_user_agent_falls_back() {
        let cfg: UpdaterConfig = toml::from_str("user_agent = \"\"").unwrap();
        assert_eq!(cfg.effective_user_agent(), default_user_agent());
    }

    #[test]
    fn load_from_path_reports_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "connect_timeout_secs = \"soon\"").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("parse config"));

        fs::write(&path, "settings_path = \"/srv/app/settings.json\"").unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.settings_path, Some(PathBuf::from("/srv/app/settings.json")));
    }
}
