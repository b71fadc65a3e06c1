use crate::error::{Result, WatchError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Runtime settings, loaded from `config.toml` next to the binary.
/// Every field has a default so a missing file yields a working config.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Hours between batch checks of all monitored users.
    #[serde(default = "default_check_interval_hours")]
    pub check_interval_hours: u64,
    /// Seconds to wait between consecutive users within one batch.
    /// 30s or more keeps us within the site's acceptable-use expectations.
    #[serde(default = "default_access_interval_seconds")]
    pub access_interval_seconds: u64,
    /// Where change notifications go. None disables the batch loop.
    #[serde(default)]
    pub notification_target: Option<String>,
    /// Directory holding users.json and previous_data.json.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory for per-fetch debug screenshots.
    #[serde(default = "default_screenshots_dir")]
    pub screenshots_dir: PathBuf,
}

fn default_check_interval_hours() -> u64 {
    6
}

fn default_access_interval_seconds() -> u64 {
    30
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_screenshots_dir() -> PathBuf {
    PathBuf::from("screenshots")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_interval_hours: default_check_interval_hours(),
            access_interval_seconds: default_access_interval_seconds(),
            notification_target: None,
            data_dir: default_data_dir(),
            screenshots_dir: default_screenshots_dir(),
        }
    }
}

impl Config {
    /// Loads config from `CALWATCH_CONFIG` if set, else `config.toml`.
    /// A missing file is not an error; a malformed one is.
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("CALWATCH_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(Path::new(&config_path))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            WatchError::Config(format!("failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
