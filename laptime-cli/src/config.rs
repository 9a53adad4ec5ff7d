//! Application configuration (laptime.toml)

use anyhow::{Context, Result};
use laptime_core::journal::DEFAULT_NOTIFY_ADDRESS;
use laptime_core::LockPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilesConfig {
    /// Race description (classes, persons, teams)
    #[serde(default = "default_race_file")]
    pub race: PathBuf,
    /// Shared event log
    #[serde(default = "default_log_file")]
    pub log: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            race: default_race_file(),
            log: default_log_file(),
        }
    }
}

fn default_race_file() -> PathBuf {
    PathBuf::from("race.toml")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("race.log")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LockConfig {
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl LockConfig {
    pub fn policy(&self) -> LockPolicy {
        LockPolicy::new(
            Duration::from_millis(self.timeout_ms),
            Duration::from_millis(self.poll_interval_ms),
        )
    }
}

fn default_timeout() -> u64 {
    3000
}

fn default_poll_interval() -> u64 {
    50
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifyConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            address: default_address(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_address() -> String {
    DEFAULT_NOTIFY_ADDRESS.to_string()
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    if config.lock.poll_interval_ms == 0 {
        anyhow::bail!("{:?}: lock.poll_interval_ms must be greater than zero", path);
    }

    Ok(config)
}
