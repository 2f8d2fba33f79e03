//! Configuration types

use crate::home;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core configuration
    #[serde(default)]
    pub core: CoreConfig,
    /// Device polling
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Auto-sync scheduling
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Bridge command timeouts
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Plugin default configuration sections: [plugins.<name>]
    #[serde(default)]
    pub plugins: HashMap<String, toml::Table>,
}

impl Config {
    /// Pipeline file, falling back to `<home>/.config/droidsync/pipelines.json`.
    pub fn pipelines_file(&self, home_dir: &Path) -> PathBuf {
        match &self.core.pipelines_file {
            Some(path) => home::expand_tilde(path),
            None => home::default_pipelines_file(home_dir),
        }
    }

    /// Per-pipeline run locks shared by every process using the same
    /// pipeline file: `locks/` next to it.
    pub fn lock_dir(&self, home_dir: &Path) -> PathBuf {
        let pipelines_file = self.pipelines_file(home_dir);
        match pipelines_file.parent() {
            Some(parent) => parent.join("locks"),
            None => home::config_dir(home_dir).join("locks"),
        }
    }

    /// Directories scanned for plugin libraries. The default plugin dir is
    /// always last.
    pub fn plugin_dirs(&self, home_dir: &Path) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .core
            .plugin_dirs
            .iter()
            .map(|p| home::expand_tilde(p))
            .collect();
        let default_dir = home::default_plugin_dir(home_dir);
        if !dirs.contains(&default_dir) {
            dirs.push(default_dir);
        }
        dirs
    }
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Bridge executable, resolved through PATH when not absolute
    #[serde(default = "default_adb_path")]
    pub adb_path: String,
    /// Pipeline file override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipelines_file: Option<PathBuf>,
    /// Extra plugin library directories
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugin_dirs: Vec<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            adb_path: default_adb_path(),
            pipelines_file: None,
            plugin_dirs: Vec::new(),
        }
    }
}

fn default_adb_path() -> String {
    "adb".to_string()
}

/// Device monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between device polls (default: 5)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

fn default_poll_interval_secs() -> u64 {
    5
}

/// Auto-sync scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minimum seconds between two auto-syncs of one pipeline (default: 1800)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Run auto-sync pipelines on device connect (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            enabled: true,
        }
    }
}

impl SchedulerConfig {
    pub fn cooldown(&self) -> chrono::Duration {
        i64::try_from(self.cooldown_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

fn default_cooldown_secs() -> u64 {
    1800
}

fn default_true() -> bool {
    true
}

/// Bridge timeouts, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Short commands: devices, mkdir, stat, rm (default: 10)
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Recursive listings (default: 30)
    #[serde(default = "default_list_timeout_secs")]
    pub list_timeout_secs: u64,
    /// Single push or pull (default: 300)
    #[serde(default = "default_transfer_timeout_secs")]
    pub transfer_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout_secs(),
            list_timeout_secs: default_list_timeout_secs(),
            transfer_timeout_secs: default_transfer_timeout_secs(),
        }
    }
}

fn default_command_timeout_secs() -> u64 {
    10
}

fn default_list_timeout_secs() -> u64 {
    30
}

fn default_transfer_timeout_secs() -> u64 {
    300
}
