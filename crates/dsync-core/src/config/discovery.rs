//! Configuration discovery and resolution

use super::types::Config;
use crate::home;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Explicit config path does not exist
    #[error("Configuration not found: {0}")]
    NotFound(PathBuf),
}

/// Command-line overrides for configuration
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Override bridge executable
    pub adb_path: Option<String>,
    /// Override pipeline file
    pub pipelines_file: Option<PathBuf>,
    /// Override poll interval
    pub poll_interval_secs: Option<u64>,
    /// Disable auto-sync for this process
    pub no_auto_sync: bool,
    /// Path to config file override
    pub config_path: Option<PathBuf>,
}

/// Resolve configuration from all sources
///
/// Priority (highest to lowest):
/// 1. Command-line overrides
/// 2. Environment variables (`DROIDSYNC_ADB`, `DROIDSYNC_POLL_SECS`)
/// 3. Global config (`<home>/.config/droidsync/config.toml`) or the explicit
///    `config_path` override
/// 4. Defaults
///
/// A malformed global file is logged and ignored. A malformed or missing
/// explicit config path is an error, since the user asked for it by name.
pub fn resolve_config(overrides: &ConfigOverrides, home_dir: &Path) -> Result<Config, ConfigError> {
    let mut config = match &overrides.config_path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.clone()));
            }
            load_config_file(path)?
        }
        None => {
            let global_config_path = home::config_dir(home_dir).join("config.toml");
            if global_config_path.exists() {
                match load_config_file(&global_config_path) {
                    Ok(file_config) => file_config,
                    Err(e) => {
                        warn!("Failed to parse global config at {global_config_path:?}: {e}");
                        Config::default()
                    }
                }
            } else {
                Config::default()
            }
        }
    };

    apply_env_overrides(&mut config);
    apply_cli_overrides(&mut config, overrides);

    Ok(config)
}

/// Load config from a TOML file
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

/// Apply environment variable overrides
fn apply_env_overrides(config: &mut Config) {
    if let Ok(adb) = std::env::var("DROIDSYNC_ADB") {
        if !adb.trim().is_empty() {
            config.core.adb_path = adb.trim().to_string();
        }
    }

    if let Ok(secs) = std::env::var("DROIDSYNC_POLL_SECS") {
        match secs.trim().parse::<u64>() {
            Ok(secs) => config.monitor.poll_interval_secs = secs,
            Err(_) => warn!("Ignoring DROIDSYNC_POLL_SECS={secs:?}: not a number"),
        }
    }
}

/// Apply command-line overrides
fn apply_cli_overrides(config: &mut Config, overrides: &ConfigOverrides) {
    if let Some(ref adb) = overrides.adb_path {
        config.core.adb_path = adb.clone();
    }

    if let Some(ref path) = overrides.pipelines_file {
        config.core.pipelines_file = Some(path.clone());
    }

    if let Some(secs) = overrides.poll_interval_secs {
        config.monitor.poll_interval_secs = secs;
    }

    if overrides.no_auto_sync {
        config.scheduler.enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    fn write_global(home: &Path, contents: &str) {
        let dir = home::config_dir(home);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), contents).unwrap();
    }

    fn clear_env() {
        unsafe {
            env::remove_var("DROIDSYNC_ADB");
            env::remove_var("DROIDSYNC_POLL_SECS");
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_files() {
        clear_env();
        let tmp = TempDir::new().unwrap();
        let config = resolve_config(&ConfigOverrides::default(), tmp.path()).unwrap();
        assert_eq!(config.core.adb_path, "adb");
        assert_eq!(config.monitor.poll_interval_secs, 5);
    }

    #[test]
    #[serial]
    fn test_global_file_is_read() {
        clear_env();
        let tmp = TempDir::new().unwrap();
        write_global(
            tmp.path(),
            r#"
            [core]
            adb_path = "/opt/platform-tools/adb"

            [monitor]
            poll_interval_secs = 2
            "#,
        );
        let config = resolve_config(&ConfigOverrides::default(), tmp.path()).unwrap();
        assert_eq!(config.core.adb_path, "/opt/platform-tools/adb");
        assert_eq!(config.monitor.poll_interval_secs, 2);
    }

    #[test]
    #[serial]
    fn test_malformed_global_file_falls_back_to_defaults() {
        clear_env();
        let tmp = TempDir::new().unwrap();
        write_global(tmp.path(), "[core\nadb_path = ");
        let config = resolve_config(&ConfigOverrides::default(), tmp.path()).unwrap();
        assert_eq!(config.core.adb_path, "adb");
    }

    #[test]
    #[serial]
    fn test_env_beats_file_and_cli_beats_env() {
        clear_env();
        let tmp = TempDir::new().unwrap();
        write_global(tmp.path(), "[monitor]\npoll_interval_secs = 2\n");

        unsafe {
            env::set_var("DROIDSYNC_POLL_SECS", "9");
            env::set_var("DROIDSYNC_ADB", "/env/adb");
        }
        let config = resolve_config(&ConfigOverrides::default(), tmp.path()).unwrap();
        assert_eq!(config.monitor.poll_interval_secs, 9);
        assert_eq!(config.core.adb_path, "/env/adb");

        let overrides = ConfigOverrides {
            adb_path: Some("/cli/adb".to_string()),
            poll_interval_secs: Some(1),
            no_auto_sync: true,
            ..Default::default()
        };
        let config = resolve_config(&overrides, tmp.path()).unwrap();
        assert_eq!(config.monitor.poll_interval_secs, 1);
        assert_eq!(config.core.adb_path, "/cli/adb");
        assert!(!config.scheduler.enabled);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_explicit_config_path_must_exist() {
        clear_env();
        let tmp = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            config_path: Some(tmp.path().join("missing.toml")),
            ..Default::default()
        };
        assert!(matches!(
            resolve_config(&overrides, tmp.path()),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    #[serial]
    fn test_explicit_config_path_parse_error_is_reported() {
        clear_env();
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        let overrides = ConfigOverrides {
            config_path: Some(path),
            ..Default::default()
        };
        assert!(matches!(
            resolve_config(&overrides, tmp.path()),
            Err(ConfigError::TomlParse(_))
        ));
    }
}
