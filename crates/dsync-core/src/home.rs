//! Canonical home directory resolution for droidsync
//!
//! All crates resolve the config directory through this module so tests and
//! portable installs can redirect it with `DROIDSYNC_HOME`.
//!
//! # Precedence
//!
//! 1. `DROIDSYNC_HOME` environment variable (if set and non-empty)
//! 2. `dirs::home_dir()` platform default

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Get the home directory for droidsync operations
///
/// # Errors
///
/// Returns an error if `DROIDSYNC_HOME` is unset and the platform home
/// directory cannot be determined.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("DROIDSYNC_HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    dirs::home_dir().context("Could not determine home directory")
}

/// `<home>/.config/droidsync`
pub fn config_dir(home: &Path) -> PathBuf {
    home.join(".config").join("droidsync")
}

/// Default location of the pipeline file.
pub fn default_pipelines_file(home: &Path) -> PathBuf {
    config_dir(home).join("pipelines.json")
}

/// Default directory scanned for plugin libraries.
pub fn default_plugin_dir(home: &Path) -> PathBuf {
    config_dir(home).join("plugins")
}

/// Expand a leading `~/` against the resolved home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(stripped) = path.to_str().and_then(|s| s.strip_prefix("~/")) {
        if let Ok(home) = get_home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
