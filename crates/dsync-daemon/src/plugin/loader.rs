//! Dynamic library loading for external plugins

use super::PluginError;
use super::registry::PluginFactory;
use libloading::{Library, Symbol};
use std::path::Path;
use tracing::{debug, warn};

/// Symbol every plugin library must export
pub const FACTORY_SYMBOL: &str = "droidsync_create_plugin_factory";

/// Loader for plugin libraries (.dylib/.so/.dll)
///
/// Each library exports a C-ABI function `droidsync_create_plugin_factory`
/// returning a `Box::into_raw`-allocated [`PluginFactory`]. Libraries must be
/// built with the same compiler and crate versions as the host.
pub struct PluginLoader {
    /// Keep loaded libraries alive (they must not be dropped while factories exist)
    #[allow(dead_code)]
    libraries: Vec<Library>,
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader")
            .field("libraries", &self.libraries.len())
            .finish()
    }
}

impl PluginLoader {
    pub fn new() -> Self {
        Self {
            libraries: Vec::new(),
        }
    }

    /// Scan a directory and load every plugin library in it.
    ///
    /// A missing directory yields no factories. Failures for individual
    /// libraries are logged and skipped.
    ///
    /// # Errors
    ///
    /// `PluginError::Load` if the path is not a directory or cannot be read.
    pub fn load_from_directory(&mut self, dir: &Path) -> Result<Vec<PluginFactory>, PluginError> {
        if !dir.exists() {
            debug!("Plugin directory does not exist, skipping: {}", dir.display());
            return Ok(Vec::new());
        }

        if !dir.is_dir() {
            return Err(PluginError::load(format!(
                "plugin path is not a directory: {}",
                dir.display()
            )));
        }

        let entries = std::fs::read_dir(dir).map_err(|e| PluginError::Load {
            message: format!("failed to read plugin directory: {}", dir.display()),
            source: Some(Box::new(e)),
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| match entry {
                Ok(e) => Some(e.path()),
                Err(e) => {
                    warn!("Failed to read directory entry: {}", e);
                    None
                }
            })
            .filter(|path| Self::is_plugin_library(path))
            .collect();
        paths.sort();

        let mut factories = Vec::new();
        for path in paths {
            match self.load_library(&path) {
                Ok(factory) => {
                    debug!("Loaded plugin '{}' from {}", factory.name, path.display());
                    factories.push(factory);
                }
                Err(e) => warn!("Failed to load plugin from {}: {}", path.display(), e),
            }
        }

        Ok(factories)
    }

    fn load_library(&mut self, path: &Path) -> Result<PluginFactory, PluginError> {
        // Safety: loading a library runs its initializers; plugin directories
        // are trusted the same way the host binary is.
        let lib = unsafe {
            Library::new(path).map_err(|e| PluginError::Load {
                message: format!("failed to load library: {}", path.display()),
                source: Some(Box::new(e)),
            })?
        };

        // Safety: the exported function must have exactly this signature.
        let factory = unsafe {
            let symbol: Symbol<extern "C" fn() -> *mut PluginFactory> = lib
                .get(FACTORY_SYMBOL.as_bytes())
                .map_err(|e| PluginError::Load {
                    message: format!(
                        "library missing '{FACTORY_SYMBOL}' symbol: {}",
                        path.display()
                    ),
                    source: Some(Box::new(e)),
                })?;

            let factory_ptr = symbol();
            if factory_ptr.is_null() {
                return Err(PluginError::load(format!(
                    "factory function returned null: {}",
                    path.display()
                )));
            }

            // Allocated by the library with Box::into_raw
            Box::from_raw(factory_ptr)
        };

        self.libraries.push(lib);

        Ok(*factory)
    }

    fn is_plugin_library(path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }

        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("dylib") | Some("so") | Some("dll")
        )
    }

    /// Number of libraries held open
    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}
