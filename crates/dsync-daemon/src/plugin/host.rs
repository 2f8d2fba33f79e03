//! Plugin resolution and hook isolation for a single run

use super::loader::PluginLoader;
use super::registry::PluginRegistry;
use super::{PluginError, PluginInit, SyncPlugin};
use chrono::{DateTime, Utc};
use droidsync_core::config::Config;
use droidsync_core::plan::{ConflictDecision, PlanHooks};
use droidsync_core::schema::{FileEntry, Pipeline, PluginConfig, Side};
use droidsync_core::RunResult;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

/// Owns the plugin registry and the libraries backing it.
///
/// Plugins are resolved by name each time a run starts, so a pipeline edited
/// to use a different plugin picks it up on the next run.
#[derive(Debug, Default)]
pub struct PluginHost {
    registry: PluginRegistry,
    /// `[plugins.<name>]` tables from the config file
    defaults: HashMap<String, PluginConfig>,
    // Declared last so libraries unload after the factories they back
    loader: PluginLoader,
}

impl PluginHost {
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            registry,
            defaults: HashMap::new(),
            loader: PluginLoader::new(),
        }
    }

    /// Built-ins plus every library found in the configured plugin
    /// directories, with config defaults from `[plugins.<name>]`.
    pub fn from_config(config: &Config, home_dir: &Path) -> Self {
        let mut host = Self::new(PluginRegistry::with_builtins());

        for dir in config.plugin_dirs(home_dir) {
            match host.loader.load_from_directory(&dir) {
                Ok(factories) => {
                    for factory in factories {
                        info!("Registered plugin '{}' from {}", factory.name, dir.display());
                        host.registry.register(factory);
                    }
                }
                Err(e) => warn!("Skipping plugin directory {}: {}", dir.display(), e),
            }
        }

        for (name, table) in &config.plugins {
            match serde_json::to_value(table) {
                Ok(serde_json::Value::Object(map)) => host.set_defaults(name, map),
                Ok(_) => {}
                Err(e) => warn!("Ignoring [plugins.{}] config: {}", name, e),
            }
        }

        host
    }

    /// Default config for `name`; pipeline keys win over these.
    pub fn set_defaults(&mut self, name: &str, config: PluginConfig) {
        self.defaults.insert(name.to_string(), config);
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Instantiate the pipeline's plugin for one run.
    ///
    /// Never fails: an unknown name, a failing factory or a panicking one
    /// yields an inactive plugin carrying the error.
    pub fn activate(&self, pipeline: &Pipeline, now: DateTime<Utc>) -> ActivePlugin {
        let Some(name) = pipeline.plugin.as_deref().filter(|n| !n.is_empty()) else {
            return ActivePlugin::none();
        };

        let mut config = self.defaults.get(name).cloned().unwrap_or_default();
        for (key, value) in &pipeline.plugin_config {
            config.insert(key.clone(), value.clone());
        }

        let init = PluginInit {
            pipeline,
            config: &config,
            now,
        };
        let created = catch_unwind(AssertUnwindSafe(|| self.registry.create(name, &init)))
            .unwrap_or_else(|payload| {
                Err(PluginError::Panicked {
                    hook: "create",
                    message: panic_message(payload.as_ref()),
                })
            });

        match created {
            Ok(plugin) => ActivePlugin {
                name: Some(name.to_string()),
                plugin: Some(plugin),
                errors: Mutex::default(),
            },
            Err(e) => {
                warn!(
                    "Pipeline '{}' runs without plugin '{}': {}",
                    pipeline.name, name, e
                );
                ActivePlugin {
                    name: Some(name.to_string()),
                    plugin: None,
                    errors: Mutex::new(vec![e]),
                }
            }
        }
    }
}

/// A plugin instance bound to one run.
///
/// Every hook call is isolated: an error or panic is recorded and the
/// neutral answer is used instead.
#[derive(Default)]
pub struct ActivePlugin {
    name: Option<String>,
    plugin: Option<Box<dyn SyncPlugin>>,
    errors: Mutex<Vec<PluginError>>,
}

impl std::fmt::Debug for ActivePlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivePlugin")
            .field("name", &self.name)
            .field("loaded", &self.plugin.is_some())
            .finish()
    }
}

impl ActivePlugin {
    /// No plugin configured.
    pub fn none() -> Self {
        Self::default()
    }

    /// Wrap an already constructed plugin.
    pub fn new(name: impl Into<String>, plugin: Box<dyn SyncPlugin>) -> Self {
        Self {
            name: Some(name.into()),
            plugin: Some(plugin),
            errors: Mutex::default(),
        }
    }

    /// Configured plugin name, even when it failed to load.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.plugin.is_some()
    }

    fn record(&self, error: PluginError) {
        warn!(
            "Plugin '{}': {}",
            self.name.as_deref().unwrap_or("?"),
            error
        );
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(error);
    }

    /// Run a hook with error and panic isolation.
    fn call<T>(
        &self,
        hook: &'static str,
        f: impl FnOnce(&dyn SyncPlugin) -> Result<T, PluginError>,
    ) -> Option<T> {
        let plugin = self.plugin.as_deref()?;
        match catch_unwind(AssertUnwindSafe(|| f(plugin))) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                self.record(e);
                None
            }
            Err(payload) => {
                self.record(PluginError::Panicked {
                    hook,
                    message: panic_message(payload.as_ref()),
                });
                None
            }
        }
    }

    pub fn before_sync(&self, pipeline: &Pipeline) {
        self.call("before_sync", |p| p.before_sync(pipeline));
    }

    pub fn after_sync(&self, pipeline: &Pipeline, result: &RunResult) {
        self.call("after_sync", |p| p.after_sync(pipeline, result));
    }

    /// Errors recorded so far, prefixed with the plugin name.
    pub fn take_errors(&self) -> Vec<String> {
        let errors = std::mem::take(&mut *self.errors.lock().unwrap_or_else(|e| e.into_inner()));
        let name = self.name.as_deref().unwrap_or("plugin");
        errors.into_iter().map(|e| format!("{name}: {e}")).collect()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl PlanHooks for ActivePlugin {
    fn rewrite_path(&self, pipeline: &Pipeline, side: Side, entry: &FileEntry) -> String {
        self.call("rewrite_path", |p| p.rewrite_path(pipeline, side, entry))
            .flatten()
            .unwrap_or_else(|| entry.relative_path.clone())
    }

    fn accept_entry(&self, pipeline: &Pipeline, side: Side, entry: &FileEntry) -> bool {
        self.call("filter_entry", |p| p.filter_entry(pipeline, side, entry))
            .unwrap_or(true)
    }

    fn resolve_conflict(
        &self,
        pipeline: &Pipeline,
        local: &FileEntry,
        remote: &FileEntry,
    ) -> Option<ConflictDecision> {
        let Some(plugin) = self.plugin.as_deref() else {
            return Some(ConflictDecision::PreferNewer);
        };
        match catch_unwind(AssertUnwindSafe(|| {
            plugin.resolve_conflict(pipeline, local, remote)
        })) {
            Ok(Ok(decision)) => Some(decision),
            // No usable decision: leave both copies alone
            Ok(Err(e @ PluginError::InvalidDecision { .. })) => {
                self.record(e);
                None
            }
            Ok(Err(e)) => {
                self.record(e);
                Some(ConflictDecision::PreferNewer)
            }
            Err(payload) => {
                self.record(PluginError::Panicked {
                    hook: "resolve_conflict",
                    message: panic_message(payload.as_ref()),
                });
                Some(ConflictDecision::PreferNewer)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
