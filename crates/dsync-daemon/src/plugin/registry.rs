//! Plugin registry for built-in and dynamically loaded plugins

use super::{PluginError, PluginInit, SyncPlugin};
use std::collections::HashMap;
use std::sync::Arc;

/// A factory function that creates a plugin instance for one run
pub type PluginFactoryFn =
    Arc<dyn Fn(&PluginInit<'_>) -> Result<Box<dyn SyncPlugin>, PluginError> + Send + Sync>;

/// A named plugin constructor
#[derive(Clone)]
pub struct PluginFactory {
    /// Name pipelines refer to (e.g., "date_interval")
    pub name: String,
    /// Human-readable description
    pub description: String,
    pub create: PluginFactoryFn,
}

impl std::fmt::Debug for PluginFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginFactory")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("create", &"<factory_fn>")
            .finish()
    }
}

/// Registry of plugin factories keyed by name
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the plugins shipped in this crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for factory in crate::plugins::builtin_factories() {
            registry.register(factory);
        }
        registry
    }

    /// Register a factory. A factory with the same name is replaced.
    pub fn register(&mut self, factory: PluginFactory) {
        self.factories.insert(factory.name.clone(), factory);
    }

    /// Instantiate a plugin by name.
    ///
    /// # Errors
    ///
    /// `PluginError::Load` if the name is not registered or the factory fails.
    pub fn create(
        &self,
        name: &str,
        init: &PluginInit<'_>,
    ) -> Result<Box<dyn SyncPlugin>, PluginError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PluginError::load(format!("plugin '{name}' not registered")))?;
        (factory.create)(init)
    }

    /// Registered names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn get(&self, name: &str) -> Option<&PluginFactory> {
        self.factories.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
