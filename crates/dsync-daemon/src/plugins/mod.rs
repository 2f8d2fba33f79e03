//! Built-in plugins

pub mod date_interval;
pub mod prefer_side;

use crate::plugin::PluginFactory;

/// Factories registered by `PluginRegistry::with_builtins`.
pub fn builtin_factories() -> Vec<PluginFactory> {
    vec![date_interval::factory(), prefer_side::factory()]
}
