//! Plugin system: the hook trait, the registry of factories, dynamic
//! library loading and per-run isolation.

mod host;
mod loader;
mod registry;
mod traits;
mod types;

pub use host::{ActivePlugin, PluginHost};
pub use loader::{FACTORY_SYMBOL, PluginLoader};
pub use registry::{PluginFactory, PluginFactoryFn, PluginRegistry};
pub use traits::SyncPlugin;
pub use types::{PluginError, PluginInit};
