//! Fixed conflict policy for bidirectional pipelines.

use crate::plugin::{PluginError, PluginFactory, PluginInit, SyncPlugin};
use droidsync_core::plan::ConflictDecision;
use droidsync_core::schema::{FileEntry, Pipeline};
use std::sync::Arc;

pub const NAME: &str = "prefer_side";

pub fn factory() -> PluginFactory {
    PluginFactory {
        name: NAME.to_string(),
        description: "Resolve every conflict the same way (config: prefer = local|remote|newer|skip)"
            .to_string(),
        create: Arc::new(|init| {
            let plugin = PreferSidePlugin::from_init(init)?;
            Ok(Box::new(plugin) as Box<dyn SyncPlugin>)
        }),
    }
}

/// The configured value is parsed per conflict; an unknown value leaves the
/// conflict unresolved.
#[derive(Debug, Clone)]
pub struct PreferSidePlugin {
    prefer: String,
}

impl PreferSidePlugin {
    pub fn new(prefer: impl Into<String>) -> Self {
        Self {
            prefer: prefer.into(),
        }
    }

    pub fn from_init(init: &PluginInit<'_>) -> Result<Self, PluginError> {
        let prefer: String = init
            .get("prefer")?
            .unwrap_or_else(|| "newer".to_string());
        Ok(Self::new(prefer))
    }
}

impl SyncPlugin for PreferSidePlugin {
    fn resolve_conflict(
        &self,
        _pipeline: &Pipeline,
        _local: &FileEntry,
        _remote: &FileEntry,
    ) -> Result<ConflictDecision, PluginError> {
        self.prefer
            .parse()
            .map_err(|_| PluginError::InvalidDecision {
                value: self.prefer.clone(),
            })
    }
}
