use chrono::{DateTime, Utc};
use droidsync_core::schema::{Pipeline, PluginConfig};

/// Plugin errors with structured variants
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Plugin could not be found, loaded or constructed
    #[error("plugin load failed: {message}")]
    Load {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A hook returned an error
    #[error("plugin hook {hook} failed: {message}")]
    Hook {
        hook: &'static str,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Conflict hook produced something that is not a decision
    #[error("plugin returned an invalid conflict decision: '{value}'")]
    InvalidDecision { value: String },

    /// A hook panicked; the panic was contained
    #[error("plugin hook {hook} panicked: {message}")]
    Panicked { hook: &'static str, message: String },
}

impl PluginError {
    pub fn load(message: impl Into<String>) -> Self {
        PluginError::Load {
            message: message.into(),
            source: None,
        }
    }

    pub fn hook(hook: &'static str, message: impl Into<String>) -> Self {
        PluginError::Hook {
            hook,
            message: message.into(),
            source: None,
        }
    }
}

/// Everything a factory gets when a plugin is instantiated for one run.
#[derive(Debug, Clone, Copy)]
pub struct PluginInit<'a> {
    pub pipeline: &'a Pipeline,
    /// Pipeline `pluginConfig` merged over the `[plugins.<name>]` defaults
    pub config: &'a PluginConfig,
    /// Start of the run
    pub now: DateTime<Utc>,
}

impl PluginInit<'_> {
    /// Typed read of one config key. Missing keys yield `Ok(None)`.
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PluginError> {
        match self.config.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| PluginError::Load {
                    message: format!("invalid value for '{key}': {e}"),
                    source: Some(Box::new(e)),
                }),
        }
    }
}
