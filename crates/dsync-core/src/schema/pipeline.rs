use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque plugin configuration, handed to the plugin verbatim.
pub type PluginConfig = serde_json::Map<String, serde_json::Value>;

/// Stable pipeline identity. Never changes after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineId(Uuid);

impl PipelineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PipelineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PipelineId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Which way files flow for a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    LocalToDevice,
    DeviceToLocal,
    Bidirectional,
}

impl Direction {
    pub fn writes_to_device(self) -> bool {
        matches!(self, Direction::LocalToDevice | Direction::Bidirectional)
    }

    pub fn writes_to_local(self) -> bool {
        matches!(self, Direction::DeviceToLocal | Direction::Bidirectional)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::LocalToDevice => "local_to_device",
            Direction::DeviceToLocal => "device_to_local",
            Direction::Bidirectional => "bidirectional",
        };
        f.write_str(s)
    }
}

impl FromStr for Direction {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "local_to_device" | "push" | "up" => Ok(Direction::LocalToDevice),
            "device_to_local" | "pull" | "down" => Ok(Direction::DeviceToLocal),
            "bidirectional" | "both" => Ok(Direction::Bidirectional),
            other => Err(PipelineError::InvalidDirection(other.to_string())),
        }
    }
}

/// Pipeline validation and registry errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline name must not be empty")]
    EmptyName,

    #[error("local path must not be empty")]
    EmptyLocalPath,

    #[error("device path must not be empty")]
    EmptyDevicePath,

    #[error("modifiedWithinDays must be greater than zero")]
    InvalidTimeWindow,

    #[error("unknown direction '{0}' (expected local_to_device, device_to_local or bidirectional)")]
    InvalidDirection(String),

    #[error("pipeline not found: {0}")]
    NotFound(String),

    #[error("a pipeline named '{0}' already exists")]
    DuplicateName(String),

    #[error("pipeline persistence failed: {message}")]
    Persistence {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// A named sync task linking a host folder and a device folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub id: PipelineId,
    pub name: String,
    pub local_path: PathBuf,
    pub device_path: String,
    /// Empty means "whatever device is connected".
    #[serde(default)]
    pub device_serial: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_within_days: Option<u32>,
    #[serde(default)]
    pub auto_sync: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub plugin_config: PluginConfig,
    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl Pipeline {
    /// Check the schema invariants.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::EmptyName);
        }
        if self.local_path.as_os_str().is_empty() {
            return Err(PipelineError::EmptyLocalPath);
        }
        if self.device_path.trim().is_empty() {
            return Err(PipelineError::EmptyDevicePath);
        }
        if self.modified_within_days == Some(0) {
            return Err(PipelineError::InvalidTimeWindow);
        }
        Ok(())
    }

    /// Device root without a trailing slash (`/` stays `/`).
    pub fn device_root(&self) -> &str {
        let trimmed = self.device_path.trim_end_matches('/');
        if trimmed.is_empty() { "/" } else { trimmed }
    }

    /// True when this pipeline may run against `serial`.
    pub fn targets(&self, serial: &str) -> bool {
        self.device_serial.is_empty() || self.device_serial == serial
    }
}

/// Everything needed to create a pipeline; the id is assigned on insert.
#[derive(Debug, Clone, Default)]
pub struct NewPipeline {
    pub name: String,
    pub local_path: PathBuf,
    pub device_path: String,
    pub device_serial: String,
    pub direction: Direction,
    pub include_extensions: Vec<String>,
    pub exclude_extensions: Vec<String>,
    pub modified_within_days: Option<u32>,
    pub auto_sync: bool,
    pub plugin: Option<String>,
    pub plugin_config: PluginConfig,
}

impl NewPipeline {
    pub fn new(
        name: impl Into<String>,
        local_path: impl Into<PathBuf>,
        device_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            local_path: local_path.into(),
            device_path: device_path.into(),
            ..Default::default()
        }
    }

    pub fn into_pipeline(self) -> Pipeline {
        Pipeline {
            id: PipelineId::new(),
            name: self.name,
            local_path: self.local_path,
            device_path: self.device_path,
            device_serial: self.device_serial,
            direction: self.direction,
            include_extensions: self
                .include_extensions
                .iter()
                .filter_map(|e| normalize_extension(e))
                .collect(),
            exclude_extensions: self
                .exclude_extensions
                .iter()
                .filter_map(|e| normalize_extension(e))
                .collect(),
            modified_within_days: self.modified_within_days,
            auto_sync: self.auto_sync,
            plugin: self.plugin.filter(|p| !p.trim().is_empty()),
            plugin_config: self.plugin_config,
            unknown_fields: HashMap::new(),
        }
    }
}

/// Lowercase an extension and give it a leading dot. Blank input yields `None`.
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('*');
    if trimmed.is_empty() || trimmed == "." {
        return None;
    }
    let lower = trimmed.to_lowercase();
    if lower.starts_with('.') {
        Some(lower)
    } else {
        Some(format!(".{lower}"))
    }
}
