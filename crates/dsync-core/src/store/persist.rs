use crate::schema::{Pipeline, PipelineError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Version written to the pipeline file.
pub const PIPELINE_FILE_VERSION: &str = "2.0";

/// Durable storage for the pipeline list.
pub trait PipelineRepository: Send + Sync {
    /// Load all pipelines. A missing store yields an empty list.
    fn load(&self) -> Result<Vec<Pipeline>, PipelineError>;

    /// Replace the stored list.
    fn save(&self, pipelines: &[Pipeline]) -> Result<(), PipelineError>;
}

/// On-disk document: `{"version": "2.0", "pipelines": [...]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineFile {
    pub version: String,
    #[serde(default)]
    pub pipelines: Vec<Pipeline>,
    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

/// JSON file repository with atomic replace.
#[derive(Debug, Clone)]
pub struct JsonPipelineFile {
    path: PathBuf,
}

impl JsonPipelineFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn persistence(
    message: String,
    source: impl std::error::Error + Send + Sync + 'static,
) -> PipelineError {
    PipelineError::Persistence {
        message,
        source: Some(Box::new(source)),
    }
}

impl PipelineRepository for JsonPipelineFile {
    fn load(&self) -> Result<Vec<Pipeline>, PipelineError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(persistence(
                    format!("failed to read {}", self.path.display()),
                    e,
                ));
            }
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let file: PipelineFile = serde_json::from_str(&contents)
            .map_err(|e| persistence(format!("failed to parse {}", self.path.display()), e))?;

        if file.version != PIPELINE_FILE_VERSION {
            tracing::warn!(
                "Pipeline file {} has version {}, expected {}",
                self.path.display(),
                file.version,
                PIPELINE_FILE_VERSION
            );
        }

        Ok(file.pipelines)
    }

    fn save(&self, pipelines: &[Pipeline]) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                persistence(format!("failed to create {}", parent.display()), e)
            })?;
        }

        let file = PipelineFile {
            version: PIPELINE_FILE_VERSION.to_string(),
            pipelines: pipelines.to_vec(),
            unknown_fields: HashMap::new(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| persistence("failed to serialize pipelines".to_string(), e))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| persistence(format!("failed to write {}", tmp.display()), e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            persistence(format!("failed to replace {}", self.path.display()), e)
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Direction, NewPipeline};
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let repo = JsonPipelineFile::new(tmp.path().join("pipelines.json"));
        assert!(repo.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_keeps_every_field() {
        let tmp = TempDir::new().unwrap();
        let repo = JsonPipelineFile::new(tmp.path().join("nested/pipelines.json"));

        let mut new = NewPipeline::new("Photos", "/home/me/Pictures", "/sdcard/DCIM");
        new.direction = Direction::Bidirectional;
        new.device_serial = "R58M123".to_string();
        new.exclude_extensions = vec![".tmp".to_string()];
        new.modified_within_days = Some(30);
        new.auto_sync = true;
        new.plugin = Some("date_interval".to_string());
        new.plugin_config
            .insert("interval_days".to_string(), serde_json::json!(10));
        let pipeline = new.into_pipeline();

        repo.save(std::slice::from_ref(&pipeline)).unwrap();
        let loaded = repo.load().unwrap();
        assert_eq!(loaded, vec![pipeline]);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(repo.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], "2.0");
        assert_eq!(raw["pipelines"][0]["deviceSerial"], "R58M123");
        assert!(!tmp.path().join("nested/pipelines.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_a_persistence_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pipelines.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonPipelineFile::new(path).load().unwrap_err();
        assert!(matches!(err, PipelineError::Persistence { .. }));
    }
}
