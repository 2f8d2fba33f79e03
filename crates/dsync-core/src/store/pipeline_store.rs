use super::persist::PipelineRepository;
use crate::schema::{NewPipeline, Pipeline, PipelineError, PipelineId};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// In-memory pipeline registry.
///
/// Readers get `Arc<Pipeline>` snapshots. Edits swap in a new `Arc`, so a
/// sync already running against a snapshot never sees a half-edited pipeline.
/// When a repository is attached every mutation is written through before it
/// becomes visible; a failed write leaves the registry unchanged.
pub struct PipelineStore {
    pipelines: RwLock<Vec<Arc<Pipeline>>>,
    repository: Option<Box<dyn PipelineRepository>>,
}

impl Default for PipelineStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PipelineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineStore")
            .field("pipelines", &self.read().len())
            .field("persistent", &self.repository.is_some())
            .finish()
    }
}

impl PipelineStore {
    /// Empty store with no persistence.
    pub fn new() -> Self {
        Self {
            pipelines: RwLock::new(Vec::new()),
            repository: None,
        }
    }

    /// Load every pipeline from `repository` and write through to it from now on.
    ///
    /// Invalid stored pipelines are kept; they fail at run time instead of
    /// disappearing from the file.
    pub fn open(repository: Box<dyn PipelineRepository>) -> Result<Self, PipelineError> {
        let loaded = repository.load()?;
        for pipeline in &loaded {
            if let Err(e) = pipeline.validate() {
                tracing::warn!("Stored pipeline '{}' is invalid: {}", pipeline.name, e);
            }
        }
        info!("Loaded {} pipeline(s)", loaded.len());
        Ok(Self {
            pipelines: RwLock::new(loaded.into_iter().map(Arc::new).collect()),
            repository: Some(repository),
        })
    }

    /// Replace the in-memory list with what the repository holds now.
    ///
    /// Picks up edits made by another process sharing the same file. Without
    /// a repository this is a no-op. Returns the number of pipelines.
    pub fn reload(&self) -> Result<usize, PipelineError> {
        let Some(repo) = &self.repository else {
            return Ok(self.len());
        };
        let loaded = repo.load()?;
        let mut guard = self.write();
        *guard = loaded.into_iter().map(Arc::new).collect();
        debug!("Reloaded {} pipeline(s)", guard.len());
        Ok(guard.len())
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<Pipeline>>> {
        self.pipelines.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<Pipeline>>> {
        self.pipelines.write().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, pipelines: &[Arc<Pipeline>]) -> Result<(), PipelineError> {
        if let Some(repo) = &self.repository {
            let owned: Vec<Pipeline> = pipelines.iter().map(|p| (**p).clone()).collect();
            repo.save(&owned)?;
        }
        Ok(())
    }

    /// Validate and insert a new pipeline. Names are unique.
    pub fn add(&self, new: NewPipeline) -> Result<Arc<Pipeline>, PipelineError> {
        let pipeline = new.into_pipeline();
        pipeline.validate()?;

        let mut guard = self.write();
        if guard.iter().any(|p| p.name == pipeline.name) {
            return Err(PipelineError::DuplicateName(pipeline.name));
        }

        let pipeline = Arc::new(pipeline);
        let mut next = guard.clone();
        next.push(Arc::clone(&pipeline));
        self.persist(&next)?;
        *guard = next;

        info!("Added pipeline '{}' ({})", pipeline.name, pipeline.id);
        Ok(pipeline)
    }

    pub fn get(&self, id: PipelineId) -> Option<Arc<Pipeline>> {
        self.read().iter().find(|p| p.id == id).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<Pipeline>> {
        self.read().iter().find(|p| p.name == name).cloned()
    }

    /// Look up by id string first, then by name.
    pub fn resolve(&self, id_or_name: &str) -> Option<Arc<Pipeline>> {
        if let Ok(id) = id_or_name.parse::<PipelineId>() {
            if let Some(p) = self.get(id) {
                return Some(p);
            }
        }
        self.find_by_name(id_or_name)
    }

    /// Snapshot of all pipelines in insertion order.
    pub fn list(&self) -> Vec<Arc<Pipeline>> {
        self.read().clone()
    }

    /// Auto-sync pipelines that may run against `serial`, in store order.
    pub fn auto_sync_candidates(&self, serial: &str) -> Vec<Arc<Pipeline>> {
        self.read()
            .iter()
            .filter(|p| p.auto_sync && p.targets(serial))
            .cloned()
            .collect()
    }

    /// Replace the pipeline with the same id.
    pub fn update(&self, pipeline: Pipeline) -> Result<Arc<Pipeline>, PipelineError> {
        pipeline.validate()?;
        self.replace(pipeline.id, |_| Ok(pipeline))
    }

    pub fn set_auto_sync(&self, id: PipelineId, enabled: bool) -> Result<Arc<Pipeline>, PipelineError> {
        self.replace(id, |current| {
            let mut next = current.clone();
            next.auto_sync = enabled;
            Ok(next)
        })
    }

    fn replace<F>(&self, id: PipelineId, edit: F) -> Result<Arc<Pipeline>, PipelineError>
    where
        F: FnOnce(&Pipeline) -> Result<Pipeline, PipelineError>,
    {
        let mut guard = self.write();
        let index = guard
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))?;

        let updated = edit(&guard[index])?;
        if guard
            .iter()
            .any(|p| p.id != id && p.name == updated.name)
        {
            return Err(PipelineError::DuplicateName(updated.name));
        }

        let updated = Arc::new(updated);
        let mut next = guard.clone();
        next[index] = Arc::clone(&updated);
        self.persist(&next)?;
        *guard = next;
        Ok(updated)
    }

    /// Remove and return the pipeline.
    pub fn remove(&self, id: PipelineId) -> Result<Arc<Pipeline>, PipelineError> {
        let mut guard = self.write();
        let index = guard
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))?;

        let mut next = guard.clone();
        let removed = next.remove(index);
        self.persist(&next)?;
        *guard = next;

        info!("Removed pipeline '{}' ({})", removed.name, removed.id);
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
