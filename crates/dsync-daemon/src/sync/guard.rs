use droidsync_core::schema::PipelineId;
use fs2::FileExt;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// Tracks which pipelines have a run in flight.
///
/// With a lock directory the exclusion also holds across processes: each
/// run takes an exclusive lock on `<dir>/<pipeline id>.lock`, so the CLI and
/// the daemon never run the same pipeline at once.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    running: Arc<Mutex<HashSet<PipelineId>>>,
    lock_dir: Option<PathBuf>,
}

/// Held for the duration of one run; releases the pipeline on drop.
#[derive(Debug)]
pub struct RunPermit {
    running: Arc<Mutex<HashSet<PipelineId>>>,
    id: PipelineId,
    lock_file: Option<File>,
}

fn lock(set: &Mutex<HashSet<PipelineId>>) -> MutexGuard<'_, HashSet<PipelineId>> {
    set.lock().unwrap_or_else(|e| e.into_inner())
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guard that also locks files under `dir`.
    pub fn with_lock_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            running: Arc::default(),
            lock_dir: Some(dir.into()),
        }
    }

    pub fn lock_dir(&self) -> Option<&Path> {
        self.lock_dir.as_deref()
    }

    /// `None` when a run for `id` is already in flight here or in another
    /// process sharing the lock directory.
    pub fn try_acquire(&self, id: PipelineId) -> Option<RunPermit> {
        if !lock(&self.running).insert(id) {
            return None;
        }

        let lock_file = match &self.lock_dir {
            Some(dir) => match lock_pipeline_file(dir, id) {
                Ok(Some(file)) => Some(file),
                Ok(None) => {
                    lock(&self.running).remove(&id);
                    return None;
                }
                // Fall back to in-process exclusion only
                Err(e) => {
                    warn!("Cannot lock pipeline {} in {}: {}", id, dir.display(), e);
                    None
                }
            },
            None => None,
        };

        Some(RunPermit {
            running: Arc::clone(&self.running),
            id,
            lock_file,
        })
    }

    /// Only reflects runs started through this guard.
    pub fn is_running(&self, id: PipelineId) -> bool {
        lock(&self.running).contains(&id)
    }
}

/// `Ok(None)` when another process holds the lock.
fn lock_pipeline_file(dir: &Path, id: PipelineId) -> std::io::Result<Option<File>> {
    std::fs::create_dir_all(dir)?;
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(dir.join(format!("{id}.lock")))?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(Some(file)),
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
        Err(e) => Err(e),
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        if let Some(file) = self.lock_file.take() {
            let _ = FileExt::unlock(&file);
        }
        lock(&self.running).remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let guard = RunGuard::new();
        let id = PipelineId::new();
        let other = PipelineId::new();

        let permit = guard.try_acquire(id).unwrap();
        assert!(guard.try_acquire(id).is_none());
        assert!(guard.try_acquire(other).is_some());
        assert!(guard.is_running(id));

        drop(permit);
        assert!(!guard.is_running(id));
        assert!(guard.try_acquire(id).is_some());
    }

    #[test]
    fn test_lock_file_excludes_other_guards() {
        let tmp = tempfile::TempDir::new().unwrap();
        let locks = tmp.path().join("locks");
        // Two guards stand in for the CLI and the daemon
        let cli = RunGuard::with_lock_dir(&locks);
        let daemon = RunGuard::with_lock_dir(&locks);
        let id = PipelineId::new();

        let permit = cli.try_acquire(id).unwrap();
        assert!(locks.join(format!("{id}.lock")).exists());
        assert!(daemon.try_acquire(id).is_none());
        assert!(!daemon.is_running(id));
        assert!(daemon.try_acquire(PipelineId::new()).is_some());

        drop(permit);
        assert!(daemon.try_acquire(id).is_some());
    }
}
