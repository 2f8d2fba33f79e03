//! Traced front end over a [`Bridge`]

use super::adb::AdbBridge;
use super::error::{BridgeError, Result};
use super::transport::Bridge;
use droidsync_core::config::BridgeConfig;
use droidsync_core::local;
use droidsync_core::schema::FileEntry;
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, debug_span};
use uuid::Uuid;

/// Device directories already created during one run.
///
/// Never shared between runs: a directory removed on the device between runs
/// must be created again.
#[derive(Debug, Default, Clone)]
pub struct RemoteDirCache {
    created: HashSet<String>,
}

impl RemoteDirCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.created.contains(path)
    }

    /// Mark `path` and all of its ancestors as existing.
    fn insert_with_parents(&mut self, path: &str) {
        let mut end = path.len();
        loop {
            let dir = &path[..end];
            if dir.is_empty() || !self.created.insert(dir.to_string()) {
                break;
            }
            match dir.rfind('/') {
                Some(i) => end = i,
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.created.len()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }
}

/// Entry point for all device and host file operations during a sync.
///
/// Each bridge call runs inside a `bridge` span carrying a fresh correlation
/// id and ends with one event recording the command, its duration and status.
#[derive(Clone)]
pub struct BridgeClient {
    bridge: Arc<dyn Bridge>,
}

impl std::fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeClient")
            .field("bridge", &"<dyn Bridge>")
            .finish()
    }
}

impl BridgeClient {
    pub fn new(bridge: Arc<dyn Bridge>) -> Self {
        Self { bridge }
    }

    /// Client over the real `adb` executable.
    pub fn adb(adb_path: impl Into<String>, config: &BridgeConfig) -> Self {
        Self::new(Arc::new(AdbBridge::new(adb_path, config)))
    }

    async fn traced<T, F>(&self, command: &'static str, path: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let correlation_id = Uuid::new_v4();
        let span = debug_span!("bridge", %correlation_id, command);
        async move {
            let started = Instant::now();
            let result = call.await;
            let duration_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok(_) => debug!(command, path, duration_ms, status = "ok", "bridge call"),
                Err(e) => debug!(
                    command,
                    path,
                    duration_ms,
                    status = "error",
                    error = %e,
                    "bridge call"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    pub async fn list_devices(&self) -> Result<Vec<String>> {
        self.traced("devices", "", self.bridge.list_devices()).await
    }

    pub async fn list_remote(&self, serial: &str, root: &str) -> Result<Vec<FileEntry>> {
        self.traced("list", root, self.bridge.list_remote(serial, root))
            .await
    }

    pub async fn stat_remote(&self, serial: &str, path: &str) -> Result<Option<FileEntry>> {
        self.traced("stat", path, self.bridge.stat_remote(serial, path))
            .await
    }

    pub async fn push(&self, serial: &str, local: &Path, remote: &str) -> Result<()> {
        self.traced("push", remote, self.bridge.push(serial, local, remote))
            .await
    }

    pub async fn pull(&self, serial: &str, remote: &str, local: &Path) -> Result<()> {
        self.traced("pull", remote, self.bridge.pull(serial, remote, local))
            .await
    }

    pub async fn remove_remote(&self, serial: &str, path: &str) -> Result<()> {
        self.traced("rm", path, self.bridge.remove_remote(serial, path))
            .await
    }

    /// Create every directory in `paths` that this run has not created yet,
    /// in a single bridge invocation.
    ///
    /// Returns how many paths were sent to the device.
    pub async fn ensure_remote_dirs(
        &self,
        serial: &str,
        paths: &[String],
        cache: &mut RemoteDirCache,
    ) -> Result<usize> {
        let mut seen = HashSet::new();
        let missing: Vec<String> = paths
            .iter()
            .filter(|p| !cache.contains(p) && seen.insert(p.as_str()))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(0);
        }

        let joined = missing.join(" ");
        self.traced("mkdir", &joined, self.bridge.mkdirs(serial, &missing))
            .await?;
        for path in &missing {
            cache.insert_with_parents(path);
        }
        Ok(missing.len())
    }

    /// Recursive listing of a host folder.
    pub async fn list_local(&self, root: &Path) -> Result<Vec<FileEntry>> {
        let owned = root.to_path_buf();
        tokio::task::spawn_blocking(move || local::list_local(&owned))
            .await
            .map_err(|e| BridgeError::local(root, std::io::Error::other(e)))?
            .map_err(|e| BridgeError::local(root, e))
    }

    /// Remove a host file or directory tree.
    pub async fn remove_local(&self, path: &Path) -> Result<()> {
        let owned: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            if owned.is_dir() {
                std::fs::remove_dir_all(&owned)
            } else {
                std::fs::remove_file(&owned)
            }
        })
        .await
        .map_err(|e| BridgeError::local(path, std::io::Error::other(e)))?
        .map_err(|e| BridgeError::local(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MockBridge;
    use tracing_test::traced_test;

    fn client(mock: &MockBridge) -> BridgeClient {
        BridgeClient::new(Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_ensure_remote_dirs_batches_and_caches() {
        let mock = MockBridge::new();
        mock.connect("s1");
        let client = client(&mock);
        let mut cache = RemoteDirCache::new();

        let dirs = vec![
            "/sdcard/a".to_string(),
            "/sdcard/a/b".to_string(),
            "/sdcard/a".to_string(),
        ];
        assert_eq!(client.ensure_remote_dirs("s1", &dirs, &mut cache).await.unwrap(), 2);
        assert_eq!(mock.count_commands("mkdir"), 1);

        // Everything cached: no second invocation
        assert_eq!(client.ensure_remote_dirs("s1", &dirs, &mut cache).await.unwrap(), 0);
        assert_eq!(mock.count_commands("mkdir"), 1);
        assert!(cache.contains("/sdcard"));
        assert!(mock.dir_exists("s1", "/sdcard/a/b"));
    }

    #[tokio::test]
    async fn test_failed_mkdir_is_not_cached() {
        let mock = MockBridge::new();
        mock.connect("s1");
        mock.set_unavailable(true);
        let client = client(&mock);
        let mut cache = RemoteDirCache::new();

        let err = client
            .ensure_remote_dirs("s1", &["/sdcard/x".to_string()], &mut cache)
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_list_local_missing_root_is_local_path_error() {
        let mock = MockBridge::new();
        let err = client(&mock)
            .list_local(Path::new("/nonexistent/droidsync/root"))
            .await
            .unwrap_err();
        match err {
            BridgeError::LocalPath { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remove_local_file_and_tree() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("f.txt");
        let tree = tmp.path().join("t/u");
        std::fs::write(&file, b"x").unwrap();
        std::fs::create_dir_all(&tree).unwrap();

        let mock = MockBridge::new();
        let client = client(&mock);
        client.remove_local(&file).await.unwrap();
        client.remove_local(&tmp.path().join("t")).await.unwrap();
        assert!(!file.exists());
        assert!(!tree.exists());
    }

    #[traced_test]
    #[tokio::test]
    async fn test_calls_emit_structured_event() {
        let mock = MockBridge::new();
        mock.connect("s1");
        client(&mock).list_devices().await.unwrap();
        assert!(logs_contain("correlation_id"));
        assert!(logs_contain("duration_ms"));
        assert!(logs_contain("status=\"ok\""));
    }
}
