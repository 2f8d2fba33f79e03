//! In-memory bridge for tests
//!
//! Simulates one filesystem per device serial. Pushes and pulls move real
//! bytes to and from the host filesystem so executor tests can check both
//! ends.

use super::error::{BridgeError, Result};
use super::transport::Bridge;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use droidsync_core::schema::FileEntry;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::{Duration, sleep};

#[derive(Debug, Clone)]
struct MockFile {
    content: Vec<u8>,
    modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct MockDevice {
    files: BTreeMap<String, MockFile>,
    dirs: BTreeSet<String>,
}

impl MockDevice {
    fn with_root() -> Self {
        let mut device = Self::default();
        device.dirs.insert("/".to_string());
        device
    }

    fn mkdir_p(&mut self, path: &str) {
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            self.dirs.insert(current.clone());
        }
    }

    fn is_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }
}

#[derive(Debug, Default)]
struct MockState {
    devices: BTreeMap<String, MockDevice>,
    connected: BTreeSet<String>,
    /// Every command in issue order
    commands: Vec<String>,
    fail_list_devices: bool,
    unavailable: bool,
    fail_push: HashSet<String>,
    fail_pull: HashSet<String>,
    latency_ms: u64,
}

/// Mock bridge implementation for testing
///
/// Cloning shares the same state, so a test can keep a handle for assertions
/// while the executor owns another.
#[derive(Debug, Clone, Default)]
pub struct MockBridge {
    state: Arc<Mutex<MockState>>,
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => "/",
    }
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Plug a device in. Its filesystem survives disconnects.
    pub fn connect(&self, serial: &str) {
        let mut state = self.state();
        state.connected.insert(serial.to_string());
        state
            .devices
            .entry(serial.to_string())
            .or_insert_with(MockDevice::with_root);
    }

    pub fn disconnect(&self, serial: &str) {
        self.state().connected.remove(serial);
    }

    /// Seed a directory (and its parents).
    pub fn add_dir(&self, serial: &str, path: &str) {
        let mut state = self.state();
        state
            .devices
            .entry(serial.to_string())
            .or_insert_with(MockDevice::with_root)
            .mkdir_p(path);
    }

    /// Seed a file; parent directories are created.
    pub fn add_file(&self, serial: &str, path: &str, content: &[u8], modified: DateTime<Utc>) {
        let mut state = self.state();
        let device = state
            .devices
            .entry(serial.to_string())
            .or_insert_with(MockDevice::with_root);
        device.mkdir_p(parent_of(path));
        device.files.insert(
            path.to_string(),
            MockFile {
                content: content.to_vec(),
                modified,
            },
        );
    }

    pub fn file(&self, serial: &str, path: &str) -> Option<Vec<u8>> {
        let state = self.state();
        state
            .devices
            .get(serial)?
            .files
            .get(path)
            .map(|f| f.content.clone())
    }

    pub fn modified(&self, serial: &str, path: &str) -> Option<DateTime<Utc>> {
        let state = self.state();
        state.devices.get(serial)?.files.get(path).map(|f| f.modified)
    }

    pub fn dir_exists(&self, serial: &str, path: &str) -> bool {
        let state = self.state();
        state
            .devices
            .get(serial)
            .is_some_and(|d| d.is_dir(path))
    }

    /// Make `list_devices` fail.
    pub fn set_fail_list_devices(&self, fail: bool) {
        self.state().fail_list_devices = fail;
    }

    /// Make every device operation fail as if the bridge went away.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Fail pushes to this remote path.
    pub fn fail_push_to(&self, remote: &str) {
        self.state().fail_push.insert(remote.to_string());
    }

    /// Fail pulls from this remote path.
    pub fn fail_pull_from(&self, remote: &str) {
        self.state().fail_pull.insert(remote.to_string());
    }

    /// Simulated latency for every operation
    pub fn set_latency(&self, latency_ms: u64) {
        self.state().latency_ms = latency_ms;
    }

    /// Commands issued so far, e.g. `push /h/a.txt /sdcard/a.txt`.
    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    pub fn count_commands(&self, verb: &str) -> usize {
        self.state()
            .commands
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(verb))
            .count()
    }

    pub fn clear_commands(&self) {
        self.state().commands.clear();
    }

    /// Log the command, apply latency, and check the device is reachable.
    async fn begin(&self, serial: Option<&str>, command: String) -> Result<()> {
        let latency = {
            let mut state = self.state();
            state.commands.push(command);
            state.latency_ms
        };
        if latency > 0 {
            sleep(Duration::from_millis(latency)).await;
        }

        let state = self.state();
        if state.unavailable {
            return Err(BridgeError::unavailable("mock bridge unavailable"));
        }
        if let Some(serial) = serial {
            if !state.connected.contains(serial) {
                return Err(BridgeError::unavailable(format!(
                    "device '{serial}' not found"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Bridge for MockBridge {
    async fn list_devices(&self) -> Result<Vec<String>> {
        self.begin(None, "devices".to_string()).await?;
        let state = self.state();
        if state.fail_list_devices {
            return Err(BridgeError::unavailable("cannot connect to daemon"));
        }
        Ok(state.connected.iter().cloned().collect())
    }

    async fn list_remote(&self, serial: &str, root: &str) -> Result<Vec<FileEntry>> {
        self.begin(Some(serial), format!("find {root}")).await?;
        let state = self.state();
        let Some(device) = state.devices.get(serial) else {
            return Err(BridgeError::unavailable(format!("device '{serial}' not found")));
        };

        let root = if root == "/" { "/" } else { root.trim_end_matches('/') };
        if !device.is_dir(root) {
            return Err(BridgeError::RemotePath {
                path: root.to_string(),
                message: "No such file or directory".to_string(),
            });
        }
        let prefix = if root == "/" {
            "/".to_string()
        } else {
            format!("{root}/")
        };

        let mut entries: Vec<FileEntry> = device
            .dirs
            .iter()
            .filter_map(|d| d.strip_prefix(&prefix))
            .filter(|rel| !rel.is_empty())
            .map(|rel| FileEntry::dir(rel, DateTime::<Utc>::UNIX_EPOCH))
            .collect();
        entries.extend(device.files.iter().filter_map(|(path, file)| {
            let rel = path.strip_prefix(&prefix)?;
            Some(FileEntry::file(rel, file.content.len() as u64, file.modified))
        }));
        entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(entries)
    }

    async fn stat_remote(&self, serial: &str, path: &str) -> Result<Option<FileEntry>> {
        self.begin(Some(serial), format!("stat {path}")).await?;
        let state = self.state();
        let Some(device) = state.devices.get(serial) else {
            return Ok(None);
        };
        if device.is_dir(path) {
            return Ok(Some(FileEntry::dir(path, DateTime::<Utc>::UNIX_EPOCH)));
        }
        Ok(device
            .files
            .get(path)
            .map(|f| FileEntry::file(path, f.content.len() as u64, f.modified)))
    }

    async fn mkdirs(&self, serial: &str, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        self.begin(Some(serial), format!("mkdir -p {}", paths.join(" ")))
            .await?;
        let mut state = self.state();
        let device = state
            .devices
            .entry(serial.to_string())
            .or_insert_with(MockDevice::with_root);
        for path in paths {
            if device.files.contains_key(path.as_str()) {
                return Err(BridgeError::CommandFailed {
                    command: format!("mkdir -p {path}"),
                    code: Some(1),
                    stderr: format!("mkdir: '{path}': File exists"),
                });
            }
            device.mkdir_p(path);
        }
        Ok(())
    }

    async fn push(&self, serial: &str, local: &Path, remote: &str) -> Result<()> {
        self.begin(Some(serial), format!("push {} {remote}", local.display()))
            .await?;

        let content = tokio::fs::read(local)
            .await
            .map_err(|e| BridgeError::local(local, e))?;
        let modified = tokio::fs::metadata(local)
            .await
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .map_err(|e| BridgeError::local(local, e))?;

        let mut state = self.state();
        if state.fail_push.contains(remote) {
            return Err(BridgeError::CommandFailed {
                command: format!("adb push {} {remote}", local.display()),
                code: Some(1),
                stderr: "remote write failed".to_string(),
            });
        }
        let Some(device) = state.devices.get_mut(serial) else {
            return Err(BridgeError::unavailable(format!("device '{serial}' not found")));
        };
        if !device.is_dir(parent_of(remote)) {
            return Err(BridgeError::RemotePath {
                path: remote.to_string(),
                message: "parent directory does not exist".to_string(),
            });
        }
        device
            .files
            .insert(remote.to_string(), MockFile { content, modified });
        Ok(())
    }

    async fn pull(&self, serial: &str, remote: &str, local: &Path) -> Result<()> {
        self.begin(Some(serial), format!("pull {remote} {}", local.display()))
            .await?;

        let file = {
            let state = self.state();
            if state.fail_pull.contains(remote) {
                return Err(BridgeError::CommandFailed {
                    command: format!("adb pull -a {remote} {}", local.display()),
                    code: Some(1),
                    stderr: "remote read failed".to_string(),
                });
            }
            state
                .devices
                .get(serial)
                .and_then(|d| d.files.get(remote))
                .cloned()
                .ok_or_else(|| BridgeError::RemotePath {
                    path: remote.to_string(),
                    message: "No such file or directory".to_string(),
                })?
        };

        tokio::fs::write(local, &file.content)
            .await
            .map_err(|e| BridgeError::local(local, e))?;
        let handle = std::fs::File::options()
            .write(true)
            .open(local)
            .map_err(|e| BridgeError::local(local, e))?;
        handle
            .set_modified(file.modified.into())
            .map_err(|e| BridgeError::local(local, e))?;
        Ok(())
    }

    async fn remove_remote(&self, serial: &str, path: &str) -> Result<()> {
        self.begin(Some(serial), format!("rm {path}")).await?;
        let mut state = self.state();
        let Some(device) = state.devices.get_mut(serial) else {
            return Err(BridgeError::unavailable(format!("device '{serial}' not found")));
        };
        let prefix = format!("{}/", path.trim_end_matches('/'));
        device
            .files
            .retain(|p, _| p != path && !p.starts_with(&prefix));
        device
            .dirs
            .retain(|d| d != path && !d.starts_with(&prefix));
        Ok(())
    }
}
