//! Bridge abstraction
//!
//! Every device interaction goes through [`Bridge`]. The production
//! implementation shells out to `adb`; tests use the in-memory mock.

use super::error::Result;
use async_trait::async_trait;
use droidsync_core::schema::FileEntry;
use std::path::Path;

/// Device bridge operations
///
/// Remote paths are absolute device paths using `/`. Implementations must be
/// thread-safe so the monitor can poll while a sync is running.
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Serials of devices in the `device` state.
    async fn list_devices(&self) -> Result<Vec<String>>;

    /// Recursive listing of `root`, relative to it.
    ///
    /// # Errors
    ///
    /// `RemotePath` when `root` does not exist.
    async fn list_remote(&self, serial: &str, root: &str) -> Result<Vec<FileEntry>>;

    /// Metadata for one path; `None` when it does not exist. The returned
    /// entry's `relative_path` is the path that was asked for.
    async fn stat_remote(&self, serial: &str, path: &str) -> Result<Option<FileEntry>>;

    /// Create every path (and missing parents) in one invocation.
    async fn mkdirs(&self, serial: &str, paths: &[String]) -> Result<()>;

    /// Copy a host file to the device, keeping its modification time.
    async fn push(&self, serial: &str, local: &Path, remote: &str) -> Result<()>;

    /// Copy a device file to the host, keeping its modification time.
    async fn pull(&self, serial: &str, remote: &str, local: &Path) -> Result<()>;

    /// Remove a device file or directory tree.
    async fn remove_remote(&self, serial: &str, path: &str) -> Result<()>;
}
