use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which end of a pipeline an entry or operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Host filesystem
    Local,
    /// Device filesystem reached through the bridge
    Remote,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Local => f.write_str("local"),
            Side::Remote => f.write_str("remote"),
        }
    }
}

/// One file or directory from a folder listing.
///
/// `relative_path` is relative to the listed root and always uses `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub relative_path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub is_dir: bool,
}

impl FileEntry {
    pub fn file(relative_path: impl Into<String>, size: u64, modified: DateTime<Utc>) -> Self {
        Self {
            relative_path: relative_path.into(),
            size,
            modified,
            is_dir: false,
        }
    }

    pub fn dir(relative_path: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            relative_path: relative_path.into(),
            size: 0,
            modified,
            is_dir: true,
        }
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}
