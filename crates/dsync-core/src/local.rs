//! Host-side folder listing

use crate::schema::FileEntry;
use chrono::{DateTime, Utc};
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Recursively list `root`, returning entries relative to it.
///
/// Symlinks are not followed. Entries whose metadata cannot be read are
/// skipped with a warning rather than failing the whole listing.
///
/// # Errors
///
/// Returns `NotFound` if `root` does not exist and `InvalidInput` if it is
/// not a directory.
pub fn list_local(root: &Path) -> io::Result<Vec<FileEntry>> {
    let meta = std::fs::metadata(root)?;
    if !meta.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a directory", root.display()),
        ));
    }

    let mut entries = Vec::new();
    for item in WalkDir::new(root).min_depth(1).follow_links(false) {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        let metadata = match item.metadata() {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", item.path().display(), e);
                continue;
            }
        };

        if metadata.file_type().is_symlink() {
            continue;
        }

        let Ok(rel) = item.path().strip_prefix(root) else {
            continue;
        };
        // A lossy name would point at a file that does not exist
        let Some(components) = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()
        else {
            tracing::warn!("Skipping {}: name is not valid UTF-8", item.path().display());
            continue;
        };
        let relative_path = components.join("/");

        let modified: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        entries.push(FileEntry {
            relative_path,
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            modified,
            is_dir: metadata.is_dir(),
        });
    }

    entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(entries)
}

/// Join a `/`-separated relative path onto a host directory.
pub fn join_relative(root: &Path, relative: &str) -> std::path::PathBuf {
    relative
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}
