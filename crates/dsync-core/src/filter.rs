//! File filter for pipelines
//!
//! Pure functions over a [`FileEntry`] and the pipeline's filter settings.
//! The evaluation instant is always passed in; nothing here reads the clock.

use crate::schema::{FileEntry, Pipeline, normalize_extension};
use chrono::{DateTime, Duration, Utc};

/// Why an entry was accepted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    /// Entry passes every rule
    Included,
    /// Extension not in the include list
    ExtensionNotIncluded,
    /// Extension in the exclude list
    ExtensionExcluded,
    /// Older than the `modifiedWithinDays` window
    OutsideTimeWindow,
}

impl FilterVerdict {
    pub fn is_included(self) -> bool {
        self == FilterVerdict::Included
    }
}

/// Evaluate all rules and report the first one that rejects the entry.
///
/// Directories always pass so the structure leading to filtered-in files
/// survives.
pub fn evaluate(entry: &FileEntry, pipeline: &Pipeline, now: DateTime<Utc>) -> FilterVerdict {
    if entry.is_dir {
        return FilterVerdict::Included;
    }

    let name = entry.file_name().to_lowercase();

    if !pipeline.include_extensions.is_empty()
        && !pipeline
            .include_extensions
            .iter()
            .any(|ext| has_extension(&name, ext))
    {
        return FilterVerdict::ExtensionNotIncluded;
    }

    if pipeline
        .exclude_extensions
        .iter()
        .any(|ext| has_extension(&name, ext))
    {
        return FilterVerdict::ExtensionExcluded;
    }

    if let Some(days) = pipeline.modified_within_days {
        let window = Duration::days(i64::from(days));
        if now - entry.modified > window {
            return FilterVerdict::OutsideTimeWindow;
        }
    }

    FilterVerdict::Included
}

/// `true` if the entry should take part in the sync.
pub fn matches(entry: &FileEntry, pipeline: &Pipeline, now: DateTime<Utc>) -> bool {
    evaluate(entry, pipeline, now).is_included()
}

// `name` is already lowercase; stored extensions are normalized on insert but
// hand-edited pipeline files may not be.
fn has_extension(name: &str, ext: &str) -> bool {
    match normalize_extension(ext) {
        Some(ext) => name.ends_with(&ext),
        None => false,
    }
}
