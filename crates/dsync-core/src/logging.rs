//! Shared logging initialization for droidsync binaries.

use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

/// Parse a level name as accepted by `DROIDSYNC_LOG`. Unknown names fall back to INFO.
pub fn parse_level(value: &str) -> tracing::Level {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

fn level_from_env() -> tracing::Level {
    parse_level(&std::env::var("DROIDSYNC_LOG").unwrap_or_else(|_| "info".to_string()))
}

/// Initialize process-level tracing output from `DROIDSYNC_LOG`.
///
/// This is safe to call multiple times; only the first call initializes the
/// subscriber. It is best-effort and never returns an error.
pub fn init() {
    init_with_level(level_from_env());
}

/// Same as [`init`] with an explicit level (e.g. from a `--verbose` flag).
pub fn init_with_level(level: tracing::Level) {
    if INIT.get().is_some() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    let _ = INIT.set(());
}
