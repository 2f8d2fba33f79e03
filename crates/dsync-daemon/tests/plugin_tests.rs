//! Integration tests for plugin isolation during runs

use chrono::Utc;
use droidsync_core::clock::SystemClock;
use droidsync_core::plan::SkipReason;
use droidsync_core::schema::{Direction, FileEntry, NewPipeline, Pipeline, Side};
use droidsync_core::{RunResult, RunTrigger, SyncOperation};
use droidsync_daemon::bridge::{BridgeClient, MockBridge};
use droidsync_daemon::plugin::{
    PluginError, PluginFactory, PluginHost, PluginRegistry, SyncPlugin,
};
use droidsync_daemon::sync::SyncExecutor;
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Test plugins
// ============================================================================

/// Panics in every path hook
struct PanickingPlugin;

impl SyncPlugin for PanickingPlugin {
    fn rewrite_path(
        &self,
        _pipeline: &Pipeline,
        _side: Side,
        entry: &FileEntry,
    ) -> Result<Option<String>, PluginError> {
        panic!("cannot rewrite {}", entry.relative_path);
    }
}

/// Fails its lifecycle hooks and counts calls
struct FailingLifecyclePlugin {
    calls: Arc<AtomicUsize>,
}

impl SyncPlugin for FailingLifecyclePlugin {
    fn before_sync(&self, _pipeline: &Pipeline) -> Result<(), PluginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PluginError::hook("before_sync", "warm-up failed"))
    }

    fn after_sync(&self, _pipeline: &Pipeline, result: &RunResult) -> Result<(), PluginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PluginError::hook(
            "after_sync",
            format!("saw {} operations", result.operations_attempted),
        ))
    }
}

/// Puts every pushed file under `inbox/`
struct InboxPlugin;

impl SyncPlugin for InboxPlugin {
    fn rewrite_path(
        &self,
        _pipeline: &Pipeline,
        side: Side,
        entry: &FileEntry,
    ) -> Result<Option<String>, PluginError> {
        Ok(match side {
            Side::Local => Some(format!("inbox/{}", entry.relative_path)),
            Side::Remote => None,
        })
    }

    fn filter_entry(
        &self,
        _pipeline: &Pipeline,
        side: Side,
        entry: &FileEntry,
    ) -> Result<bool, PluginError> {
        Ok(side == Side::Remote || !entry.relative_path.ends_with(".tmp"))
    }
}

fn registry(calls: Arc<AtomicUsize>) -> PluginRegistry {
    let mut registry = PluginRegistry::with_builtins();
    registry.register(PluginFactory {
        name: "panicking".to_string(),
        description: "Panics".to_string(),
        create: Arc::new(|_| Ok(Box::new(PanickingPlugin) as Box<dyn SyncPlugin>)),
    });
    registry.register(PluginFactory {
        name: "lifecycle".to_string(),
        description: "Fails lifecycle hooks".to_string(),
        create: Arc::new(move |_| {
            Ok(Box::new(FailingLifecyclePlugin {
                calls: Arc::clone(&calls),
            }) as Box<dyn SyncPlugin>)
        }),
    });
    registry.register(PluginFactory {
        name: "broken_factory".to_string(),
        description: "Never constructs".to_string(),
        create: Arc::new(|_| Err(PluginError::load("missing license key"))),
    });
    registry.register(PluginFactory {
        name: "inbox".to_string(),
        description: "Inbox folder".to_string(),
        create: Arc::new(|_| Ok(Box::new(InboxPlugin) as Box<dyn SyncPlugin>)),
    });
    registry
}

fn executor(mock: &MockBridge, host: PluginHost) -> SyncExecutor {
    SyncExecutor::new(
        BridgeClient::new(Arc::new(mock.clone())),
        Arc::new(host),
        Arc::new(SystemClock),
    )
}

fn pipeline_with_plugin(local: &Path, plugin: &str) -> NewPipeline {
    let mut new = NewPipeline::new("docs", local, "/sdcard/Docs");
    new.plugin = Some(plugin.to_string());
    new
}

async fn run(exec: &SyncExecutor, new: NewPipeline) -> RunResult {
    exec.sync(
        Arc::new(new.into_pipeline()),
        "s1",
        RunTrigger::Manual,
        &CancellationToken::new(),
    )
    .await
    .unwrap()
}

fn setup(files: &[&str]) -> (TempDir, MockBridge) {
    let tmp = TempDir::new().unwrap();
    for name in files {
        std::fs::write(tmp.path().join(name), name.as_bytes()).unwrap();
    }
    let mock = MockBridge::new();
    mock.connect("s1");
    mock.add_dir("s1", "/sdcard/Docs");
    (tmp, mock)
}

// ============================================================================
// Isolation
// ============================================================================

#[tokio::test]
async fn test_panicking_hook_falls_back_to_identity_paths() {
    let (tmp, mock) = setup(&["a.txt", "b.txt"]);
    let exec = executor(&mock, PluginHost::new(registry(Arc::default())));

    let result = run(&exec, pipeline_with_plugin(tmp.path(), "panicking")).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.stats().pushed, 2);
    assert!(mock.file("s1", "/sdcard/Docs/a.txt").is_some());
    assert!(!result.plugin_errors.is_empty());
    assert!(result.plugin_errors.iter().all(|e| e.starts_with("panicking: ")));
    assert!(result.plugin_errors[0].contains("panicked"));
}

#[tokio::test]
async fn test_lifecycle_hook_errors_are_reported_not_fatal() {
    let (tmp, mock) = setup(&["a.txt"]);
    let calls = Arc::new(AtomicUsize::new(0));
    let exec = executor(&mock, PluginHost::new(registry(Arc::clone(&calls))));

    let result = run(&exec, pipeline_with_plugin(tmp.path(), "lifecycle")).await;

    assert!(result.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.plugin_errors.len(), 2);
    assert!(result.plugin_errors[0].contains("warm-up failed"));
    assert!(result.plugin_errors[1].contains("saw 1 operations"));
}

#[tokio::test]
async fn test_factory_failure_runs_without_plugin() {
    let (tmp, mock) = setup(&["a.txt"]);
    let exec = executor(&mock, PluginHost::new(registry(Arc::default())));

    let result = run(&exec, pipeline_with_plugin(tmp.path(), "broken_factory")).await;

    assert!(result.is_success());
    assert!(mock.file("s1", "/sdcard/Docs/a.txt").is_some());
    assert_eq!(result.plugin_errors.len(), 1);
    assert!(result.plugin_errors[0].contains("missing license key"));
}

#[tokio::test]
async fn test_unknown_plugin_runs_without_plugin() {
    let (tmp, mock) = setup(&["a.txt"]);
    let exec = executor(&mock, PluginHost::new(PluginRegistry::with_builtins()));

    let result = run(&exec, pipeline_with_plugin(tmp.path(), "does_not_exist")).await;

    assert!(result.is_success());
    assert!(result.plugin_errors[0].contains("does_not_exist"));
}

#[tokio::test]
async fn test_rewrite_and_filter_shape_the_plan() {
    let (tmp, mock) = setup(&["a.txt", "scratch.tmp"]);
    let exec = executor(&mock, PluginHost::new(registry(Arc::default())));

    let result = run(&exec, pipeline_with_plugin(tmp.path(), "inbox")).await;

    assert!(result.is_success(), "{result:?}");
    assert!(mock.file("s1", "/sdcard/Docs/inbox/a.txt").is_some());
    assert!(mock.file("s1", "/sdcard/Docs/inbox/scratch.tmp").is_none());
    assert!(mock.file("s1", "/sdcard/Docs/a.txt").is_none());
    assert!(result.outcomes.iter().any(|o| matches!(
        &o.operation,
        SyncOperation::Skip { path, reason: SkipReason::Filtered } if path == "scratch.tmp"
    )));
}

// ============================================================================
// Conflict resolution
// ============================================================================

fn conflict_setup() -> (TempDir, MockBridge) {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("notes.md"), b"local edit").unwrap();
    let mock = MockBridge::new();
    mock.connect("s1");
    // Device copy is older than the local one
    let older = Utc::now() - chrono::Duration::hours(2);
    mock.add_file("s1", "/sdcard/Docs/notes.md", b"device copy", older);
    (tmp, mock)
}

fn bidirectional(local: &Path, prefer: serde_json::Value) -> NewPipeline {
    let mut new = pipeline_with_plugin(local, "prefer_side");
    new.direction = Direction::Bidirectional;
    if !prefer.is_null() {
        new.plugin_config.insert("prefer".to_string(), prefer);
    }
    new
}

#[tokio::test]
async fn test_prefer_remote_overrides_newer_local() {
    let (tmp, mock) = conflict_setup();
    let exec = executor(&mock, PluginHost::new(PluginRegistry::with_builtins()));

    let result = run(&exec, bidirectional(tmp.path(), json!("remote"))).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.stats().pulled, 1);
    assert_eq!(
        std::fs::read(tmp.path().join("notes.md")).unwrap(),
        b"device copy"
    );
}

#[tokio::test]
async fn test_invalid_decision_leaves_conflict_unresolved() {
    let (tmp, mock) = conflict_setup();
    let exec = executor(&mock, PluginHost::new(PluginRegistry::with_builtins()));

    let result = run(&exec, bidirectional(tmp.path(), json!("whichever"))).await;

    assert_eq!(result.operations_attempted, 0);
    assert!(result.outcomes.iter().any(|o| matches!(
        o.operation,
        SyncOperation::Skip {
            reason: SkipReason::ConflictUnresolved,
            ..
        }
    )));
    assert_eq!(result.plugin_errors.len(), 1);
    assert_eq!(
        std::fs::read(tmp.path().join("notes.md")).unwrap(),
        b"local edit"
    );
    assert_eq!(mock.file("s1", "/sdcard/Docs/notes.md").unwrap(), b"device copy");
}

#[tokio::test]
async fn test_config_defaults_apply_under_pipeline_values() {
    let (tmp, mock) = conflict_setup();
    let mut host = PluginHost::new(PluginRegistry::with_builtins());
    let mut defaults = serde_json::Map::new();
    defaults.insert("prefer".to_string(), json!("skip"));
    host.set_defaults("prefer_side", defaults);
    let exec = executor(&mock, host);

    // No pipeline value: the default "skip" applies
    let result = run(&exec, bidirectional(tmp.path(), serde_json::Value::Null)).await;
    assert_eq!(result.operations_attempted, 0);
    assert!(result.outcomes.iter().any(|o| matches!(
        o.operation,
        SyncOperation::Skip {
            reason: SkipReason::ConflictSkipped,
            ..
        }
    )));

    // Pipeline value wins
    let result = run(&exec, bidirectional(tmp.path(), json!("local"))).await;
    assert_eq!(result.stats().pushed, 1);
    assert_eq!(mock.file("s1", "/sdcard/Docs/notes.md").unwrap(), b"local edit");
}

#[tokio::test]
async fn test_date_interval_rejects_bidirectional_pipeline() {
    let (tmp, mock) = setup(&["a.txt"]);
    let exec = executor(&mock, PluginHost::new(PluginRegistry::with_builtins()));
    let mut new = pipeline_with_plugin(tmp.path(), "date_interval");
    new.direction = Direction::Bidirectional;

    let result = run(&exec, new).await;

    assert!(result.is_success());
    assert!(mock.file("s1", "/sdcard/Docs/a.txt").is_some());
    assert!(result.plugin_errors[0].contains("one-way"));
}

#[tokio::test]
async fn test_date_interval_pushes_into_period_folder() {
    let (tmp, mock) = setup(&["a.txt"]);
    let exec = executor(&mock, PluginHost::new(PluginRegistry::with_builtins()));
    let mut new = pipeline_with_plugin(tmp.path(), "date_interval");
    new.plugin_config
        .insert("interval_days".to_string(), json!(1));
    new.plugin_config
        .insert("date_format".to_string(), json!("day-%Y%m%d"));

    let result = run(&exec, new).await;
    assert!(result.is_success(), "{result:?}");

    let pushed: Vec<_> = mock
        .commands()
        .into_iter()
        .filter(|c| c.starts_with("push "))
        .collect();
    assert_eq!(pushed.len(), 1);
    assert!(pushed[0].contains("/sdcard/Docs/day-"), "{pushed:?}");
    assert!(pushed[0].ends_with("/a.txt"));
}
