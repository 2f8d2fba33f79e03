//! Runs a pipeline against one device

use super::guard::{RunGuard, RunPermit};
use super::observer::{NoopObserver, SyncObserver};
use crate::bridge::{BridgeClient, BridgeError, RemoteDirCache};
use crate::plugin::{ActivePlugin, PluginHost};
use chrono::{DateTime, Utc};
use droidsync_core::clock::Clock;
use droidsync_core::plan::{DiffPlanner, PlanContext, SyncOperation, SyncPlan};
use droidsync_core::schema::{Pipeline, Side};
use droidsync_core::{OperationStatus, RunResult, RunTrigger};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Errors that prevent a run from starting
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("pipeline '{pipeline}' is already running")]
    AlreadyRunning { pipeline: String },

    #[error("no device connected")]
    NoDevice,

    /// Listing or validation failed while previewing
    #[error("cannot plan '{pipeline}': {message}")]
    Plan { pipeline: String, message: String },

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Plans and executes pipeline runs.
///
/// Runs of different pipelines may overlap; runs of the same pipeline never
/// do. Failures of single operations are recorded in the [`RunResult`] and
/// the run continues; a bridge that becomes unavailable ends it.
pub struct SyncExecutor {
    client: BridgeClient,
    plugins: Arc<PluginHost>,
    clock: Arc<dyn Clock>,
    guard: RunGuard,
    observer: Arc<dyn SyncObserver>,
    planner: DiffPlanner,
}

impl std::fmt::Debug for SyncExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncExecutor")
            .field("client", &self.client)
            .field("guard", &self.guard)
            .field("planner", &self.planner)
            .finish_non_exhaustive()
    }
}

impl SyncExecutor {
    pub fn new(client: BridgeClient, plugins: Arc<PluginHost>, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            plugins,
            clock,
            guard: RunGuard::new(),
            observer: Arc::new(NoopObserver),
            planner: DiffPlanner::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Share run exclusion with other processes through lock files in `dir`.
    pub fn with_lock_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.guard = RunGuard::with_lock_dir(dir);
        self
    }

    pub fn with_planner(mut self, planner: DiffPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn client(&self) -> &BridgeClient {
        &self.client
    }

    pub fn plugins(&self) -> &PluginHost {
        &self.plugins
    }

    pub fn is_running(&self, pipeline: &Pipeline) -> bool {
        self.guard.is_running(pipeline.id)
    }

    /// Device a manual run should target: the pipeline's own serial, or the
    /// first connected device when it has none.
    pub async fn resolve_serial(&self, pipeline: &Pipeline) -> Result<String, SyncError> {
        if !pipeline.device_serial.is_empty() {
            return Ok(pipeline.device_serial.clone());
        }
        self.client
            .list_devices()
            .await?
            .into_iter()
            .next()
            .ok_or(SyncError::NoDevice)
    }

    /// Plan without executing. Nothing is written on either side.
    pub async fn preview(&self, pipeline: &Pipeline, serial: &str) -> Result<SyncPlan, SyncError> {
        let now = self.clock.now();
        let plugin = self.plugins.activate(pipeline, now);
        let plan = self
            .build_plan(pipeline, serial, &plugin, now, false)
            .await
            .map_err(|message| SyncError::Plan {
                pipeline: pipeline.name.clone(),
                message,
            });
        for error in plugin.take_errors() {
            warn!("{}", error);
        }
        plan
    }

    /// Full run: list both sides, plan, execute.
    ///
    /// # Errors
    ///
    /// `SyncError::AlreadyRunning` when the pipeline has a run in flight.
    /// Everything after the run starts is reported in the result.
    pub async fn sync(
        &self,
        pipeline: Arc<Pipeline>,
        serial: &str,
        trigger: RunTrigger,
        cancel: &CancellationToken,
    ) -> Result<RunResult, SyncError> {
        let _permit = self.acquire(&pipeline)?;
        let started = self.clock.now();
        let mut result = RunResult::new(pipeline.id, serial, trigger, started);
        info!("Starting {} sync of '{}' on {}", trigger, pipeline.name, serial);
        self.observer.on_run_started(&pipeline, serial, trigger);

        let plugin = self.plugins.activate(&pipeline, started);
        plugin.before_sync(&pipeline);

        match self.build_plan(&pipeline, serial, &plugin, started, true).await {
            Ok(plan) => {
                self.run_operations(&pipeline, serial, &plan, &mut result, cancel)
                    .await
            }
            Err(reason) => {
                warn!("Sync of '{}' aborted: {}", pipeline.name, reason);
                result.aborted = Some(reason);
            }
        }

        self.complete(&pipeline, &plugin, &mut result);
        Ok(result)
    }

    /// Execute a plan built elsewhere, under the same per-pipeline guard.
    pub async fn execute(
        &self,
        pipeline: Arc<Pipeline>,
        serial: &str,
        plan: &SyncPlan,
        plugin: &ActivePlugin,
        trigger: RunTrigger,
        cancel: &CancellationToken,
    ) -> Result<RunResult, SyncError> {
        if plan.pipeline_id != pipeline.id {
            return Err(SyncError::Plan {
                pipeline: pipeline.name.clone(),
                message: format!("plan belongs to pipeline {}", plan.pipeline_id),
            });
        }
        let _permit = self.acquire(&pipeline)?;
        let mut result = RunResult::new(pipeline.id, serial, trigger, self.clock.now());
        self.observer.on_run_started(&pipeline, serial, trigger);
        plugin.before_sync(&pipeline);

        self.run_operations(&pipeline, serial, plan, &mut result, cancel)
            .await;

        self.complete(&pipeline, plugin, &mut result);
        Ok(result)
    }

    fn acquire(&self, pipeline: &Pipeline) -> Result<RunPermit, SyncError> {
        self.guard
            .try_acquire(pipeline.id)
            .ok_or_else(|| SyncError::AlreadyRunning {
                pipeline: pipeline.name.clone(),
            })
    }

    /// List both roots and plan. Errors are the reason to abort.
    async fn build_plan(
        &self,
        pipeline: &Pipeline,
        serial: &str,
        plugin: &ActivePlugin,
        now: DateTime<Utc>,
        create_local_root: bool,
    ) -> Result<SyncPlan, String> {
        pipeline.validate().map_err(|e| e.to_string())?;
        let direction = pipeline.direction;

        let local = match self.client.list_local(&pipeline.local_path).await {
            Ok(entries) => entries,
            Err(BridgeError::LocalPath { source, .. })
                if source.kind() == io::ErrorKind::NotFound && direction.writes_to_local() =>
            {
                if create_local_root {
                    tokio::fs::create_dir_all(&pipeline.local_path)
                        .await
                        .map_err(|e| {
                            format!(
                                "cannot create local folder {}: {e}",
                                pipeline.local_path.display()
                            )
                        })?;
                    info!("Created local folder {}", pipeline.local_path.display());
                }
                Vec::new()
            }
            Err(e) => return Err(format!("cannot list local folder: {e}")),
        };

        let (remote, remote_root_exists) =
            match self.client.list_remote(serial, pipeline.device_root()).await {
                Ok(entries) => (entries, true),
                // Created by the plan's first MkDir
                Err(BridgeError::RemotePath { .. }) if direction.writes_to_device() => {
                    (Vec::new(), false)
                }
                Err(e) => return Err(format!("cannot list device folder: {e}")),
            };

        let ctx = PlanContext::new(now)
            .with_hooks(plugin)
            .with_remote_root_exists(remote_root_exists);
        Ok(self.planner.plan(pipeline, &local, &remote, &ctx))
    }

    async fn run_operations(
        &self,
        pipeline: &Pipeline,
        serial: &str,
        plan: &SyncPlan,
        result: &mut RunResult,
        cancel: &CancellationToken,
    ) {
        let total = plan.operations.len();
        let mut index = 0;
        let mut cache = RemoteDirCache::new();

        let mkdirs: Vec<String> = plan.mkdirs().map(str::to_string).collect();
        if !mkdirs.is_empty() {
            if cancel.is_cancelled() {
                result.cancelled = true;
                return;
            }
            let (status, abort) = match self
                .client
                .ensure_remote_dirs(serial, &mkdirs, &mut cache)
                .await
            {
                Ok(_) => (OperationStatus::Ok, None),
                Err(e) => (
                    OperationStatus::Failed {
                        reason: e.to_string(),
                    },
                    e.is_unavailable().then(|| e.to_string()),
                ),
            };
            for path in mkdirs {
                self.record(pipeline, result, SyncOperation::MkDir { path }, status.clone(), index, total);
                index += 1;
            }
            if let Some(reason) = abort {
                warn!("Sync of '{}' aborted: {}", pipeline.name, reason);
                result.aborted = Some(reason);
                return;
            }
        }

        for op in &plan.operations {
            if matches!(op, SyncOperation::MkDir { .. }) {
                continue;
            }
            if cancel.is_cancelled() {
                info!("Sync of '{}' cancelled after {} operation(s)", pipeline.name, index);
                result.cancelled = true;
                return;
            }

            let (status, abort) = match self.apply(serial, op).await {
                Ok(()) => (OperationStatus::Ok, None),
                Err(e) => {
                    warn!("{} failed: {}", op, e);
                    (
                        OperationStatus::Failed {
                            reason: e.to_string(),
                        },
                        e.is_unavailable().then(|| e.to_string()),
                    )
                }
            };
            self.record(pipeline, result, op.clone(), status, index, total);
            index += 1;

            if let Some(reason) = abort {
                warn!("Sync of '{}' aborted: {}", pipeline.name, reason);
                result.aborted = Some(reason);
                return;
            }
        }
    }

    async fn apply(&self, serial: &str, op: &SyncOperation) -> Result<(), BridgeError> {
        match op {
            SyncOperation::Push { local, remote } => self.client.push(serial, local, remote).await,
            SyncOperation::Pull { remote, local } => {
                if let Some(parent) = local.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| BridgeError::local(parent, e))?;
                }
                self.client.pull(serial, remote, local).await
            }
            SyncOperation::Delete {
                path,
                side: Side::Remote,
            } => self.client.remove_remote(serial, path).await,
            SyncOperation::Delete {
                path,
                side: Side::Local,
            } => self.client.remove_local(Path::new(path)).await,
            // Directories are created up front; skips only get recorded
            SyncOperation::MkDir { .. } | SyncOperation::Skip { .. } => Ok(()),
        }
    }

    fn record(
        &self,
        pipeline: &Pipeline,
        result: &mut RunResult,
        operation: SyncOperation,
        status: OperationStatus,
        index: usize,
        total: usize,
    ) {
        result.record(operation, status);
        if let Some(outcome) = result.outcomes.last() {
            self.observer.on_operation(pipeline, index, total, outcome);
        }
    }

    fn complete(&self, pipeline: &Pipeline, plugin: &ActivePlugin, result: &mut RunResult) {
        result.finish(self.clock.now());
        plugin.after_sync(pipeline, result);
        result.plugin_errors.extend(plugin.take_errors());
        self.observer.on_run_finished(pipeline, result);

        let stats = result.stats();
        if result.is_success() {
            info!("Sync of '{}' complete: {}", pipeline.name, stats);
        } else {
            warn!(
                "Sync of '{}' finished with problems: {} (aborted: {}, cancelled: {})",
                pipeline.name,
                stats,
                result.aborted.as_deref().unwrap_or("no"),
                result.cancelled
            );
        }
    }
}
