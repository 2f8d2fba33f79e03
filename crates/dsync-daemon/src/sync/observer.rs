//! Progress callbacks for presenters

use droidsync_core::schema::Pipeline;
use droidsync_core::{OperationOutcome, RunResult, RunTrigger};

/// Receives run progress. All methods default to no-ops.
///
/// Callbacks run on the executor's task; keep them short.
pub trait SyncObserver: Send + Sync {
    fn on_run_started(&self, _pipeline: &Pipeline, _serial: &str, _trigger: RunTrigger) {}

    /// `index` is zero-based over the plan's operations.
    fn on_operation(
        &self,
        _pipeline: &Pipeline,
        _index: usize,
        _total: usize,
        _outcome: &OperationOutcome,
    ) {
    }

    fn on_run_finished(&self, _pipeline: &Pipeline, _result: &RunResult) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {}
