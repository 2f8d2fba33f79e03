//! Run progress on stderr

use droidsync_core::schema::Pipeline;
use droidsync_core::{OperationOutcome, OperationStatus, RunResult, RunTrigger};
use droidsync_daemon::sync::SyncObserver;

/// Prints one line per executed operation. Skips are summarized at the end.
#[derive(Debug, Default)]
pub struct ProgressPrinter {
    quiet: bool,
}

impl ProgressPrinter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl SyncObserver for ProgressPrinter {
    fn on_run_started(&self, pipeline: &Pipeline, serial: &str, trigger: RunTrigger) {
        if !self.quiet {
            eprintln!("Syncing '{}' with {} ({})", pipeline.name, serial, trigger);
        }
    }

    fn on_operation(
        &self,
        _pipeline: &Pipeline,
        index: usize,
        total: usize,
        outcome: &OperationOutcome,
    ) {
        if self.quiet || !outcome.operation.is_executable() {
            return;
        }
        match &outcome.status {
            OperationStatus::Ok => eprintln!("  [{}/{}] {}", index + 1, total, outcome.operation),
            OperationStatus::Failed { reason } => eprintln!(
                "  [{}/{}] {}  FAILED: {}",
                index + 1,
                total,
                outcome.operation,
                reason
            ),
        }
    }

    fn on_run_finished(&self, _pipeline: &Pipeline, result: &RunResult) {
        if self.quiet {
            return;
        }
        for error in &result.plugin_errors {
            eprintln!("  plugin: {error}");
        }
        if let Some(reason) = &result.aborted {
            eprintln!("  aborted: {reason}");
        }
        if result.cancelled {
            eprintln!("  cancelled");
        }
    }
}
