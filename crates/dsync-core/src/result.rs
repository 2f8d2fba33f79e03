//! Outcome of one pipeline run

use crate::plan::SyncOperation;
use crate::schema::PipelineId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Manual,
    Auto,
}

impl fmt::Display for RunTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunTrigger::Manual => f.write_str("manual"),
            RunTrigger::Auto => f.write_str("auto"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Ok,
    Failed { reason: String },
}

impl OperationStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, OperationStatus::Ok)
    }
}

/// One attempted (or skipped) operation and how it went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub operation: SyncOperation,
    pub status: OperationStatus,
}

/// Counts derived from the outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub mkdirs: usize,
    pub pushed: usize,
    pub pulled: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunStats {
    /// Add stats from another run
    pub fn add(&mut self, other: &RunStats) {
        self.mkdirs += other.mkdirs;
        self.pushed += other.pushed;
        self.pulled += other.pulled;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pushed, {} pulled, {} skipped, {} failed",
            self.pushed, self.pulled, self.skipped, self.failed
        )
    }
}

/// Record of one pipeline run. Built up by the executor, then frozen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub pipeline_id: PipelineId,
    pub serial: String,
    pub trigger: RunTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Executable operations attempted (skips excluded)
    pub operations_attempted: usize,
    pub operations_failed: usize,
    pub outcomes: Vec<OperationOutcome>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugin_errors: Vec<String>,
    /// Pipeline-level failure that stopped the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
}

impl RunResult {
    pub fn new(
        pipeline_id: PipelineId,
        serial: impl Into<String>,
        trigger: RunTrigger,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            pipeline_id,
            serial: serial.into(),
            trigger,
            started_at,
            finished_at: started_at,
            operations_attempted: 0,
            operations_failed: 0,
            outcomes: Vec::new(),
            plugin_errors: Vec::new(),
            aborted: None,
            cancelled: false,
        }
    }

    /// Append an outcome and keep the counters in step.
    pub fn record(&mut self, operation: SyncOperation, status: OperationStatus) {
        if operation.is_executable() {
            self.operations_attempted += 1;
            if !status.is_ok() {
                self.operations_failed += 1;
            }
        }
        self.outcomes.push(OperationOutcome { operation, status });
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = at;
    }

    /// `true` when the run finished without failures, abort or cancellation.
    pub fn is_success(&self) -> bool {
        self.operations_failed == 0 && self.aborted.is_none() && !self.cancelled
    }

    pub fn stats(&self) -> RunStats {
        let mut stats = RunStats::default();
        for outcome in &self.outcomes {
            if !outcome.status.is_ok() {
                stats.failed += 1;
                continue;
            }
            match outcome.operation {
                SyncOperation::MkDir { .. } => stats.mkdirs += 1,
                SyncOperation::Push { .. } => stats.pushed += 1,
                SyncOperation::Pull { .. } => stats.pulled += 1,
                SyncOperation::Delete { .. } => stats.deleted += 1,
                SyncOperation::Skip { .. } => stats.skipped += 1,
            }
        }
        stats
    }

    pub fn failures(&self) -> impl Iterator<Item = (&SyncOperation, &str)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            OperationStatus::Failed { reason } => Some((&o.operation, reason.as_str())),
            OperationStatus::Ok => None,
        })
    }
}
