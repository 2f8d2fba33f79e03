use crate::schema::{PipelineId, Side};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Why a path was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Rejected by the pipeline's filters or a plugin filter
    Filtered,
    /// Conflict resolved as "skip"
    ConflictSkipped,
    /// Conflict hook failed to produce a decision
    ConflictUnresolved,
    /// File on one side, directory on the other
    TypeMismatch,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Filtered => "filtered",
            SkipReason::ConflictSkipped => "conflict skipped",
            SkipReason::ConflictUnresolved => "conflict unresolved",
            SkipReason::TypeMismatch => "file/directory mismatch",
        };
        f.write_str(s)
    }
}

/// One step of a plan.
///
/// Remote paths are absolute device paths; local paths are absolute host
/// paths. `Skip.path` is the entry's path relative to its listing root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SyncOperation {
    #[serde(rename = "mkdir")]
    MkDir { path: String },
    Push { local: PathBuf, remote: String },
    Pull { remote: String, local: PathBuf },
    Delete { path: String, side: Side },
    Skip { path: String, reason: SkipReason },
}

impl SyncOperation {
    /// `false` only for `Skip`.
    pub fn is_executable(&self) -> bool {
        !matches!(self, SyncOperation::Skip { .. })
    }

    /// Short verb used in logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncOperation::MkDir { .. } => "mkdir",
            SyncOperation::Push { .. } => "push",
            SyncOperation::Pull { .. } => "pull",
            SyncOperation::Delete { .. } => "delete",
            SyncOperation::Skip { .. } => "skip",
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOperation::MkDir { path } => write!(f, "mkdir  {path}"),
            SyncOperation::Push { local, remote } => {
                write!(f, "push   {} -> {remote}", local.display())
            }
            SyncOperation::Pull { remote, local } => {
                write!(f, "pull   {remote} -> {}", local.display())
            }
            SyncOperation::Delete { path, side } => write!(f, "delete {path} ({side})"),
            SyncOperation::Skip { path, reason } => write!(f, "skip   {path} ({reason})"),
        }
    }
}

/// Operation counts by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub mkdirs: usize,
    pub pushes: usize,
    pub pulls: usize,
    pub deletes: usize,
    pub skips: usize,
}

impl PlanSummary {
    pub fn from_operations(operations: &[SyncOperation]) -> Self {
        let mut summary = Self::default();
        for op in operations {
            match op {
                SyncOperation::MkDir { .. } => summary.mkdirs += 1,
                SyncOperation::Push { .. } => summary.pushes += 1,
                SyncOperation::Pull { .. } => summary.pulls += 1,
                SyncOperation::Delete { .. } => summary.deletes += 1,
                SyncOperation::Skip { .. } => summary.skips += 1,
            }
        }
        summary
    }

    pub fn executable(&self) -> usize {
        self.mkdirs + self.pushes + self.pulls + self.deletes
    }
}

/// Ordered operations for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlan {
    pub pipeline_id: PipelineId,
    pub operations: Vec<SyncOperation>,
    pub summary: PlanSummary,
}

impl SyncPlan {
    pub fn new(pipeline_id: PipelineId, operations: Vec<SyncOperation>) -> Self {
        let summary = PlanSummary::from_operations(&operations);
        Self {
            pipeline_id,
            operations,
            summary,
        }
    }

    /// `true` when executing the plan would change nothing.
    pub fn is_noop(&self) -> bool {
        self.summary.executable() == 0
    }

    pub fn mkdirs(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().filter_map(|op| match op {
            SyncOperation::MkDir { path } => Some(path.as_str()),
            _ => None,
        })
    }
}

/// Outcome of a conflict hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictDecision {
    PreferLocal,
    PreferRemote,
    Skip,
    #[default]
    PreferNewer,
}

/// Unknown conflict decision string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown conflict decision '{0}'")]
pub struct ParseDecisionError(pub String);

impl FromStr for ConflictDecision {
    type Err = ParseDecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "prefer_local" | "local" => Ok(ConflictDecision::PreferLocal),
            "prefer_remote" | "remote" | "device" => Ok(ConflictDecision::PreferRemote),
            "skip" => Ok(ConflictDecision::Skip),
            "prefer_newer" | "newer" => Ok(ConflictDecision::PreferNewer),
            other => Err(ParseDecisionError(other.to_string())),
        }
    }
}
