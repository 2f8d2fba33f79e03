//! Diff planning
//!
//! Turns a local and a remote listing into an ordered [`SyncPlan`]. Planning
//! is pure: listings, the evaluation instant and the hooks are all inputs.

mod operation;
mod planner;

pub use operation::{
    ConflictDecision, ParseDecisionError, PlanSummary, SkipReason, SyncOperation, SyncPlan,
};
pub use planner::{DiffPlanner, MTIME_TOLERANCE, NoHooks, PlanContext, PlanHooks};
