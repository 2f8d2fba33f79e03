//! Core types and planning logic for droidsync
//!
//! This crate holds everything about a sync that does not need a device:
//! the pipeline schema and its registry, the file filter, the diff planner
//! that turns two folder listings into an ordered plan, and the run result
//! that comes back from executing one.
//!
//! The device-facing half (bridge commands, device polling, plugins,
//! execution and scheduling) lives in `droidsync-daemon`.

pub mod clock;
pub mod config;
pub mod filter;
pub mod home;
pub mod local;
pub mod logging;
pub mod plan;
pub mod result;
pub mod schema;
pub mod store;

pub use plan::{ConflictDecision, DiffPlanner, PlanContext, PlanHooks, SyncOperation, SyncPlan};
pub use result::{OperationOutcome, OperationStatus, RunResult, RunStats, RunTrigger};
pub use schema::{Direction, FileEntry, Pipeline, PipelineError, PipelineId, Side};
pub use store::PipelineStore;
