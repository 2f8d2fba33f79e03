//! Pipeline execution

mod executor;
mod guard;
mod observer;

pub use executor::{SyncError, SyncExecutor};
pub use guard::{RunGuard, RunPermit};
pub use observer::{NoopObserver, SyncObserver};
