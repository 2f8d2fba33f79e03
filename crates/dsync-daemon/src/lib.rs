//! Sync engine and background service for droidsync
//!
//! - [`bridge`]: `adb` commands behind the [`bridge::Bridge`] trait
//! - [`monitor`]: device presence polling
//! - [`plugin`] / [`plugins`]: hook trait, loader and built-ins
//! - [`sync`]: plan execution with per-pipeline exclusion
//! - [`scheduler`]: auto-sync waves with cooldown
//! - [`daemon`]: event loop and shutdown

pub mod bridge;
pub mod daemon;
pub mod monitor;
pub mod plugin;
pub mod plugins;
pub mod scheduler;
pub mod sync;

pub use bridge::{BridgeClient, BridgeError};
pub use monitor::{DeviceEvent, DeviceMonitor, DeviceState};
pub use plugin::{PluginError, PluginHost};
pub use scheduler::AutoSyncScheduler;
pub use sync::{SyncError, SyncExecutor, SyncObserver};
