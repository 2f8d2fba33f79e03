//! Device bridge: the `adb` process, its in-memory double, and the traced
//! client the engine talks to.

mod adb;
mod client;
mod error;
mod mock;
pub mod parse;
mod transport;

pub use adb::AdbBridge;
pub use client::{BridgeClient, RemoteDirCache};
pub use error::{BridgeError, Result};
pub use mock::MockBridge;
pub use transport::Bridge;
