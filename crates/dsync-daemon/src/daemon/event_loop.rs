//! Main daemon event loop

use super::graceful_shutdown;
use crate::monitor::{DeviceEvent, DeviceMonitor};
use crate::scheduler::AutoSyncScheduler;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Run the daemon until `cancel` fires.
///
/// Spawns the device monitor and, when given, the auto-sync scheduler fed by
/// the monitor's events. Without a scheduler the events are only logged.
pub async fn run(
    monitor: DeviceMonitor,
    events: mpsc::UnboundedReceiver<DeviceEvent>,
    scheduler: Option<Arc<AutoSyncScheduler>>,
    cancel: CancellationToken,
) -> Result<()> {
    info!("Starting daemon event loop");
    let mut tasks: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

    let monitor_cancel = cancel.clone();
    tasks.push((
        "monitor",
        tokio::spawn(async move { monitor.run(monitor_cancel).await }),
    ));

    let events_cancel = cancel.clone();
    match scheduler {
        Some(scheduler) => tasks.push((
            "scheduler",
            tokio::spawn(async move { scheduler.run(events, events_cancel).await }),
        )),
        None => {
            info!("Auto-sync disabled; device events are only logged");
            tasks.push((
                "events",
                tokio::spawn(log_events(events, events_cancel)),
            ));
        }
    }

    info!("Daemon running. Waiting for cancellation signal...");
    cancel.cancelled().await;
    info!("Cancellation signal received. Beginning shutdown...");

    graceful_shutdown(tasks, Duration::from_secs(5))
        .await
        .context("Background tasks did not shut down cleanly")?;

    info!("Daemon event loop shutdown complete");
    Ok(())
}

/// Drain events so the monitor never blocks on a full channel.
async fn log_events(mut events: mpsc::UnboundedReceiver<DeviceEvent>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => debug!("Device event: {:?}", event),
                None => break,
            },
        }
    }
}
