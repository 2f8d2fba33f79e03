//! Auto-sync on device connect

use crate::monitor::DeviceEvent;
use crate::sync::{SyncError, SyncExecutor};
use chrono::{DateTime, Duration, Utc};
use droidsync_core::clock::Clock;
use droidsync_core::schema::PipelineId;
use droidsync_core::{PipelineStore, RunResult, RunTrigger};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs auto-sync pipelines when their device appears.
///
/// The store is reloaded at the start of every wave. Eligible pipelines run
/// one after another in store order. A pipeline that
/// completed an auto run less than `cooldown` ago is left out.
pub struct AutoSyncScheduler {
    store: Arc<PipelineStore>,
    executor: Arc<SyncExecutor>,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    /// Last completed auto run per pipeline. Only this scheduler writes it.
    last_runs: Mutex<HashMap<PipelineId, DateTime<Utc>>>,
}

impl AutoSyncScheduler {
    pub fn new(
        store: Arc<PipelineStore>,
        executor: Arc<SyncExecutor>,
        clock: Arc<dyn Clock>,
        cooldown: Duration,
    ) -> Self {
        Self {
            store,
            executor,
            clock,
            cooldown,
            last_runs: Mutex::new(HashMap::new()),
        }
    }

    fn last_runs(&self) -> MutexGuard<'_, HashMap<PipelineId, DateTime<Utc>>> {
        self.last_runs.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn last_auto_sync(&self, id: PipelineId) -> Option<DateTime<Utc>> {
        self.last_runs().get(&id).copied()
    }

    /// Whether the cooldown for `id` has elapsed at `now`.
    pub fn is_due(&self, id: PipelineId, now: DateTime<Utc>) -> bool {
        match self.last_auto_sync(id) {
            Some(last) => now - last >= self.cooldown,
            None => true,
        }
    }

    /// Run every eligible pipeline for `serial`, sequentially.
    pub async fn handle_device_connected(
        &self,
        serial: &str,
        cancel: &CancellationToken,
    ) -> Vec<RunResult> {
        // The CLI edits the same file while the daemon runs
        if let Err(e) = self.store.reload() {
            warn!("Cannot reload pipelines, using the last known list: {}", e);
        }

        let now = self.clock.now();
        let due: Vec<_> = self
            .store
            .auto_sync_candidates(serial)
            .into_iter()
            .filter(|p| {
                let due = self.is_due(p.id, now);
                if !due {
                    debug!("Auto-sync of '{}' still cooling down", p.name);
                }
                due
            })
            .collect();

        if due.is_empty() {
            debug!("No auto-sync pipelines due for {}", serial);
            return Vec::new();
        }
        info!("Auto-sync wave for {}: {} pipeline(s)", serial, due.len());

        let mut results = Vec::with_capacity(due.len());
        for pipeline in due {
            if cancel.is_cancelled() {
                break;
            }
            match self
                .executor
                .sync(Arc::clone(&pipeline), serial, RunTrigger::Auto, cancel)
                .await
            {
                Ok(result) => {
                    self.last_runs().insert(pipeline.id, self.clock.now());
                    results.push(result);
                }
                // A manual run holds the pipeline; try again next connect
                Err(SyncError::AlreadyRunning { .. }) => {
                    info!("Skipping auto-sync of '{}': already running", pipeline.name);
                }
                Err(e) => warn!("Auto-sync of '{}' failed to start: {}", pipeline.name, e),
            }
        }
        results
    }

    /// Consume monitor events until cancelled or the channel closes.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<DeviceEvent>, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Some(DeviceEvent::Connected(serial)) => {
                    self.handle_device_connected(&serial, &cancel).await;
                }
                Some(DeviceEvent::Disconnected(serial)) => {
                    debug!("Scheduler saw {} disconnect", serial);
                }
                Some(DeviceEvent::MonitorError(reason)) => {
                    debug!("Scheduler saw monitor error: {}", reason);
                }
                None => break,
            }
        }
        info!("Auto-sync scheduler stopped");
    }
}
