//! Device presence polling

use crate::bridge::BridgeClient;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Device presence change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Connected(String),
    Disconnected(String),
    /// A poll failed; the previous state is kept.
    MonitorError(String),
}

/// Serials currently connected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceState {
    serials: BTreeSet<String>,
}

impl DeviceState {
    pub fn is_connected(&self, serial: &str) -> bool {
        self.serials.contains(serial)
    }

    pub fn serials(&self) -> impl Iterator<Item = &str> {
        self.serials.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.serials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.serials.is_empty()
    }
}

/// Polls the bridge and turns device list changes into events.
///
/// Each serial is either connected or not; `Connected` is emitted once per
/// transition into the connected state and `Disconnected` once per
/// transition out of it.
pub struct DeviceMonitor {
    client: BridgeClient,
    interval: Duration,
    events: mpsc::UnboundedSender<DeviceEvent>,
    state: watch::Sender<DeviceState>,
}

impl DeviceMonitor {
    pub fn new(
        client: BridgeClient,
        interval: Duration,
        events: mpsc::UnboundedSender<DeviceEvent>,
    ) -> Self {
        let (state, _) = watch::channel(DeviceState::default());
        Self {
            client,
            interval,
            events,
            state,
        }
    }

    /// Read-only view of the connected set.
    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> DeviceState {
        self.state.borrow().clone()
    }

    /// Poll once, publish the new state and send the resulting events.
    ///
    /// Sending never waits on the consumer, so a scheduler busy with a long
    /// wave does not hold up polling. The events are also returned.
    pub async fn poll_once(&self) -> Vec<DeviceEvent> {
        let events = match self.client.list_devices().await {
            Ok(serials) => {
                let next = DeviceState {
                    serials: serials.into_iter().collect(),
                };
                let previous = self.current();

                let mut events: Vec<DeviceEvent> = next
                    .serials
                    .difference(&previous.serials)
                    .map(|s| DeviceEvent::Connected(s.clone()))
                    .collect();
                events.extend(
                    previous
                        .serials
                        .difference(&next.serials)
                        .map(|s| DeviceEvent::Disconnected(s.clone())),
                );

                if next != previous {
                    self.state.send_replace(next);
                }
                events
            }
            Err(e) => {
                warn!("Device poll failed: {}", e);
                vec![DeviceEvent::MonitorError(e.to_string())]
            }
        };

        for event in &events {
            match event {
                DeviceEvent::Connected(s) => info!("Device connected: {}", s),
                DeviceEvent::Disconnected(s) => info!("Device disconnected: {}", s),
                DeviceEvent::MonitorError(_) => {}
            }
            if self.events.send(event.clone()).is_err() {
                debug!("Device event receiver dropped");
            }
        }
        events
    }

    /// Poll until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        info!("Device monitor polling every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }
        info!("Device monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MockBridge;
    use std::sync::Arc;

    fn monitor(mock: &MockBridge) -> (DeviceMonitor, mpsc::UnboundedReceiver<DeviceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = BridgeClient::new(Arc::new(mock.clone()));
        (DeviceMonitor::new(client, Duration::from_millis(10), tx), rx)
    }

    #[tokio::test]
    async fn test_connect_reported_once_per_transition() {
        let mock = MockBridge::new();
        let (monitor, mut rx) = monitor(&mock);
        let state = monitor.subscribe();

        assert!(monitor.poll_once().await.is_empty());

        mock.connect("A");
        assert_eq!(monitor.poll_once().await, vec![DeviceEvent::Connected("A".into())]);
        assert!(monitor.poll_once().await.is_empty());
        assert!(state.borrow().is_connected("A"));

        mock.disconnect("A");
        assert_eq!(monitor.poll_once().await, vec![DeviceEvent::Disconnected("A".into())]);
        assert!(monitor.poll_once().await.is_empty());

        mock.connect("A");
        assert_eq!(monitor.poll_once().await, vec![DeviceEvent::Connected("A".into())]);

        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        assert_eq!(
            received,
            vec![
                DeviceEvent::Connected("A".into()),
                DeviceEvent::Disconnected("A".into()),
                DeviceEvent::Connected("A".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_poll_failure_keeps_state() {
        let mock = MockBridge::new();
        mock.connect("A");
        let (monitor, _rx) = monitor(&mock);
        monitor.poll_once().await;

        mock.set_fail_list_devices(true);
        let events = monitor.poll_once().await;
        assert!(matches!(events.as_slice(), [DeviceEvent::MonitorError(_)]));
        assert!(monitor.current().is_connected("A"));

        // Recovery does not re-announce a device that never left
        mock.set_fail_list_devices(false);
        assert!(monitor.poll_once().await.is_empty());
    }

    #[tokio::test]
    async fn test_polling_continues_while_consumer_is_busy() {
        let mock = MockBridge::new();
        mock.set_fail_list_devices(true);
        let (monitor, mut rx) = monitor(&mock);

        // Nobody reads the channel during these polls
        for _ in 0..200 {
            tokio::time::timeout(Duration::from_millis(200), monitor.poll_once())
                .await
                .unwrap();
        }

        mock.set_fail_list_devices(false);
        mock.connect("A");
        tokio::time::timeout(Duration::from_millis(200), monitor.poll_once())
            .await
            .unwrap();
        assert!(monitor.current().is_connected("A"));

        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        assert_eq!(received.len(), 201);
        assert_eq!(received.last(), Some(&DeviceEvent::Connected("A".into())));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let mock = MockBridge::new();
        mock.connect("A");
        let (monitor, mut rx) = monitor(&mock);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(cancel.clone()));

        assert_eq!(rx.recv().await, Some(DeviceEvent::Connected("A".into())));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
