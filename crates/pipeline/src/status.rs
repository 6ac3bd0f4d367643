//! Snapshot publishing for the batch controller.
//!
//! The controller owns the only mutable [`BatchImportStatus`]. Each change
//! goes through [`StatusPublisher::update`], which bumps the version,
//! recomputes the derived fields and sends a clone on two channels:
//!
//! - a `broadcast` channel carrying every snapshot, for progress logs;
//! - a `watch` channel holding only the latest one, for pollers.
//!
//! Both channels close when the publisher is dropped.

use orgimport_core::batching::BatchImportStatus;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

/// Default buffer capacity for the snapshot broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

pub struct StatusPublisher {
    status: BatchImportStatus,
    started: Option<Instant>,
    events: broadcast::Sender<BatchImportStatus>,
    latest: watch::Sender<BatchImportStatus>,
}

impl StatusPublisher {
    pub fn new(status: BatchImportStatus) -> Self {
        Self::with_capacity(status, DEFAULT_CAPACITY)
    }

    /// Create a publisher with a specific broadcast capacity.
    ///
    /// Subscribers that fall further behind than `capacity` snapshots
    /// observe `RecvError::Lagged` and skip ahead.
    pub fn with_capacity(status: BatchImportStatus, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        let (latest, _) = watch::channel(status.clone());
        Self {
            status,
            started: None,
            events,
            latest,
        }
    }

    /// Every snapshot published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchImportStatus> {
        self.events.subscribe()
    }

    /// The most recent snapshot, updated in place.
    pub fn watch(&self) -> watch::Receiver<BatchImportStatus> {
        self.latest.subscribe()
    }

    pub fn status(&self) -> &BatchImportStatus {
        &self.status
    }

    /// Start the elapsed-time clock. Later calls keep the first start.
    pub fn start_clock(&mut self) {
        self.started.get_or_insert_with(Instant::now);
    }

    /// Apply `change` and publish the resulting snapshot.
    pub fn update(&mut self, change: impl FnOnce(&mut BatchImportStatus)) {
        change(&mut self.status);
        self.publish();
    }

    fn publish(&mut self) {
        let elapsed = self.started.map(|s| s.elapsed()).unwrap_or_default();
        self.status.version += 1;
        self.status.recompute(elapsed);

        // A send error only means there are no receivers right now.
        let _ = self.events.send(self.status.clone());
        self.latest.send_replace(self.status.clone());
    }

    /// Consume the publisher, returning the final snapshot. Dropping the
    /// senders closes every subscription.
    pub fn finish(self) -> BatchImportStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgimport_core::batching::ControllerState;

    #[tokio::test]
    async fn update_bumps_version_and_reaches_both_channels() {
        let mut publisher = StatusPublisher::new(BatchImportStatus::new(10, 2));
        let mut events = publisher.subscribe();
        let latest = publisher.watch();

        publisher.start_clock();
        publisher.update(|s| {
            s.state = ControllerState::Running;
            s.processed = 4;
            s.succeeded = 4;
        });

        let snapshot = events.recv().await.unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.processed, 4);
        assert_eq!(snapshot.progress, 0.4);
        assert_eq!(latest.borrow().version, 1);
    }

    #[tokio::test]
    async fn finishing_closes_subscriptions() {
        let mut publisher = StatusPublisher::new(BatchImportStatus::new(1, 1));
        let mut events = publisher.subscribe();
        let mut latest = publisher.watch();

        publisher.update(|s| s.state = ControllerState::Completed);
        assert_eq!(latest.borrow_and_update().version, 1);
        let last = publisher.finish();
        assert_eq!(last.version, 1);

        assert!(events.recv().await.is_ok());
        assert!(events.recv().await.is_err());
        assert!(latest.changed().await.is_err());
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let mut publisher = StatusPublisher::new(BatchImportStatus::new(0, 0));
        publisher.update(|s| s.is_complete = true);
        assert_eq!(publisher.status().progress, 1.0);
    }
}
