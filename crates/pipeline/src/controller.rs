//! Sequential batch execution with retry, pause/resume and cancellation.
//!
//! Items are split into batches and handed to a [`BatchProcessor`] one
//! batch at a time. Items a call reports as failed are retried as a smaller
//! batch with exponential backoff until they succeed or the retry budget is
//! spent, at which point they become permanent failures.
//!
//! Pause and cancel are only observed between batches: a batch that has
//! been dispatched, including all of its retries, always runs to the end.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use orgimport_core::batching::{
    backoff_delay, partition_batches, BatchImportItem, BatchImportStatus, BatchOutcome,
    ControllerState, ImportErrorEntry, ItemFailure,
};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::config::BatchImportConfig;
use crate::error::PipelineError;
use crate::status::StatusPublisher;

/// Error recorded for items a processor left out of its outcome.
pub const MISSING_RESULT_ERROR: &str = "Processor reported no result for this item";

/// Applies one batch of items against the remote service.
///
/// Returning `Err` means the call as a whole failed; every item in the
/// batch is then treated as failed with that error and retried.
#[async_trait]
pub trait BatchProcessor: Send + Sync {
    async fn process(&self, items: &[BatchImportItem]) -> Result<BatchOutcome, PipelineError>;
}

/// Terminal outcome of a controller run.
#[derive(Debug, Clone)]
pub struct BatchImportResult {
    /// `true` when no item failed permanently.
    pub success: bool,
    pub status: BatchImportStatus,
    /// Ids of every applied item, in the order they succeeded.
    pub succeeded_ids: Vec<String>,
}

impl BatchImportResult {
    pub fn failures(&self) -> &[ImportErrorEntry] {
        &self.status.errors
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable remote control for a running controller.
#[derive(Clone)]
pub struct ControllerHandle {
    cancel: CancellationToken,
    paused: Arc<watch::Sender<bool>>,
    latest: watch::Receiver<BatchImportStatus>,
}

impl ControllerHandle {
    /// Stop starting new batches until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Stop after the batch in flight. Cannot be undone.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_pause_requested(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Clone of the latest published snapshot.
    pub fn status(&self) -> BatchImportStatus {
        self.latest.borrow().clone()
    }

    /// Receiver for the latest snapshot. Closed once the run finishes.
    pub fn watch(&self) -> watch::Receiver<BatchImportStatus> {
        self.latest.clone()
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct BatchImportController {
    batches: Vec<Vec<BatchImportItem>>,
    processor: Arc<dyn BatchProcessor>,
    config: BatchImportConfig,
    publisher: StatusPublisher,
    cancel: CancellationToken,
    pause_tx: Arc<watch::Sender<bool>>,
    pause_rx: watch::Receiver<bool>,
    succeeded_ids: Vec<String>,
}

impl BatchImportController {
    pub fn new(
        items: Vec<BatchImportItem>,
        processor: Arc<dyn BatchProcessor>,
        config: BatchImportConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let total = items.len();
        let batch_size = config.batch_size_for(total);
        let batches = partition_batches(items, batch_size);
        let publisher = StatusPublisher::new(BatchImportStatus::new(total, batches.len()));
        let (pause_tx, pause_rx) = watch::channel(false);

        Ok(Self {
            batches,
            processor,
            config,
            publisher,
            cancel: CancellationToken::new(),
            pause_tx: Arc::new(pause_tx),
            pause_rx,
            succeeded_ids: Vec::new(),
        })
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            cancel: self.cancel.clone(),
            paused: Arc::clone(&self.pause_tx),
            latest: self.publisher.watch(),
        }
    }

    /// Every snapshot published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchImportStatus> {
        self.publisher.subscribe()
    }

    pub fn status(&self) -> &BatchImportStatus {
        self.publisher.status()
    }

    /// Process every batch and return the terminal result. Consumes the
    /// controller, so all subscriptions close when this returns.
    pub async fn run(mut self) -> BatchImportResult {
        let total_batches = self.batches.len();
        tracing::info!(
            total = self.publisher.status().total,
            total_batches,
            "Starting batch import",
        );

        self.publisher.start_clock();
        self.publisher.update(|s| s.state = ControllerState::Running);

        let batches = std::mem::take(&mut self.batches);
        for (index, batch) in batches.into_iter().enumerate() {
            if !self.wait_while_paused().await || self.cancel.is_cancelled() {
                break;
            }

            let number = index + 1;
            self.publisher.update(|s| s.current_batch = number);
            tracing::debug!(batch = number, total_batches, size = batch.len(), "Processing batch");

            self.process_batch(batch).await;

            if number < total_batches && !self.config.delay_between_batches.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.config.delay_between_batches) => {}
                }
            }
        }

        self.finish()
    }

    /// Block at a batch boundary while paused. Returns `false` when
    /// cancelled instead of resumed.
    async fn wait_while_paused(&mut self) -> bool {
        if !*self.pause_rx.borrow_and_update() {
            return true;
        }
        if self.cancel.is_cancelled() {
            return false;
        }

        tracing::info!(processed = self.publisher.status().processed, "Batch import paused");
        self.publisher.update(|s| {
            s.state = ControllerState::Paused;
            s.is_paused = true;
        });

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.publisher.update(|s| s.is_paused = false);
                    return false;
                }
                changed = self.pause_rx.changed() => {
                    if changed.is_err() || !*self.pause_rx.borrow_and_update() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Batch import resumed");
        self.publisher.update(|s| {
            s.state = ControllerState::Running;
            s.is_paused = false;
        });
        true
    }

    /// Run one batch and its retries to completion.
    async fn process_batch(&mut self, batch: Vec<BatchImportItem>) {
        let mut pending = batch;
        let mut attempt: u32 = 1;

        loop {
            let outcome = match self.processor.process(&pending).await {
                Ok(outcome) => reconcile(&pending, outcome),
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        items = pending.len(),
                        error = %e,
                        "Batch processor call failed",
                    );
                    BatchOutcome::all_failed(&pending, &e.to_string())
                }
            };

            let succeeded = outcome.succeeded.len();
            self.succeeded_ids
                .extend(outcome.succeeded.into_iter().map(|item| item.id));

            let exhausted = attempt > self.config.retry_attempts;
            if outcome.failed.is_empty() || exhausted {
                let errors: Vec<ImportErrorEntry> = outcome
                    .failed
                    .into_iter()
                    .map(|f| ImportErrorEntry {
                        item_id: f.item.id,
                        item_type: f.item.item_type,
                        error: f.error,
                        attempts: attempt,
                    })
                    .collect();
                if !errors.is_empty() {
                    tracing::warn!(
                        failed = errors.len(),
                        attempts = attempt,
                        "Items failed permanently",
                    );
                }
                self.publisher.update(|s| {
                    s.succeeded += succeeded;
                    s.failed += errors.len();
                    s.processed = s.succeeded + s.failed;
                    s.retrying = 0;
                    s.errors.extend(errors);
                });
                return;
            }

            let retrying = outcome.failed.len();
            self.publisher.update(|s| {
                s.succeeded += succeeded;
                s.processed = s.succeeded + s.failed;
                s.retrying = retrying;
            });

            let delay = backoff_delay(
                self.config.retry_delay,
                self.config.backoff_multiplier,
                attempt,
                self.config.max_retry_delay,
            );
            tracing::info!(
                attempt,
                retrying,
                delay_ms = delay.as_millis() as u64,
                "Retrying failed items",
            );
            tokio::time::sleep(delay).await;

            pending = outcome.failed.into_iter().map(|f| f.item).collect();
            attempt += 1;
        }
    }

    fn finish(mut self) -> BatchImportResult {
        let cancelled = self.cancel.is_cancelled();
        self.publisher.update(|s| {
            let state = if cancelled && s.processed < s.total {
                ControllerState::Cancelled
            } else if s.succeeded == 0 && s.failed > 0 {
                ControllerState::Failed
            } else {
                ControllerState::Completed
            };
            s.state = state;
            s.retrying = 0;
            s.is_paused = false;
            s.is_cancelled = state == ControllerState::Cancelled;
            s.is_complete = !s.is_cancelled;
        });

        let status = self.publisher.finish();
        tracing::info!(
            state = %status.state,
            succeeded = status.succeeded,
            failed = status.failed,
            elapsed_ms = status.elapsed_ms,
            "Batch import finished",
        );

        BatchImportResult {
            success: status.failed == 0,
            status,
            succeeded_ids: self.succeeded_ids,
        }
    }
}

/// Restrict an outcome to the items that were sent, and fail any sent item
/// the processor did not mention.
fn reconcile(sent: &[BatchImportItem], outcome: BatchOutcome) -> BatchOutcome {
    let sent_ids: HashSet<&str> = sent.iter().map(|i| i.id.as_str()).collect();
    let mut seen: HashSet<String> = HashSet::with_capacity(sent.len());

    let mut reconciled = BatchOutcome::default();
    for item in outcome.succeeded {
        if sent_ids.contains(item.id.as_str()) && seen.insert(item.id.clone()) {
            reconciled.succeeded.push(item);
        }
    }
    for failure in outcome.failed {
        if sent_ids.contains(failure.item.id.as_str()) && seen.insert(failure.item.id.clone()) {
            reconciled.failed.push(failure);
        }
    }
    for item in sent {
        if !seen.contains(&item.id) {
            reconciled.failed.push(ItemFailure {
                item: item.clone(),
                error: MISSING_RESULT_ERROR.to_string(),
            });
        }
    }
    reconciled
}
