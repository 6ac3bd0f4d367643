//! Batch import item, status snapshot and the pure arithmetic behind the
//! batch import controller: batch sizing, retry backoff, progress and ETA.
//!
//! The controller itself (async, owns the status) lives in
//! `orgimport-pipeline`; everything here is deterministic and testable
//! without a runtime.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of batches the adaptive sizing aims for.
pub const TARGET_BATCH_COUNT: usize = 20;

/// Default lower bound for adaptive batch sizes.
pub const DEFAULT_MIN_BATCH_SIZE: usize = 5;

/// Default upper bound for adaptive batch sizes.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Items and outcomes
// ---------------------------------------------------------------------------

/// The unit submitted to the remote processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchImportItem {
    pub id: String,
    /// Dot-separated operation name, e.g. `"department.create"`.
    pub item_type: String,
    pub payload: serde_json::Value,
}

impl BatchImportItem {
    pub fn new(
        id: impl Into<String>,
        item_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            item_type: item_type.into(),
            payload,
        }
    }
}

/// An item the processor could not apply, with the reason it gave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item: BatchImportItem,
    pub error: String,
}

/// What one processor call reports back for its batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub succeeded: Vec<BatchImportItem>,
    pub failed: Vec<ItemFailure>,
}

impl BatchOutcome {
    pub fn all_succeeded(items: &[BatchImportItem]) -> Self {
        Self {
            succeeded: items.to_vec(),
            failed: Vec::new(),
        }
    }

    /// Every item fails with the same error (e.g. the whole call failed).
    pub fn all_failed(items: &[BatchImportItem], error: &str) -> Self {
        Self {
            succeeded: Vec::new(),
            failed: items
                .iter()
                .map(|item| ItemFailure {
                    item: item.clone(),
                    error: error.to_string(),
                })
                .collect(),
        }
    }
}

/// A permanent failure recorded in the status once retries are exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportErrorEntry {
    pub item_id: String,
    pub item_type: String,
    pub error: String,
    /// Total processor calls that included the item.
    pub attempts: u32,
}

// ---------------------------------------------------------------------------
// Controller state
// ---------------------------------------------------------------------------

/// Lifecycle of a batch import controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    Running,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

impl ControllerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Paused => "Paused",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Status snapshot
// ---------------------------------------------------------------------------

/// Immutable progress snapshot published by the controller.
///
/// `processed == succeeded + failed` always holds; items waiting for a
/// retry are counted in `retrying` and not yet in `processed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchImportStatus {
    /// Increases by one with every published snapshot.
    pub version: u64,
    pub state: ControllerState,
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub retrying: usize,
    /// 1-based index of the batch in flight (0 before the first batch).
    pub current_batch: usize,
    pub total_batches: usize,
    /// Fraction in `0.0..=1.0`.
    pub progress: f64,
    pub elapsed_ms: u64,
    /// Processed items per second.
    pub throughput: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining_ms: Option<u64>,
    pub is_paused: bool,
    pub is_cancelled: bool,
    pub is_complete: bool,
    pub errors: Vec<ImportErrorEntry>,
}

impl BatchImportStatus {
    pub fn new(total: usize, total_batches: usize) -> Self {
        Self {
            version: 0,
            state: ControllerState::Idle,
            total,
            processed: 0,
            succeeded: 0,
            failed: 0,
            retrying: 0,
            current_batch: 0,
            total_batches,
            progress: 0.0,
            elapsed_ms: 0,
            throughput: 0.0,
            estimated_time_remaining_ms: None,
            is_paused: false,
            is_cancelled: false,
            is_complete: false,
            errors: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }

    /// Recompute progress, throughput and ETA for the given elapsed time.
    pub fn recompute(&mut self, elapsed: Duration) {
        self.elapsed_ms = elapsed.as_millis() as u64;
        self.progress = progress_fraction(self.processed, self.total, self.is_complete);
        self.throughput = throughput(self.processed, elapsed);
        self.estimated_time_remaining_ms = if self.is_complete {
            Some(0)
        } else {
            estimate_remaining(self.processed, self.total, elapsed).map(|d| d.as_millis() as u64)
        };
    }

    pub fn is_consistent(&self) -> bool {
        self.processed == self.succeeded + self.failed
    }

    /// The compact view for small progress widgets.
    pub fn compact(&self) -> StatusLine {
        StatusLine {
            state: self.state,
            processed: self.processed,
            total: self.total,
            percent: (self.progress * 100.0).round().clamp(0.0, 100.0) as u8,
            failed: self.failed,
            estimated_time_remaining_ms: self.estimated_time_remaining_ms,
        }
    }
}

/// Compact status view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLine {
    pub state: ControllerState,
    pub processed: usize,
    pub total: usize,
    pub percent: u8,
    pub failed: usize,
    pub estimated_time_remaining_ms: Option<u64>,
}

impl std::fmt::Display for StatusLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}/{} ({}%)",
            self.state.label(),
            self.processed,
            self.total,
            self.percent
        )?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if let Some(ms) = self.estimated_time_remaining_ms.filter(|ms| *ms > 0) {
            write!(f, ", ~{}s left", ms.div_ceil(1000))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pure functions
// ---------------------------------------------------------------------------

/// Pick a batch size for `total` items.
///
/// Aims for [`TARGET_BATCH_COUNT`] batches, clamped to `[min, max]`: large
/// imports get bigger batches (fewer round trips), small ones smaller
/// batches (more frequent progress).
pub fn compute_batch_size(total: usize, min: usize, max: usize) -> usize {
    let min = min.max(1);
    let max = max.max(min);
    total.div_ceil(TARGET_BATCH_COUNT).clamp(min, max)
}

/// Split items into consecutive batches of `size`, preserving order.
pub fn partition_batches<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(size).collect());
    }
    batches
}

/// Delay before retry `attempt` (1-based): `base × multiplier^(attempt-1)`,
/// clamped to `max`.
pub fn backoff_delay(base: Duration, multiplier: f64, attempt: u32, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    let ms = base.as_millis() as f64 * multiplier.max(1.0).powi(exponent);
    if !ms.is_finite() || ms >= max.as_millis() as f64 {
        return max;
    }
    Duration::from_millis(ms as u64)
}

/// Fraction of items processed. An empty, completed run counts as done.
pub fn progress_fraction(processed: usize, total: usize, is_complete: bool) -> f64 {
    if total == 0 {
        return if is_complete { 1.0 } else { 0.0 };
    }
    (processed as f64 / total as f64).clamp(0.0, 1.0)
}

/// Observed processed items per second.
pub fn throughput(processed: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    processed as f64 / secs
}

/// Extrapolate remaining time from throughput so far.
///
/// `None` until at least one item has been processed.
pub fn estimate_remaining(processed: usize, total: usize, elapsed: Duration) -> Option<Duration> {
    let rate = throughput(processed, elapsed);
    if processed == 0 || rate <= 0.0 {
        return None;
    }
    let remaining = total.saturating_sub(processed) as f64;
    Some(Duration::from_secs_f64(remaining / rate))
}
