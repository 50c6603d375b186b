//! Run aggregator: cumulative counters and timing for one pipeline execution.
//!
//! The [`RunAggregator`] owns the mutable [`RunStats`] for the lifetime of a
//! run. Outcomes are recorded strictly sequentially by the driver, the
//! single-writer rule that keeps `attempted == sum of batch lengths` and
//! `inserted + errored <= attempted` exact without locks. [`finalize`] stamps
//! the end time and hands the stats over read-only.
//!
//! [`finalize`]: RunAggregator::finalize

use crate::store::{BatchItemError, WriteOutcome};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Why a batch landed in [`RunStats::failed_batches`].
#[derive(Debug, Clone)]
pub enum BatchFailure {
    /// Individual items were rejected; the rest of the batch was inserted.
    PerItem(Vec<BatchItemError>),

    /// The whole batch was lost to a single failure.
    Whole(String),
}

/// Descriptor of a batch that did not fully succeed.
#[derive(Debug, Clone)]
pub struct FailedBatch {
    /// Identity of the document source the batch was built from.
    pub source: String,

    /// Ordinal of the batch within the run (0-based).
    pub batch_index: usize,

    /// Number of documents submitted in the batch.
    pub batch_size: usize,

    /// What went wrong.
    pub failure: BatchFailure,
}

/// Cumulative counters and timing for one pipeline execution.
///
/// Mutable only through [`RunAggregator`]; frozen at
/// [`RunAggregator::finalize`].
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Documents submitted, equal to the sum of all batch lengths.
    pub attempted: usize,

    /// Documents acknowledged as inserted.
    pub inserted: usize,

    /// Documents rejected per-item plus documents lost to whole-batch
    /// failures.
    pub errored: usize,

    /// Batches submitted so far.
    pub batches_processed: usize,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run was finalized. `None` while the run is live.
    pub finished_at: Option<DateTime<Utc>>,

    /// Descriptors of every batch that partially or wholly failed.
    pub failed_batches: Vec<FailedBatch>,
}

impl RunStats {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            attempted: 0,
            inserted: 0,
            errored: 0,
            batches_processed: 0,
            started_at,
            finished_at: None,
            failed_batches: Vec::new(),
        }
    }

    /// Wall-clock duration of the run, available once finalized.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    /// Whether every attempted document was inserted.
    pub fn fully_succeeded(&self) -> bool {
        self.errored == 0 && self.failed_batches.is_empty()
    }
}

/// Accumulates per-batch outcomes into [`RunStats`].
pub struct RunAggregator {
    stats: RunStats,
    started: Instant,
}

impl RunAggregator {
    /// Start a new run: stamps the start time.
    pub fn new() -> Self {
        Self {
            stats: RunStats::new(Utc::now()),
            started: Instant::now(),
        }
    }

    /// Record the outcome of one batch submission.
    ///
    /// `batch_size` is the number of documents that were submitted; it is
    /// always added to `attempted`, regardless of outcome.
    pub fn record_outcome(&mut self, source: &str, batch_size: usize, outcome: &WriteOutcome) {
        debug_assert!(
            outcome.inserted() <= batch_size,
            "store acknowledged more documents than were submitted"
        );

        self.stats.attempted += batch_size;
        self.stats.batches_processed += 1;

        match outcome {
            WriteOutcome::AllInserted { count } => {
                self.stats.inserted += count;
            }
            WriteOutcome::PartialFailure { inserted, errors } => {
                self.stats.inserted += inserted;
                self.stats.errored += errors.len();
                self.stats.failed_batches.push(FailedBatch {
                    source: source.to_string(),
                    batch_index: self.stats.batches_processed - 1,
                    batch_size,
                    failure: BatchFailure::PerItem(errors.clone()),
                });
            }
            WriteOutcome::HardFailure { reason } => {
                // The entire batch counts as errored; it is never resubmitted.
                self.stats.errored += batch_size;
                self.stats.failed_batches.push(FailedBatch {
                    source: source.to_string(),
                    batch_index: self.stats.batches_processed - 1,
                    batch_size,
                    failure: BatchFailure::Whole(reason.clone()),
                });
            }
        }
    }

    /// Live view of the stats, for the progress reporter.
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Time elapsed since the run started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stamp the end time and return the frozen stats for reporting. The
    /// aggregator keeps the finalized stats readable through [`stats`].
    ///
    /// [`stats`]: RunAggregator::stats
    pub fn finalize(&mut self) -> RunStats {
        self.stats.finished_at = Some(Utc::now());
        self.stats.clone()
    }
}

impl Default for RunAggregator {
    fn default() -> Self {
        Self::new()
    }
}
