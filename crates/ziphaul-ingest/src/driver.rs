//! Pipeline driver: owns the batch loop.
//!
//! The driver pulls documents from a source, partitions them, submits each
//! batch through the bulk writer, records the outcome, and reports progress.
//! One logical run executes sequentially: batches go out one at a time, in
//! document order, never concurrently, so the run aggregator stays a
//! single-writer structure and its invariants hold without locks.
//!
//! # State machine
//!
//! ```text
//! Idle ──connect──▶ Connected ──load──▶ Running ──finish──▶ Finished
//!   │                                                          (terminal)
//!   └──connect failed──▶ Aborted (terminal)
//! ```
//!
//! A hard batch failure is recorded and the run continues with the next
//! batch: at-most-once delivery per batch, never automatic retry, so a
//! half-written batch is never silently duplicated. Set
//! [`LoadConfig::stop_on_hard_failure`] to stop instead.

use crate::batch::partition;
use crate::error::{Error, Result};
use crate::progress::ProgressReporter;
use crate::stats::{RunAggregator, RunStats};
use crate::store::{DocumentStore, MongoStore, StoreConfig, WriteOptions, WriteOutcome};
use chrono::Utc;
use metrics::counter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use ziphaul_core::FileDocument;

/// Tuning for one load run.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Documents per bulk write.
    /// Default: 1000
    pub batch_size: usize,

    /// Submission flags passed to the bulk writer.
    pub write: WriteOptions,

    /// Stop the current source after a whole-batch failure instead of
    /// continuing with the next batch.
    /// Default: false (continue past failures)
    pub stop_on_hard_failure: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            write: WriteOptions::default(),
            stop_on_hard_failure: false,
        }
    }
}

/// Lifecycle of a pipeline driver. `Finished` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Connected,
    Running,
    Finished,
    Aborted,
}

/// What one document source contributed to the run.
#[derive(Debug, Clone)]
pub struct SourceSummary {
    /// Source identity (archive name).
    pub source: String,

    /// Documents the source yielded.
    pub documents: usize,

    /// Documents dropped before submission because they could not be
    /// serialized.
    pub skipped: usize,

    /// Documents acknowledged as inserted.
    pub inserted: usize,

    /// Documents rejected per-item or lost with a failed batch.
    pub errored: usize,
}

impl SourceSummary {
    /// Whether every document this source yielded made it into the store.
    pub fn fully_processed(&self) -> bool {
        self.errored == 0 && self.skipped == 0
    }
}

/// Drives documents from sources through the partition → write → record →
/// report loop.
pub struct PipelineDriver<S: DocumentStore> {
    store: Option<S>,
    config: LoadConfig,
    state: DriverState,
    aggregator: RunAggregator,
    reporter: ProgressReporter,
    cancel: Arc<AtomicBool>,
}

impl PipelineDriver<MongoStore> {
    /// Create an idle driver.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero batch size, before anything is
    /// written or connected.
    pub fn new(config: LoadConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(Error::Config(
                "batch size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            store: None,
            config,
            state: DriverState::Idle,
            aggregator: RunAggregator::new(),
            reporter: ProgressReporter::new(None),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Acquire the store connection: `Idle → Connected`.
    ///
    /// On failure the driver transitions to `Aborted` and the error is
    /// surfaced; nothing was written.
    pub async fn connect(&mut self, store_config: &StoreConfig) -> Result<()> {
        if self.state != DriverState::Idle {
            return Err(Error::State(format!(
                "connect called in state {:?}",
                self.state
            )));
        }

        match MongoStore::connect(store_config).await {
            Ok(store) => {
                self.store = Some(store);
                self.state = DriverState::Connected;
                Ok(())
            }
            Err(e) => {
                self.state = DriverState::Aborted;
                Err(e)
            }
        }
    }
}

impl<S: DocumentStore> PipelineDriver<S> {
    /// Create a driver around an already-acquired store handle.
    ///
    /// Starts in `Connected`; used by tests and alternative store backends.
    pub fn with_store(store: S, config: LoadConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(Error::Config(
                "batch size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            store: Some(store),
            config,
            state: DriverState::Connected,
            aggregator: RunAggregator::new(),
            reporter: ProgressReporter::new(None),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shared cancellation flag. Setting it stops the run before the next
    /// batch; documents already submitted stay submitted.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Tell the progress reporter how many documents the run is expected to
    /// attempt, once known.
    pub fn set_total_expected(&mut self, total: Option<usize>) {
        self.reporter.set_total_expected(total);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Live view of the run statistics.
    pub fn stats(&self) -> &RunStats {
        self.aggregator.stats()
    }

    /// Push one source's documents through the pipeline: `Connected/Running
    /// → Running`.
    ///
    /// Documents are stamped with their ingestion timestamp at batch-build
    /// time, partitioned, and each batch is submitted as a single bulk
    /// write. Every outcome (full, partial, or hard failure) is recorded
    /// and the loop moves on; no store failure escapes this loop as an
    /// error.
    pub async fn load(&mut self, source: &str, documents: Vec<FileDocument>) -> Result<SourceSummary> {
        match self.state {
            DriverState::Connected | DriverState::Running => {}
            other => {
                return Err(Error::State(format!("load called in state {:?}", other)));
            }
        }
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| Error::State("load called without a store".to_string()))?;

        self.state = DriverState::Running;

        let yielded = documents.len();
        let before = self.aggregator.stats().clone();

        // Stamp and serialize. Queued documents are immutable from here on.
        let ingested_at = Utc::now();
        let mut queued = Vec::with_capacity(documents.len());
        let mut skipped = 0usize;
        for mut document in documents {
            document.ingested_at = Some(ingested_at);
            match document.to_document() {
                Ok(doc) => queued.push(doc),
                Err(e) => {
                    warn!("{}: dropping unserializable document: {}", source, e);
                    skipped += 1;
                }
            }
        }

        for batch in partition(queued, self.config.batch_size)? {
            if self.cancel.load(Ordering::SeqCst) {
                info!("{}: cancelled before next batch", source);
                break;
            }

            let batch_size = batch.len();
            let outcome = store.insert_batch(batch, &self.config.write).await;

            let errored = match &outcome {
                WriteOutcome::AllInserted { count } => {
                    info!("{}: batch inserted ({} documents)", source, count);
                    0
                }
                WriteOutcome::PartialFailure { inserted, errors } => {
                    warn!(
                        "{}: batch partially failed: {} inserted, {} rejected",
                        source,
                        inserted,
                        errors.len()
                    );
                    counter!("load_batches_failed_total").increment(1);
                    errors.len()
                }
                WriteOutcome::HardFailure { reason } => {
                    warn!("{}: batch failed entirely: {}", source, reason);
                    counter!("load_batches_failed_total").increment(1);
                    batch_size
                }
            };

            let hard_failure = outcome.is_hard_failure();
            self.aggregator.record_outcome(source, batch_size, &outcome);

            counter!("load_batches_total").increment(1);
            counter!("load_documents_total").increment(batch_size as u64);
            counter!("load_documents_inserted_total").increment(outcome.inserted() as u64);
            counter!("load_documents_errored_total").increment(errored as u64);

            // Best-effort observation; cannot fail, never drives control flow.
            self.reporter
                .report(self.aggregator.stats(), self.aggregator.elapsed());

            if hard_failure && self.config.stop_on_hard_failure {
                warn!("{}: stopping after whole-batch failure", source);
                break;
            }
        }

        let after = self.aggregator.stats();
        Ok(SourceSummary {
            source: source.to_string(),
            documents: yielded,
            skipped,
            inserted: after.inserted - before.inserted,
            errored: after.errored - before.errored,
        })
    }

    /// Finalize the run: `Connected/Running → Finished`. Stamps the end time
    /// and returns the frozen stats; further `load` calls are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] from any other state. `Aborted` and
    /// `Finished` are terminal, and an `Idle` driver has no run to finalize.
    pub fn finish(&mut self) -> Result<RunStats> {
        match self.state {
            DriverState::Connected | DriverState::Running => {}
            other => {
                return Err(Error::State(format!("finish called in state {:?}", other)));
            }
        }
        self.state = DriverState::Finished;
        Ok(self.aggregator.finalize())
    }

    /// Release the store handle. The connection is scoped to the driver, so
    /// dropping the driver releases it on every exit path; this accessor
    /// exists for callers that want an explicit, awaited shutdown.
    pub fn release_store(&mut self) -> Option<S> {
        self.store.take()
    }
}
