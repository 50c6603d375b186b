//! Ziphaul load pipeline components.
//!
//! This crate provides the pipeline for bulk-loading file documents
//! extracted from ZIP archives into a MongoDB collection.
//!
//! # Modules
//!
//! - [`source`] - Document source adapters (ZIP archives)
//! - [`batch`] - Fixed-size batch partitioner
//! - [`store`] - Bulk writer over the target collection
//! - [`stats`] - Run aggregator for cumulative accounting
//! - [`progress`] - Rate / percent-complete reporting
//! - [`driver`] - Pipeline driver and run lifecycle
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ Document Sources │  (ZIP archives)
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │    Partitioner   │  Fixed-size batches, last one short
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   Bulk Writer    │  One insert_many per batch, classified outcome
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  Run Aggregator  │  attempted / inserted / errored, failed batches
//! └──────────────────┘
//! ```
//!
//! The pipeline is at-most-once per batch: a failed batch is recorded and
//! never resubmitted, so a run never silently duplicates documents.

pub mod batch;
pub mod driver;
pub mod error;
pub mod progress;
pub mod source;
pub mod stats;
pub mod store;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export pipeline components for convenience
pub use batch::{partition, Batches};
pub use driver::{DriverState, LoadConfig, PipelineDriver, SourceSummary};
pub use progress::{ProgressReporter, ProgressSnapshot};
pub use stats::{BatchFailure, FailedBatch, RunAggregator, RunStats};
pub use store::{
    BatchItemError, DocumentStore, MongoStore, StoreConfig, WriteOptions, WriteOutcome,
};

// Re-export source trait and adapters
pub use source::{DocumentSource, SourceStats, ZipConfig, ZipSource};
