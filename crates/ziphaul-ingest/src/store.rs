//! Bulk writer over a MongoDB collection.
//!
//! This module provides the [`DocumentStore`] trait (one batch in, one
//! classified [`WriteOutcome`] out) and its [`MongoStore`] implementation.
//!
//! # Classification
//!
//! A batch submission has exactly three outcomes:
//! - every document accepted ([`WriteOutcome::AllInserted`]),
//! - some documents rejected, recovered from the driver's structured
//!   insert-many error ([`WriteOutcome::PartialFailure`]),
//! - the whole operation lost, e.g. a transport drop mid-batch
//!   ([`WriteOutcome::HardFailure`]).
//!
//! The writer performs exactly one network write per batch, never splits a
//! batch, and never retries. Retry policy belongs to the pipeline driver,
//! which deliberately does not resubmit either: the insert primitives are not
//! idempotent, and a blind retry would duplicate documents.

use crate::error::{Error, Result};
use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use std::env;
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for the target store.
///
/// All values are environment-supplied in production (see [`from_env`]);
/// defaults match the throughput-tuned settings the loader has always used.
///
/// [`from_env`]: StoreConfig::from_env
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// MongoDB connection string. Absence is a fatal configuration error.
    pub uri: String,

    /// Target database name.
    pub database: String,

    /// Target collection name.
    pub collection: String,

    /// Maximum connections in the pool.
    pub max_pool_size: u32,

    /// Minimum connections kept warm in the pool.
    pub min_pool_size: u32,

    /// How long an idle pooled connection is kept before being closed.
    pub max_idle_time: Duration,

    /// Bound on server selection; a timeout surfaces as a connection error,
    /// never a hang.
    pub server_selection_timeout: Duration,

    /// Bound on establishing a single connection.
    pub connect_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            database: "zip_uploads".to_string(),
            collection: "files".to_string(),
            max_pool_size: 50,
            min_pool_size: 10,
            max_idle_time: Duration::from_secs(30),
            server_selection_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl StoreConfig {
    /// Build the configuration from process environment variables:
    /// `MONGODB_URI` (required), `DATABASE_NAME`, `COLLECTION_NAME`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `MONGODB_URI` is not set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`], but with an injected variable lookup so tests do
    /// not touch process-global state.
    ///
    /// [`from_env`]: StoreConfig::from_env
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let uri = lookup("MONGODB_URI").ok_or_else(|| {
            Error::Config("MONGODB_URI is not set in the environment".to_string())
        })?;

        let mut config = Self {
            uri,
            ..Default::default()
        };
        if let Some(database) = lookup("DATABASE_NAME") {
            config.database = database;
        }
        if let Some(collection) = lookup("COLLECTION_NAME") {
            config.collection = collection;
        }

        Ok(config)
    }
}

/// Submission flags for one bulk write.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Ordered mode: the store halts at the first failing item and items
    /// after it are not attempted. Unordered mode continues past failures
    /// within the batch and is the faster default.
    pub ordered: bool,

    /// Skip server-side schema validation per document. A pure throughput
    /// trade-off; the writer never alters document shape based on this flag.
    pub bypass_validation: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            ordered: false,
            bypass_validation: true,
        }
    }
}

/// One rejected item within a batch.
#[derive(Debug, Clone)]
pub struct BatchItemError {
    /// Index of the document within the submitted batch.
    pub index: usize,

    /// Server error code.
    pub code: i32,

    /// Server error message.
    pub message: String,
}

/// Classified result of one batch submission. Produced exactly once per batch.
#[derive(Debug, Clone)]
pub enum WriteOutcome {
    /// Every document in the batch was inserted.
    AllInserted {
        /// Number of documents acknowledged.
        count: usize,
    },

    /// The store accepted part of the batch and rejected individual items.
    PartialFailure {
        /// Documents acknowledged as inserted.
        inserted: usize,
        /// Per-item failures, by index within the batch. In ordered mode the
        /// items after the failing index are simply absent from `inserted`;
        /// they do not appear here.
        errors: Vec<BatchItemError>,
    },

    /// The whole operation failed (transport drop, server unavailable).
    HardFailure {
        /// Human-readable failure reason.
        reason: String,
    },
}

impl WriteOutcome {
    /// Documents acknowledged as inserted by this outcome.
    pub fn inserted(&self) -> usize {
        match self {
            WriteOutcome::AllInserted { count } => *count,
            WriteOutcome::PartialFailure { inserted, .. } => *inserted,
            WriteOutcome::HardFailure { .. } => 0,
        }
    }

    /// Whether the entire batch was lost.
    pub fn is_hard_failure(&self) -> bool {
        matches!(self, WriteOutcome::HardFailure { .. })
    }
}

/// A destination accepting batches of documents as single bulk writes.
///
/// Implementations classify the store's response rather than returning
/// `Err`: every submission yields a [`WriteOutcome`] and the pipeline keeps
/// running. The trait seam also lets tests drive the pipeline against an
/// in-memory double.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Submit one batch as a single logical write operation.
    async fn insert_batch(&self, batch: Vec<Document>, options: &WriteOptions) -> WriteOutcome;
}

/// MongoDB-backed document store.
pub struct MongoStore {
    client: Client,
    collection: Collection<Document>,
}

impl MongoStore {
    /// Connect to MongoDB and verify the deployment responds to `ping`.
    ///
    /// The connection handle is scoped to one run: it is owned by the caller
    /// and released when dropped (or explicitly via [`disconnect`]), on every
    /// exit path.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an unparseable connection string,
    /// [`Error::Connection`] if the deployment is unreachable or server
    /// selection times out.
    ///
    /// [`disconnect`]: MongoStore::disconnect
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| Error::Config(format!("invalid connection string: {}", e)))?;

        options.server_selection_timeout = Some(config.server_selection_timeout);
        options.connect_timeout = Some(config.connect_timeout);
        options.max_pool_size = Some(config.max_pool_size);
        options.min_pool_size = Some(config.min_pool_size);
        options.max_idle_time = Some(config.max_idle_time);

        let client = Client::with_options(options)
            .map_err(|e| Error::Connection(e.to_string()))?;

        // Round-trip to the server so an unreachable deployment fails here,
        // bounded by the server selection timeout, not on the first write.
        client
            .database(&config.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        info!(
            "Connected to MongoDB: database={}, collection={}",
            config.database, config.collection
        );

        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);

        Ok(Self { client, collection })
    }

    /// Approximate number of documents already in the target collection.
    pub async fn estimated_document_count(&self) -> Result<u64> {
        Ok(self.collection.estimated_document_count().await?)
    }

    /// Shut down the client, closing pooled connections.
    pub async fn disconnect(self) {
        self.client.shutdown().await;
        debug!("MongoDB connection closed");
    }

    /// Classify a driver error from `insert_many` into a [`WriteOutcome`].
    ///
    /// An `InsertMany` error carries the per-item write errors; the inserted
    /// count is recovered from them and the submitted batch length (see
    /// [`recovered_insert_count`]). An `InsertMany` error with no per-item
    /// errors, or any other error kind, is a hard failure for the whole
    /// batch.
    fn classify_insert_error(
        batch_len: usize,
        ordered: bool,
        err: mongodb::error::Error,
    ) -> WriteOutcome {
        match *err.kind {
            ErrorKind::InsertMany(ref failure) => {
                let errors: Vec<BatchItemError> = failure
                    .write_errors
                    .iter()
                    .flatten()
                    .map(|e| BatchItemError {
                        index: e.index,
                        code: e.code,
                        message: e.message.clone(),
                    })
                    .collect();
                if errors.is_empty() {
                    return WriteOutcome::HardFailure {
                        reason: err.to_string(),
                    };
                }
                WriteOutcome::PartialFailure {
                    inserted: recovered_insert_count(batch_len, ordered, &errors),
                    errors,
                }
            }
            _ => WriteOutcome::HardFailure {
                reason: err.to_string(),
            },
        }
    }
}

/// Number of documents the server accepted, recovered from the per-item
/// errors of a failed `insert_many`.
///
/// Unordered mode attempts every item, so the accepted count is the batch
/// length minus the rejections. Ordered mode halts at the first failing
/// index; only the items before it were inserted.
fn recovered_insert_count(batch_len: usize, ordered: bool, errors: &[BatchItemError]) -> usize {
    if ordered {
        errors.iter().map(|e| e.index).min().unwrap_or(0)
    } else {
        batch_len.saturating_sub(errors.len())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert_batch(&self, batch: Vec<Document>, options: &WriteOptions) -> WriteOutcome {
        let batch_len = batch.len();
        let result = self
            .collection
            .insert_many(batch)
            .ordered(options.ordered)
            .bypass_document_validation(options.bypass_validation)
            .await;

        match result {
            Ok(insert) => WriteOutcome::AllInserted {
                count: insert.inserted_ids.len(),
            },
            Err(err) => Self::classify_insert_error(batch_len, options.ordered, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_options_default_is_relaxed() {
        let options = WriteOptions::default();
        assert!(!options.ordered);
        assert!(options.bypass_validation);
    }

    #[test]
    fn test_store_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.database, "zip_uploads");
        assert_eq!(config.collection, "files");
        assert_eq!(config.max_pool_size, 50);
        assert_eq!(config.server_selection_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_from_lookup_requires_uri() {
        let result = StoreConfig::from_lookup(|_| None);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_lookup_reads_overrides() {
        let config = StoreConfig::from_lookup(|key| match key {
            "MONGODB_URI" => Some("mongodb://localhost:27017".to_string()),
            "DATABASE_NAME" => Some("archive".to_string()),
            "COLLECTION_NAME" => Some("entries".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.uri, "mongodb://localhost:27017");
        assert_eq!(config.database, "archive");
        assert_eq!(config.collection, "entries");
    }

    #[test]
    fn test_from_lookup_defaults_without_overrides() {
        let config = StoreConfig::from_lookup(|key| match key {
            "MONGODB_URI" => Some("mongodb://localhost:27017".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.database, "zip_uploads");
        assert_eq!(config.collection, "files");
    }

    #[test]
    fn test_outcome_inserted_counts() {
        assert_eq!(WriteOutcome::AllInserted { count: 10 }.inserted(), 10);
        assert_eq!(
            WriteOutcome::PartialFailure {
                inserted: 8,
                errors: vec![],
            }
            .inserted(),
            8
        );
        assert_eq!(
            WriteOutcome::HardFailure {
                reason: "connection reset".to_string(),
            }
            .inserted(),
            0
        );
    }

    fn item_error(index: usize) -> BatchItemError {
        BatchItemError {
            index,
            code: 11000,
            message: "duplicate key".to_string(),
        }
    }

    #[test]
    fn test_recovered_count_unordered_subtracts_rejections() {
        let errors = vec![item_error(2), item_error(5)];
        assert_eq!(recovered_insert_count(10, false, &errors), 8);
    }

    #[test]
    fn test_recovered_count_ordered_stops_at_first_failure() {
        // Ordered mode: items 0..3 inserted, 3 failed, 4..10 never attempted.
        let errors = vec![item_error(3)];
        assert_eq!(recovered_insert_count(10, true, &errors), 3);
    }

    #[test]
    fn test_recovered_count_ordered_failure_at_index_zero() {
        let errors = vec![item_error(0)];
        assert_eq!(recovered_insert_count(10, true, &errors), 0);
    }

    #[test]
    fn test_recovered_count_unordered_all_rejected() {
        let errors: Vec<BatchItemError> = (0..4).map(item_error).collect();
        assert_eq!(recovered_insert_count(4, false, &errors), 0);
    }

    #[test]
    fn test_outcome_hard_failure_flag() {
        assert!(WriteOutcome::HardFailure {
            reason: "x".to_string()
        }
        .is_hard_failure());
        assert!(!WriteOutcome::AllInserted { count: 1 }.is_hard_failure());
    }
}
