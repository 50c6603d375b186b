//! Document source adapters.
//!
//! This module provides adapters for the inputs that feed the load pipeline.
//! Each source produces fully-formed [`FileDocument`]s carrying their
//! archive provenance, ready for partitioning and bulk submission.
//!
//! # Available Sources
//!
//! - [`ZipSource`] - Streams file entries out of a ZIP archive
//!
//! # Architecture
//!
//! All sources implement the [`DocumentSource`] trait, which gives the
//! pipeline a uniform interface regardless of where documents come from.

mod zip;

pub use zip::{ZipConfig, ZipSource};

use crate::Result;
use ziphaul_core::FileDocument;

/// A source of documents for the load pipeline.
///
/// Document sources are responsible for:
/// 1. Reading raw entries from their underlying input
/// 2. Deriving per-file metadata (hash, MIME type, timestamps)
/// 3. Attaching archive provenance shared by every document of one input
///
/// The pipeline then handles batching, bulk writes, and accounting.
pub trait DocumentSource {
    /// Human-readable name for this source (used in logs and summaries).
    fn name(&self) -> String;

    /// Process documents from this source, calling the handler for each one.
    ///
    /// The handler returns `Ok(true)` to continue, `Ok(false)` to stop
    /// gracefully, or `Err` to abort with an error.
    ///
    /// A single unreadable entry is counted and skipped; only failures that
    /// make the whole input unusable are returned as `Err`.
    fn process<F>(&mut self, handler: F) -> Result<SourceStats>
    where
        F: FnMut(FileDocument) -> Result<bool>;
}

/// Statistics from processing a document source.
#[derive(Debug, Clone, Default)]
pub struct SourceStats {
    /// File entries encountered (directories excluded).
    pub entries_seen: usize,

    /// Documents handed to the pipeline.
    pub documents: usize,

    /// Entries skipped for exceeding the per-file size ceiling.
    pub skipped_oversize: usize,

    /// Entries skipped because their contents could not be read.
    pub read_errors: usize,

    /// Uncompressed bytes read from the source.
    pub bytes_read: usize,
}
