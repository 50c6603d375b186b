//! Document model for extracted archive entries.
//!
//! Every file pulled out of a ZIP archive becomes one [`FileDocument`]: a
//! typed set of provenance fields plus an open extension map for anything a
//! caller wants to attach. The typed fields keep the edges of the system
//! strongly typed while the store itself stays schemaless.

use bson::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance of the archive a document was extracted from.
///
/// Built once per archive and flattened into every document it yields, so
/// each stored document is self-describing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveProvenance {
    /// Archive file name (e.g. `reports.zip`).
    pub zip_name: String,

    /// Path the archive was read from.
    pub zip_path: String,

    /// Size of the archive file on disk, in bytes.
    pub zip_size_bytes: u64,

    /// Number of file entries in the archive (directories excluded).
    pub total_files: u64,

    /// Identifier shared by every document of one loader run,
    /// formatted `batch_YYYYMMDD_HHMMSS`.
    pub upload_batch_id: String,
}

impl ArchiveProvenance {
    /// Batch identifier for a run starting at `at`.
    pub fn batch_id(at: DateTime<Utc>) -> String {
        format!("batch_{}", at.format("%Y%m%d_%H%M%S"))
    }
}

/// One extracted file, ready to be queued for bulk insertion.
///
/// Immutable once queued: the pipeline stamps [`ingested_at`] at batch-build
/// time and does not touch the document afterwards.
///
/// Timestamps serialize as RFC 3339 strings.
///
/// [`ingested_at`]: FileDocument::ingested_at
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDocument {
    /// Base name of the file.
    pub file_name: String,

    /// Path of the entry relative to the archive root.
    pub file_path: String,

    /// Uncompressed size in bytes.
    pub file_size_bytes: u64,

    /// Lowercased extension including the dot, empty if none.
    pub file_extension: String,

    /// MIME type guessed from the path, if any.
    pub mime_type: Option<String>,

    /// Whether the MIME type is `text/*`.
    pub is_text_file: bool,

    /// SHA-256 of the file content, hex-encoded.
    pub file_hash: String,

    /// Inlined content, present only for small text files.
    pub content: Option<String>,

    /// Last-modified timestamp recorded in the archive entry, if present.
    pub modified_date: Option<DateTime<Utc>>,

    /// When the pipeline queued this document for writing.
    /// `None` until stamped by the driver.
    pub ingested_at: Option<DateTime<Utc>>,

    /// Provenance of the originating archive.
    #[serde(flatten)]
    pub archive: ArchiveProvenance,

    /// Open extension mapping for heterogeneous payload fields.
    #[serde(flatten)]
    pub extra: Document,
}

impl FileDocument {
    /// Convert into a BSON document for submission to the store.
    pub fn to_document(&self) -> Result<Document, bson::ser::Error> {
        bson::to_document(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn sample() -> FileDocument {
        FileDocument {
            file_name: "readme.txt".to_string(),
            file_path: "docs/readme.txt".to_string(),
            file_size_bytes: 42,
            file_extension: ".txt".to_string(),
            mime_type: Some("text/plain".to_string()),
            is_text_file: true,
            file_hash: "ab".repeat(32),
            content: Some("hello".to_string()),
            modified_date: None,
            ingested_at: None,
            archive: ArchiveProvenance {
                zip_name: "a.zip".to_string(),
                zip_path: "/data/a.zip".to_string(),
                zip_size_bytes: 1000,
                total_files: 3,
                upload_batch_id: "batch_20250101_000000".to_string(),
            },
            extra: Document::new(),
        }
    }

    #[test]
    fn test_to_document_flattens_provenance() {
        let doc = sample().to_document().unwrap();
        assert_eq!(doc.get_str("file_name").unwrap(), "readme.txt");
        assert_eq!(doc.get_str("zip_name").unwrap(), "a.zip");
        assert_eq!(doc.get_i64("zip_size_bytes").unwrap(), 1000);
    }

    #[test]
    fn test_to_document_flattens_extra_fields() {
        let mut d = sample();
        d.extra = doc! { "department": "finance" };
        let doc = d.to_document().unwrap();
        assert_eq!(doc.get_str("department").unwrap(), "finance");
    }

    #[test]
    fn test_timestamps_serialize_as_strings() {
        let mut d = sample();
        d.ingested_at = Some("2025-06-01T12:00:00Z".parse().unwrap());
        let doc = d.to_document().unwrap();
        let stamped = doc.get_str("ingested_at").unwrap();
        assert!(stamped.starts_with("2025-06-01T12:00:00"));
    }

    #[test]
    fn test_batch_id_format() {
        let at = "2025-06-01T12:34:56Z".parse().unwrap();
        assert_eq!(ArchiveProvenance::batch_id(at), "batch_20250601_123456");
    }
}
