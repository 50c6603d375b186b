//! ZIP archive document source.
//!
//! Streams file entries directly out of a ZIP archive, derives per-file
//! metadata (SHA-256 hash, MIME type, inline text content), and emits
//! documents carrying the archive's provenance. Entries are never extracted
//! to disk.

use super::{DocumentSource, SourceStats};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;
use ziphaul_core::{ArchiveProvenance, FileDocument};

/// Configuration for the ZIP source.
#[derive(Debug, Clone)]
pub struct ZipConfig {
    /// Per-entry size ceiling; larger entries are skipped with a warning.
    /// Default: 50 MiB
    pub max_file_size: u64,

    /// Text entries at most this large have their contents inlined into the
    /// document.
    /// Default: 1 MiB
    pub inline_text_limit: u64,
}

impl Default for ZipConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            inline_text_limit: 1024 * 1024,
        }
    }
}

/// ZIP archive document source.
pub struct ZipSource {
    path: PathBuf,
    config: ZipConfig,
}

impl ZipSource {
    /// Create a source over the archive at `path`.
    pub fn new(path: impl Into<PathBuf>, config: ZipConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Archive path this source reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check that the archive exists and its central directory parses.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the file cannot be opened, [`Error::Zip`] if it is
    /// not a readable ZIP archive.
    pub fn validate(&self) -> Result<()> {
        let file = File::open(&self.path)?;
        ZipArchive::new(BufReader::new(file))?;
        debug!("Valid ZIP archive: {}", self.path.display());
        Ok(())
    }

    fn open(&self) -> Result<ZipArchive<BufReader<File>>> {
        let file = File::open(&self.path)?;
        Ok(ZipArchive::new(BufReader::new(file))?)
    }

    /// Build the provenance block shared by every document of this archive.
    fn provenance(&self, total_files: u64) -> Result<ArchiveProvenance> {
        let zip_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::Source(format!("not an archive path: {}", self.path.display()))
            })?;
        let zip_size_bytes = std::fs::metadata(&self.path)?.len();

        Ok(ArchiveProvenance {
            zip_name,
            zip_path: self.path.display().to_string(),
            zip_size_bytes,
            total_files,
            upload_batch_id: ArchiveProvenance::batch_id(Utc::now()),
        })
    }
}

impl DocumentSource for ZipSource {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn process<F>(&mut self, mut handler: F) -> Result<SourceStats>
    where
        F: FnMut(FileDocument) -> Result<bool>,
    {
        let mut archive = self.open()?;

        // First pass over the central directory: file count for provenance.
        let mut total_files = 0u64;
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            if !entry.is_dir() {
                total_files += 1;
            }
        }

        let provenance = self.provenance(total_files)?;
        info!(
            "Processing {}: {} file entries",
            provenance.zip_name, total_files
        );

        let mut stats = SourceStats::default();
        for i in 0..archive.len() {
            let mut entry = match archive.by_index(i) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Entry {}: unreadable, skipped: {}", i, e);
                    stats.read_errors += 1;
                    continue;
                }
            };
            if entry.is_dir() {
                continue;
            }
            stats.entries_seen += 1;

            let entry_path = entry.name().to_string();
            let size = entry.size();
            if size > self.config.max_file_size {
                warn!(
                    "Entry too large, skipped: {} ({} bytes)",
                    entry_path, size
                );
                stats.skipped_oversize += 1;
                continue;
            }

            let mut contents = Vec::with_capacity(size as usize);
            if let Err(e) = entry.read_to_end(&mut contents) {
                warn!("Entry {}: read failed, skipped: {}", entry_path, e);
                stats.read_errors += 1;
                continue;
            }
            stats.bytes_read += contents.len();

            let document = build_document(
                &entry_path,
                &contents,
                entry.last_modified().and_then(entry_modified),
                &provenance,
                &self.config,
            );

            stats.documents += 1;
            if !handler(document)? {
                info!("Handler signaled stop");
                break;
            }
        }

        Ok(stats)
    }
}

/// Derive one document from an entry's path and uncompressed contents.
fn build_document(
    entry_path: &str,
    contents: &[u8],
    modified_date: Option<DateTime<Utc>>,
    provenance: &ArchiveProvenance,
    config: &ZipConfig,
) -> FileDocument {
    let path = Path::new(entry_path);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| entry_path.to_string());

    let file_extension = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    let mime_type = mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string());
    let is_text_file = mime_type
        .as_deref()
        .is_some_and(|m| m.starts_with("text/"));

    // Inline small text contents; everything else travels as metadata only.
    let content = if is_text_file && contents.len() as u64 <= config.inline_text_limit {
        Some(String::from_utf8_lossy(contents).into_owned())
    } else {
        None
    };

    FileDocument {
        file_name,
        file_path: entry_path.to_string(),
        file_size_bytes: contents.len() as u64,
        file_extension,
        mime_type,
        is_text_file,
        file_hash: hex::encode(Sha256::digest(contents)),
        content,
        modified_date,
        ingested_at: None,
        archive: provenance.clone(),
        extra: bson::Document::new(),
    }
}

/// Convert a ZIP entry's DOS timestamp to UTC. The format has no zone, so
/// the stored wall-clock time is taken as UTC.
fn entry_modified(dt: zip::DateTime) -> Option<DateTime<Utc>> {
    let date = chrono::NaiveDate::from_ymd_opt(
        i32::from(dt.year()),
        u32::from(dt.month()),
        u32::from(dt.day()),
    )?;
    let time = chrono::NaiveTime::from_hms_opt(
        u32::from(dt.hour()),
        u32::from(dt.minute()),
        u32::from(dt.second()),
    )?;
    Some(DateTime::from_naive_utc_and_offset(date.and_time(time), Utc))
}
