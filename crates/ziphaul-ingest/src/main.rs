//! Bulk loader for ZIP archives into MongoDB.
//!
//! Reads one or more ZIP archives, turns every file entry into a metadata
//! document (hash, MIME type, inline text content), and bulk-inserts the
//! documents in fixed-size batches.
//!
//! # Pipeline
//!
//! ```text
//! [ZIP Archives] → [Extraction] → [Partitioner] → [Bulk Writer] → [MongoDB]
//!                                                       ↓
//!                                                 Run Aggregator
//! ```
//!
//! # Usage
//!
//! ```bash
//! # Single archive
//! MONGODB_URI=mongodb://localhost:27017 ziphaul reports.zip
//!
//! # Directory of archives, recursive, custom target
//! ziphaul ./drops/ -r --database archive --collection files
//!
//! # With metrics
//! ziphaul reports.zip --metrics-port 9091
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use metrics::{counter, gauge};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;
use ziphaul_core::metrics::{init_metrics, start_metrics_server};
use ziphaul_ingest::{
    BatchFailure, DocumentSource, LoadConfig, MongoStore, PipelineDriver, RunStats, SourceSummary,
    StoreConfig, WriteOptions, ZipConfig, ZipSource,
};

/// Bulk-load files from ZIP archives into a MongoDB collection.
#[derive(Parser, Debug)]
#[command(name = "ziphaul")]
#[command(about = "Load ZIP archive contents into MongoDB as metadata documents")]
struct Args {
    /// ZIP archive or directory containing ZIP archives
    path: PathBuf,

    /// Recurse into subdirectories when collecting archives
    #[arg(short, long, default_value = "false")]
    recursive: bool,

    /// Documents per bulk write
    #[arg(long, default_value = "1000")]
    batch_size: usize,

    /// Ordered writes: a batch halts at the first rejected document
    #[arg(long, default_value = "false")]
    ordered: bool,

    /// Enforce server-side schema validation (off by default for throughput)
    #[arg(long, default_value = "false")]
    validate: bool,

    /// Stop the run after a whole-batch failure instead of continuing
    #[arg(long, default_value = "false")]
    stop_on_error: bool,

    /// Target database (overrides DATABASE_NAME)
    #[arg(long)]
    database: Option<String>,

    /// Target collection (overrides COLLECTION_NAME)
    #[arg(long)]
    collection: Option<String>,

    /// Limit number of archives to process (for testing)
    #[arg(long)]
    limit: Option<usize>,

    /// Per-entry size ceiling in MiB; larger entries are skipped
    #[arg(long, default_value = "50")]
    max_file_size_mb: u64,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, default_value = "9091")]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();

    // Initialize metrics and start server (if enabled)
    if args.metrics_port > 0 {
        let metrics_handle = init_metrics();
        start_metrics_server(args.metrics_port, metrics_handle).await?;
        gauge!("loader_running").set(1.0);
    }

    let store_config = store_config(&args)?;
    let archives = collect_archives(&args.path, args.recursive, args.limit)?;
    if archives.is_empty() {
        bail!("No ZIP archives found under {}", args.path.display());
    }
    info!("Found {} ZIP archives to process", archives.len());

    let load_config = LoadConfig {
        batch_size: args.batch_size,
        write: WriteOptions {
            ordered: args.ordered,
            bypass_validation: !args.validate,
        },
        stop_on_hard_failure: args.stop_on_error,
    };
    let zip_config = ZipConfig {
        max_file_size: args.max_file_size_mb * 1024 * 1024,
        ..Default::default()
    };

    let mut driver = PipelineDriver::new(load_config)?;
    driver
        .connect(&store_config)
        .await
        .context("Failed to connect to MongoDB")?;

    let cancel = driver.cancel_flag();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, stopping after the current batch");
        cancel.store(true, Ordering::SeqCst);
    })
    .context("Failed to install interrupt handler")?;

    let cancel = driver.cancel_flag();
    let mut summaries = Vec::new();
    for (idx, archive) in archives.iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            break;
        }
        info!(
            "[{}/{}] Processing: {}",
            idx + 1,
            archives.len(),
            archive.display()
        );

        match process_archive(&mut driver, archive, &zip_config).await {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                warn!("Skipping {}: {}", archive.display(), e);
                counter!("extract_read_errors_total").increment(1);
                if args.stop_on_error {
                    break;
                }
            }
        }
    }

    let stats = driver.finish().context("Failed to finalize run")?;
    if let Some(store) = driver.release_store() {
        match store.estimated_document_count().await {
            Ok(count) => info!("Target collection now holds ~{} documents", count),
            Err(e) => warn!("Could not read collection count: {}", e),
        }
        store.disconnect().await;
    }

    gauge!("loader_running").set(0.0);
    print_summary(&summaries, &stats);

    if !summaries.iter().any(SourceSummary::fully_processed) {
        bail!("No archive was fully processed");
    }
    Ok(())
}

/// Environment configuration with CLI overrides layered on top.
fn store_config(args: &Args) -> Result<StoreConfig> {
    let mut config = StoreConfig::from_env()?;
    if let Some(ref database) = args.database {
        config.database = database.clone();
    }
    if let Some(ref collection) = args.collection {
        config.collection = collection.clone();
    }
    Ok(config)
}

/// Run one archive through extraction and the load pipeline.
async fn process_archive(
    driver: &mut PipelineDriver<MongoStore>,
    path: &Path,
    zip_config: &ZipConfig,
) -> Result<SourceSummary> {
    let mut source = ZipSource::new(path, zip_config.clone());
    source
        .validate()
        .with_context(|| format!("Invalid ZIP archive: {}", path.display()))?;

    let mut documents = Vec::new();
    let source_stats = source.process(|doc| {
        documents.push(doc);
        Ok(true)
    })?;

    counter!("extract_archives_total").increment(1);
    counter!("extract_entries_total").increment(source_stats.entries_seen as u64);
    counter!("extract_documents_total").increment(source_stats.documents as u64);
    counter!("extract_entries_skipped_total").increment(source_stats.skipped_oversize as u64);
    counter!("extract_read_errors_total").increment(source_stats.read_errors as u64);
    counter!("extract_bytes_total").increment(source_stats.bytes_read as u64);

    if source_stats.skipped_oversize > 0 || source_stats.read_errors > 0 {
        warn!(
            "{}: {} oversize entries skipped, {} read errors",
            source.name(),
            source_stats.skipped_oversize,
            source_stats.read_errors
        );
    }

    driver.set_total_expected(Some(driver.stats().attempted + documents.len()));
    Ok(driver.load(&source.name(), documents).await?)
}

fn collect_archives(input: &Path, recursive: bool, limit: Option<usize>) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();

    if input.is_file() {
        archives.push(input.to_path_buf());
    } else if input.is_dir() {
        if recursive {
            for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if path.is_file() && has_zip_extension(path) {
                    archives.push(path.to_path_buf());
                }
            }
        } else {
            archives = fs::read_dir(input)
                .with_context(|| format!("Failed to read directory: {}", input.display()))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && has_zip_extension(p))
                .collect();
        }

        // Sort for deterministic processing order
        archives.sort();
    } else {
        bail!("Input path does not exist: {}", input.display());
    }

    // Apply limit if specified
    if let Some(limit) = limit {
        archives.truncate(limit);
    }

    Ok(archives)
}

fn has_zip_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

fn print_summary(summaries: &[SourceSummary], stats: &RunStats) {
    println!("\n══════════════════════════════════════════════════════════════════");
    println!("SUMMARY");
    println!("══════════════════════════════════════════════════════════════════\n");

    for summary in summaries {
        let status = if summary.fully_processed() {
            "ok"
        } else {
            "INCOMPLETE"
        };
        println!(
            "{:<40} {:>8} docs  {:>8} inserted  {:>6} errored  [{}]",
            summary.source, summary.documents, summary.inserted, summary.errored, status
        );
    }
    println!();
    println!("Archives processed: {:>12}", summaries.len());
    println!("Documents attempted:{:>12}", stats.attempted);
    println!("Documents inserted: {:>12}", stats.inserted);
    println!("Documents errored:  {:>12}", stats.errored);
    println!("Batches processed:  {:>12}", stats.batches_processed);
    println!("Batches failed:     {:>12}", stats.failed_batches.len());

    for failed in &stats.failed_batches {
        match &failed.failure {
            BatchFailure::PerItem(errors) => {
                println!(
                    "  - batch {} ({}): {} documents rejected",
                    failed.batch_index,
                    failed.source,
                    errors.len()
                );
                for error in errors.iter().take(5) {
                    println!(
                        "      index {}: [{}] {}",
                        error.index, error.code, error.message
                    );
                }
                if errors.len() > 5 {
                    println!("      ... and {} more", errors.len() - 5);
                }
            }
            BatchFailure::Whole(reason) => {
                println!(
                    "  - batch {} ({}): whole batch lost: {}",
                    failed.batch_index, failed.source, reason
                );
            }
        }
    }

    println!();
    if let Some(duration) = stats.duration() {
        let secs = duration.num_milliseconds() as f64 / 1000.0;
        println!("Elapsed time:       {:>12.2}s", secs);
        if secs > 0.0 && stats.inserted > 0 {
            println!(
                "Throughput:         {:>12.0} docs/sec",
                stats.inserted as f64 / secs
            );
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs::File;
    use tempfile::TempDir;
    use ziphaul_ingest::FailedBatch;

    // =========================================================================
    // collect_archives tests
    // =========================================================================

    #[test]
    fn test_collect_archives_single_file() {
        let tmp = TempDir::new().unwrap();
        let file_path = tmp.path().join("data.zip");
        File::create(&file_path).unwrap();

        let archives = collect_archives(&file_path, false, None).unwrap();
        assert_eq!(archives, vec![file_path]);
    }

    #[test]
    fn test_collect_archives_filters_extension() {
        let tmp = TempDir::new().unwrap();
        File::create(tmp.path().join("a.zip")).unwrap();
        File::create(tmp.path().join("b.ZIP")).unwrap();
        File::create(tmp.path().join("c.tar")).unwrap();
        File::create(tmp.path().join("d.zip.bak")).unwrap();

        let archives = collect_archives(tmp.path(), false, None).unwrap();
        assert_eq!(archives.len(), 2);
    }

    #[test]
    fn test_collect_archives_sorted_order() {
        let tmp = TempDir::new().unwrap();
        File::create(tmp.path().join("z.zip")).unwrap();
        File::create(tmp.path().join("a.zip")).unwrap();
        File::create(tmp.path().join("m.zip")).unwrap();

        let archives = collect_archives(tmp.path(), false, None).unwrap();
        let names: Vec<_> = archives
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.zip", "m.zip", "z.zip"]);
    }

    #[test]
    fn test_collect_archives_non_recursive_skips_subdirs() {
        let tmp = TempDir::new().unwrap();
        File::create(tmp.path().join("top.zip")).unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        File::create(tmp.path().join("sub/nested.zip")).unwrap();

        let archives = collect_archives(tmp.path(), false, None).unwrap();
        assert_eq!(archives.len(), 1);
    }

    #[test]
    fn test_collect_archives_recursive_finds_nested() {
        let tmp = TempDir::new().unwrap();
        File::create(tmp.path().join("top.zip")).unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        File::create(tmp.path().join("a/b/deep.zip")).unwrap();

        let archives = collect_archives(tmp.path(), true, None).unwrap();
        assert_eq!(archives.len(), 2);
    }

    #[test]
    fn test_collect_archives_with_limit() {
        let tmp = TempDir::new().unwrap();
        for i in 0..10 {
            File::create(tmp.path().join(format!("{:02}.zip", i))).unwrap();
        }

        let archives = collect_archives(tmp.path(), false, Some(3)).unwrap();
        assert_eq!(archives.len(), 3);
    }

    #[test]
    fn test_collect_archives_nonexistent_path() {
        let result = collect_archives(Path::new("/nonexistent/path"), false, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_collect_archives_empty_directory() {
        let tmp = TempDir::new().unwrap();
        let archives = collect_archives(tmp.path(), false, None).unwrap();
        assert!(archives.is_empty());
    }

    // =========================================================================
    // print_summary tests (smoke test - just ensure it doesn't panic)
    // =========================================================================

    #[test]
    fn test_print_summary_does_not_panic() {
        let summaries = vec![
            SourceSummary {
                source: "a.zip".to_string(),
                documents: 7395,
                skipped: 0,
                inserted: 7390,
                errored: 5,
            },
            SourceSummary {
                source: "b.zip".to_string(),
                documents: 100,
                skipped: 0,
                inserted: 100,
                errored: 0,
            },
        ];

        let stats = RunStats {
            attempted: 7495,
            inserted: 7490,
            errored: 5,
            batches_processed: 9,
            started_at: Utc::now(),
            finished_at: Some(Utc::now()),
            failed_batches: vec![FailedBatch {
                source: "a.zip".to_string(),
                batch_index: 3,
                batch_size: 1000,
                failure: BatchFailure::Whole("connection reset".to_string()),
            }],
        };

        print_summary(&summaries, &stats);
    }

    #[test]
    fn test_print_summary_zero_values() {
        let stats = RunStats {
            attempted: 0,
            inserted: 0,
            errored: 0,
            batches_processed: 0,
            started_at: Utc::now(),
            finished_at: None,
            failed_batches: Vec::new(),
        };

        print_summary(&[], &stats);
    }
}
