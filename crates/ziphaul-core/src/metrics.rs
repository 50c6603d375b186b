//! Prometheus metrics helpers for the ziphaul loader.
//!
//! This module provides centralized metrics initialization and common metric
//! definitions used across ziphaul components.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ziphaul_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Initialize the Prometheus recorder
//!     let handle = init_metrics();
//!
//!     // Start the HTTP server for /metrics endpoint
//!     start_metrics_server(9091, handle).await.unwrap();
//!
//!     // Now use metrics anywhere in your code
//!     use metrics::{counter, gauge};
//!     counter!("load_documents_total").increment(1);
//!     gauge!("load_documents_per_second").set(42.0);
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: component name (`load_` for the pipeline, `extract_` for the
//!   ZIP source)
//! - Suffix: unit or type (`_total`, `_bytes`, `_seconds`)

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// This must be called once at startup before any metrics are recorded.
/// Returns a handle that can be used with [`start_metrics_server`].
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    // Register all metric descriptions upfront
    register_common_metrics();

    handle
}

/// Try to initialize the Prometheus metrics recorder.
///
/// Like [`init_metrics`] but returns `None` if the recorder is already
/// installed, instead of panicking. Useful for tests or optional metrics.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().ok()
}

/// Start the Prometheus metrics HTTP server.
///
/// Serves the `/metrics` endpoint on the specified port.
/// This spawns a background task and returns immediately.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    // Spawn the server in the background
    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, app).await.unwrap();
    });

    Ok(())
}

/// Register descriptions for the metrics ziphaul emits.
///
/// Called automatically by [`init_metrics`].
fn register_common_metrics() {
    // =========================================================================
    // Bulk-Load Pipeline Metrics
    // =========================================================================

    describe_counter!(
        "load_documents_total",
        "Documents submitted to the store across all batches"
    );
    describe_counter!(
        "load_documents_inserted_total",
        "Documents acknowledged as inserted by the store"
    );
    describe_counter!(
        "load_documents_errored_total",
        "Documents rejected per-item or lost to failed batches"
    );
    describe_counter!("load_batches_total", "Batches submitted to the store");
    describe_counter!(
        "load_batches_failed_total",
        "Batches that failed partially or entirely"
    );
    describe_gauge!(
        "load_documents_per_second",
        "Current insertion rate (documents/sec)"
    );
    describe_gauge!(
        "load_percent_complete",
        "Progress through the expected document count, when known"
    );
    describe_gauge!(
        "loader_running",
        "Whether a load run is currently in progress (1=yes, 0=no)"
    );

    // =========================================================================
    // ZIP Extraction Metrics
    // =========================================================================

    describe_counter!(
        "extract_archives_total",
        "ZIP archives processed by the extraction source"
    );
    describe_counter!(
        "extract_entries_total",
        "Archive entries examined (directories excluded)"
    );
    describe_counter!("extract_documents_total", "Entries turned into documents");
    describe_counter!(
        "extract_entries_skipped_total",
        "Entries skipped for exceeding the size limit"
    );
    describe_counter!(
        "extract_read_errors_total",
        "Entries skipped because their content could not be read"
    );
    describe_counter!(
        "extract_bytes_total",
        "Uncompressed bytes read from archive entries"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    // Ensure metrics are initialized exactly once for all tests
    static INIT: Once = Once::new();

    fn ensure_metrics_init() {
        INIT.call_once(|| {
            let _ = try_init_metrics();
        });
    }

    #[test]
    fn test_try_init_metrics_idempotent() {
        // First call may or may not succeed (depends on test order)
        let handle1 = try_init_metrics();

        // Second call should definitely return None (already installed)
        let handle2 = try_init_metrics();

        // At most one should succeed
        assert!(handle1.is_none() || handle2.is_none());
    }

    #[test]
    fn test_register_common_metrics_does_not_panic() {
        ensure_metrics_init();
        // This should be idempotent and not panic
        register_common_metrics();
        register_common_metrics();
    }
}
