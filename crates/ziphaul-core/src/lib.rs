//! Core types and shared utilities for the ziphaul bulk loader.
//!
//! This crate provides:
//! - The [`FileDocument`] model for extracted archive entries
//! - Prometheus metrics helpers shared by the ingest binary

mod document;
pub mod metrics;

pub use document::{ArchiveProvenance, FileDocument};
