//! Error types for the bulk-load pipeline.
//!
//! Per-item write rejections and whole-batch store failures are not errors in
//! this taxonomy: they are [`WriteOutcome`] variants, recorded by the run
//! aggregator while the run continues. Only configuration and connection
//! failures abort a run.
//!
//! [`WriteOutcome`]: crate::store::WriteOutcome

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration (bad batch size, missing connection string).
    /// Fatal: surfaces before any write is attempted.
    #[error("configuration error: {0}")]
    Config(String),

    /// The store could not be reached or timed out during connection setup.
    /// Fatal for the run.
    #[error("connection error: {0}")]
    Connection(String),

    /// MongoDB driver error outside of batch submission.
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// ZIP archive error (corrupt archive, unsupported method).
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A document source could not be opened or enumerated.
    #[error("source error: {0}")]
    Source(String),

    /// An operation was invoked in the wrong driver state.
    #[error("driver state error: {0}")]
    State(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_display() {
        let err = Error::Config("batch size must be greater than zero".to_string());
        assert!(err.to_string().contains("configuration error"));
        assert!(err.to_string().contains("batch size"));
    }

    #[test]
    fn test_connection_display() {
        let err = Error::Connection("server selection timed out".to_string());
        assert!(err.to_string().contains("connection error"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
