//! Error types for the ETL pipeline.

use thiserror::Error;

/// Errors from pipeline runs.
///
/// Configuration and input-availability errors are fatal and propagate out of
/// `run_pipeline` uncaught; data-shape problems never surface here (they
/// become nulls in the affected column).
#[derive(Debug, Error)]
pub enum EtlError {
    /// Core storage/config failure
    #[error(transparent)]
    Core(#[from] tonelake_core::Error),

    /// Batch operation failure
    #[error(transparent)]
    Tabular(#[from] tonelake_tabular::TabularError),

    /// Parquet encode or table write failure
    #[error(transparent)]
    Parquet(#[from] tonelake_parquet::ParquetError),

    /// S3 backend construction failure
    #[error(transparent)]
    Aws(#[from] tonelake_storage_aws::AwsStorageError),

    /// A source glob matched no files; there is nothing to process
    #[error("No input files match '{0}'")]
    NoInputFiles(String),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, EtlError>;
