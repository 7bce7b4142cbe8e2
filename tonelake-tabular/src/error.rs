//! Error types for tabular operations.

use thiserror::Error;

/// Errors from tabular batch operations.
#[derive(Debug, Error)]
pub enum TabularError {
    /// Schema or structural error (column count mismatch, row count mismatch,
    /// name collision, type mismatch)
    #[error("Schema error: {0}")]
    Schema(String),

    /// A referenced column does not exist in the batch
    #[error("Column not found: {0}")]
    ColumnNotFound(String),
}

/// Result type for tabular operations.
pub type Result<T> = std::result::Result<T, TabularError>;
