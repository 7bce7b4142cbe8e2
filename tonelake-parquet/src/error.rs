//! Error types for Parquet encoding and table writes.

use thiserror::Error;

/// Errors from Parquet operations.
#[derive(Debug, Error)]
pub enum ParquetError {
    /// Parquet serialization/deserialization failure
    #[error("Encode error: {0}")]
    Encode(String),

    /// Schema mapping error (unsupported shape, missing partition column)
    #[error("Schema error: {0}")]
    Schema(String),

    /// Storage failure while laying out a table
    #[error(transparent)]
    Storage(#[from] tonelake_core::Error),
}

impl ParquetError {
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }
}

impl From<tonelake_tabular::TabularError> for ParquetError {
    fn from(err: tonelake_tabular::TabularError) -> Self {
        ParquetError::Schema(err.to_string())
    }
}

/// Result type for Parquet operations.
pub type Result<T> = std::result::Result<T, ParquetError>;
