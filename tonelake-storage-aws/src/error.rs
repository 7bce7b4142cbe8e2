//! Error types for AWS storage backends.

use thiserror::Error;

/// Errors from AWS storage operations.
#[derive(Debug, Error)]
pub enum AwsStorageError {
    /// No region resolved from config or environment
    #[error("No AWS region configured")]
    MissingRegion,

    /// Malformed `s3://` URI
    #[error("Invalid S3 URI: {0}")]
    InvalidUri(String),

    /// S3 operation failure
    #[error("S3 error: {0}")]
    S3(String),
}

impl AwsStorageError {
    pub fn s3(msg: impl Into<String>) -> Self {
        Self::S3(msg.into())
    }

    pub fn invalid_uri(msg: impl Into<String>) -> Self {
        Self::InvalidUri(msg.into())
    }
}

/// Result type for AWS storage operations.
pub type Result<T> = std::result::Result<T, AwsStorageError>;

impl From<AwsStorageError> for tonelake_core::Error {
    fn from(err: AwsStorageError) -> Self {
        tonelake_core::Error::storage(err.to_string())
    }
}
