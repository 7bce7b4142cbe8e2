//! AWS storage backends for Tonelake.
//!
//! Provides `S3Storage`, an implementation of the core `StorageRead` and
//! `StorageWrite` traits over Amazon S3, used when a storage root is an
//! `s3://bucket/prefix` URI.

pub mod error;
pub mod s3;

pub use error::{AwsStorageError, Result};
pub use s3::{S3Config, S3Storage};
