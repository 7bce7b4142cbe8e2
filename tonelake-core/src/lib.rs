//! # Tonelake Core
//!
//! Shared foundation for the Tonelake pipeline crates.
//!
//! This crate provides:
//! - The workspace-wide `Error` type
//! - Storage trait interfaces (`StorageRead`, `StorageWrite`) with
//!   memory and filesystem implementations
//! - The `LakeConfig` configuration object loaded once at process start
//!
//! ## Design Principles
//!
//! 1. **Async at the I/O seam only**: transforms stay synchronous once data
//!    is in memory
//! 2. **Explicit configuration**: `LakeConfig` is constructed in `main` and
//!    passed by parameter, never read from ambient global state

pub mod config;
pub mod error;
pub mod storage;

pub use config::{AwsConfig, ConfigValue, LakeConfig};
pub use error::{Error, Result};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageRead, StorageWrite};
