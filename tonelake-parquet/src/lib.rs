//! Parquet output for Tonelake tables.
//!
//! This crate turns `ColumnBatch` values into Parquet files and lays them out
//! as tables under a storage root:
//!
//! - `encode` maps batch columns onto the `parquet` crate's typed column
//!   writers (and back, for read verification)
//! - `writer` handles the table layout: hive-style partition directories,
//!   overwrite-on-conflict, deterministic part file names

pub mod encode;
pub mod error;
pub mod writer;

pub use encode::{encode_batch, read_rows, CellValue};
pub use error::{ParquetError, Result};
pub use writer::write_table;
