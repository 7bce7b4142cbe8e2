//! Tabular column batch types for the Tonelake pipeline.
//!
//! This crate provides the in-memory relational value that every transform
//! stage takes and returns, plus the relational operations the pipeline
//! composes (projection, filter, dedup, join, sort, row numbering).
//!
//! # Design
//!
//! - **Columnar storage**: Data is stored in typed `Vec` per column, not per-row
//! - **Strongly typed**: All column access is through the `Column` enum, no `dyn Any`
//! - **Name canonical**: Column names are the canonical identifier
//! - **No Arrow dependency**: small binary, no framework types at the seams
//! - **Pure stages**: every operation is a function from batches to a batch;
//!   nothing mutates shared state

pub mod batch;
pub mod error;
pub mod ops;

pub use batch::{BatchSchema, Column, ColumnBatch, FieldInfo, FieldType};
pub use error::{Result, TabularError};
pub use ops::{
    dedup, dedup_by_keys, filter_eq_str, inner_join, sort_by_i64, with_row_numbers,
};
