//! # Tonelake ETL
//!
//! Transforms two raw, append-only JSON event feeds — a song-metadata
//! catalog and a user-activity log — into a five-table star schema
//! (`songs`, `artists`, `users`, `time`, `songplays`) written as partitioned
//! Parquet under an output storage root.
//!
//! The pipeline is a directed sequence of pure stages over `ColumnBatch`
//! values; storage I/O happens only at the edges (JSON reads in,
//! Parquet writes out). Each run recomputes every table in full and
//! overwrites the previous layout.

pub mod error;
pub mod event_time;
pub mod pipeline;
pub mod source;
pub mod tables;
pub mod transform;

pub use error::{EtlError, Result};
pub use pipeline::{run_pipeline, storage_for_root};
