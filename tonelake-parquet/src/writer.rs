//! Partitioned, overwriting table writes.
//!
//! A table is a directory of Parquet part files under a storage root.
//! Partition columns become hive-style `col=value` path segments in the
//! declared column order and are removed from the file payload. Part file
//! names are deterministic and partitions are written in sorted path order,
//! so a re-run over identical input rewrites identical objects.
//!
//! Overwrite semantics: every object under the table root is deleted before
//! the new layout is written. There is no commit protocol; a run that fails
//! mid-write leaves whatever it had written so far (the pipeline contract is
//! full re-execution, not recovery).

use std::collections::BTreeMap;

use tonelake_core::Storage;
use tonelake_tabular::{Column, ColumnBatch};
use tracing::{debug, info};

use crate::encode::encode_batch;
use crate::error::{ParquetError, Result};

const PART_FILE: &str = "part-00000.parquet";

/// Render one partition cell as a path segment value.
fn partition_value(column: &Column, idx: usize) -> String {
    if column.is_null(idx) {
        return "__NULL__".to_string();
    }
    match column {
        Column::Boolean(v) => v[idx].map(|b| b.to_string()).unwrap_or_default(),
        Column::Int64(v) | Column::Timestamp(v) => {
            v[idx].map(|n| n.to_string()).unwrap_or_default()
        }
        Column::Float64(v) => v[idx].map(|f| f.to_string()).unwrap_or_default(),
        Column::String(v) => v[idx].clone().unwrap_or_default(),
    }
}

/// Write a batch as a table under `table_root`.
///
/// With an empty `partition_by`, the table is a single part file. Otherwise
/// rows are grouped by their partition-column values and each group becomes
/// one part file under its `col=value/...` directory. An empty batch still
/// writes one (empty) part file so the table stays structurally valid for
/// readers.
pub async fn write_table(
    storage: &dyn Storage,
    table_root: &str,
    batch: &ColumnBatch,
    partition_by: &[&str],
) -> Result<()> {
    let root = table_root.trim_end_matches('/');

    let mut partition_cols = Vec::with_capacity(partition_by.len());
    for name in partition_by {
        let col = batch.column(name).ok_or_else(|| {
            ParquetError::schema(format!(
                "Partition column '{}' not in table '{}'",
                name, root
            ))
        })?;
        partition_cols.push(col);
    }

    // Overwrite-on-conflict: clear the previous table layout first
    let stale = storage.list_prefix(&format!("{}/", root)).await?;
    for key in &stale {
        storage.delete(key).await?;
    }
    if !stale.is_empty() {
        debug!(table = root, removed = stale.len(), "Cleared previous table objects");
    }

    if partition_by.is_empty() {
        let bytes = encode_batch(batch)?;
        storage
            .write_bytes(&format!("{}/{}", root, PART_FILE), &bytes)
            .await?;
        info!(table = root, rows = batch.num_rows, "Wrote table");
        return Ok(());
    }

    let payload = batch.drop_columns(partition_by)?;

    if batch.is_empty() {
        let bytes = encode_batch(&payload)?;
        storage
            .write_bytes(&format!("{}/{}", root, PART_FILE), &bytes)
            .await?;
        info!(table = root, rows = 0, "Wrote empty table");
        return Ok(());
    }

    // Group rows by rendered partition path; BTreeMap keeps output order
    // stable across runs
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for i in batch.row_indices() {
        let dir = partition_by
            .iter()
            .zip(&partition_cols)
            .map(|(name, col)| format!("{}={}", name, partition_value(col, i)))
            .collect::<Vec<_>>()
            .join("/");
        groups.entry(dir).or_default().push(i);
    }

    let num_partitions = groups.len();
    for (dir, indices) in groups {
        let part = payload.filter_by_indices(&indices);
        let bytes = encode_batch(&part)?;
        storage
            .write_bytes(&format!("{}/{}/{}", root, dir, PART_FILE), &bytes)
            .await?;
    }

    info!(
        table = root,
        rows = batch.num_rows,
        partitions = num_partitions,
        "Wrote partitioned table"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tonelake_core::{MemoryStorage, StorageRead};
    use tonelake_tabular::{BatchSchema, ColumnBatch, FieldInfo, FieldType};

    use super::*;
    use crate::encode::{read_rows, CellValue};

    fn plays_batch() -> ColumnBatch {
        let schema = Arc::new(BatchSchema::new(vec![
            FieldInfo::nullable("song_id", FieldType::String),
            FieldInfo::nullable("year", FieldType::Int64),
            FieldInfo::nullable("month", FieldType::Int64),
        ]));
        let columns = vec![
            Column::String(vec![Some("S1".into()), Some("S2".into()), Some("S3".into())]),
            Column::Int64(vec![Some(2018), Some(2018), Some(2019)]),
            Column::Int64(vec![Some(11), Some(11), Some(1)]),
        ];
        ColumnBatch::new(schema, columns).unwrap()
    }

    #[tokio::test]
    async fn test_partitioned_write_layout() {
        let storage = MemoryStorage::new();
        let batch = plays_batch();

        write_table(&storage, "plays/plays_table.parquet", &batch, &["year", "month"])
            .await
            .unwrap();

        let keys = storage.list_prefix("plays/").await.unwrap();
        assert_eq!(
            keys,
            vec![
                "plays/plays_table.parquet/year=2018/month=11/part-00000.parquet",
                "plays/plays_table.parquet/year=2019/month=1/part-00000.parquet",
            ]
        );

        // Partition columns are not duplicated in the payload
        let bytes = storage.read_bytes(&keys[0]).await.unwrap();
        let rows = read_rows(&bytes).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[0][0], ("song_id".to_string(), CellValue::String("S1".into())));
    }

    #[tokio::test]
    async fn test_overwrite_removes_stale_partitions() {
        let storage = MemoryStorage::new();
        storage.insert(
            "plays/plays_table.parquet/year=1999/month=9/part-00000.parquet",
            &b"stale"[..],
        );

        write_table(
            &storage,
            "plays/plays_table.parquet",
            &plays_batch(),
            &["year", "month"],
        )
        .await
        .unwrap();

        let keys = storage.list_prefix("plays/").await.unwrap();
        assert!(!keys.iter().any(|k| k.contains("year=1999")));
        assert_eq!(keys.len(), 2);
    }

    #[tokio::test]
    async fn test_unpartitioned_and_empty_writes() {
        let storage = MemoryStorage::new();

        let batch = plays_batch();
        write_table(&storage, "artists/artists_table.parquet", &batch, &[])
            .await
            .unwrap();
        let keys = storage.list_prefix("artists/").await.unwrap();
        assert_eq!(keys, vec!["artists/artists_table.parquet/part-00000.parquet"]);

        // Empty partitioned batch still produces a readable table
        let empty = ColumnBatch::empty(Arc::clone(&batch.schema));
        write_table(&storage, "plays/plays_table.parquet", &empty, &["year", "month"])
            .await
            .unwrap();
        let keys = storage.list_prefix("plays/").await.unwrap();
        assert_eq!(keys, vec!["plays/plays_table.parquet/part-00000.parquet"]);
        let rows = read_rows(&storage.read_bytes(&keys[0]).await.unwrap()).unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_missing_partition_column_rejected() {
        let storage = MemoryStorage::new();
        let err = write_table(&storage, "t", &plays_batch(), &["nope"])
            .await
            .unwrap_err();
        assert!(matches!(err, ParquetError::Schema(_)));
    }
}
