//! Relational operations over column batches.
//!
//! Every operation is a pure function: batches in, batch out. Row selection
//! is expressed as index vectors handed to `ColumnBatch::filter_by_indices`,
//! so columns are materialized once per stage.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::batch::{BatchSchema, Column, ColumnBatch};
use crate::error::{Result, TabularError};

/// A single cell value reduced to a hashable key component.
///
/// Floats key by bit pattern: both join sides parse the same JSON text, so
/// equal literals produce identical bits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyValue {
    Null,
    Bool(bool),
    Int(i64),
    FloatBits(u64),
    Str(String),
    Ts(i64),
}

fn key_at(col: &Column, idx: usize) -> KeyValue {
    match col {
        Column::Boolean(v) => v[idx].map_or(KeyValue::Null, KeyValue::Bool),
        Column::Int64(v) => v[idx].map_or(KeyValue::Null, KeyValue::Int),
        Column::Float64(v) => v[idx].map_or(KeyValue::Null, |f| KeyValue::FloatBits(f.to_bits())),
        Column::String(v) => v[idx]
            .as_ref()
            .map_or(KeyValue::Null, |s| KeyValue::Str(s.clone())),
        Column::Timestamp(v) => v[idx].map_or(KeyValue::Null, KeyValue::Ts),
    }
}

fn row_key(columns: &[&Column], idx: usize) -> Vec<KeyValue> {
    columns.iter().map(|c| key_at(c, idx)).collect()
}

/// Keep rows where the named string column equals `value`.
///
/// Null cells never match.
pub fn filter_eq_str(batch: &ColumnBatch, column: &str, value: &str) -> Result<ColumnBatch> {
    let col = batch.require_column(column)?;
    let indices: Vec<usize> = batch
        .row_indices()
        .filter(|&i| col.get_string(i) == Some(value))
        .collect();
    Ok(batch.filter_by_indices(&indices))
}

/// Remove exact-duplicate rows across the full column set, keeping the first
/// occurrence of each distinct row.
pub fn dedup(batch: &ColumnBatch) -> ColumnBatch {
    let columns: Vec<&Column> = batch.columns.iter().collect();
    let mut seen: HashSet<Vec<KeyValue>> = HashSet::with_capacity(batch.num_rows);
    let mut keep = Vec::new();

    for i in batch.row_indices() {
        if seen.insert(row_key(&columns, i)) {
            keep.push(i);
        }
    }

    batch.filter_by_indices(&keep)
}

/// Remove duplicate rows sharing the same values in the key columns, keeping
/// the **last** occurrence of each key in row order.
///
/// Retained rows keep their relative order. Used for `users`, where the
/// last-seen attribute values (notably `level`) win.
pub fn dedup_by_keys(batch: &ColumnBatch, keys: &[&str]) -> Result<ColumnBatch> {
    let key_cols: Vec<&Column> = keys
        .iter()
        .map(|k| batch.require_column(k))
        .collect::<Result<_>>()?;

    let mut last_idx: HashMap<Vec<KeyValue>, usize> = HashMap::with_capacity(batch.num_rows);
    for i in batch.row_indices() {
        last_idx.insert(row_key(&key_cols, i), i);
    }

    let mut keep: Vec<usize> = last_idx.into_values().collect();
    keep.sort_unstable();
    Ok(batch.filter_by_indices(&keep))
}

/// Inner hash join.
///
/// `on` pairs `(left_column, right_column)`. A row with a null in any key
/// column never matches. Matched rows carry all left columns followed by all
/// right columns; duplicate output names are rejected, so project the right
/// side down to its key and payload columns first.
pub fn inner_join(
    left: &ColumnBatch,
    right: &ColumnBatch,
    on: &[(&str, &str)],
) -> Result<ColumnBatch> {
    if on.is_empty() {
        return Err(TabularError::Schema("Join requires at least one key pair".into()));
    }

    for name in left.schema.names() {
        if right.schema.index_of(name).is_some() {
            return Err(TabularError::Schema(format!(
                "Join would produce duplicate column '{}'",
                name
            )));
        }
    }

    let left_keys: Vec<&Column> = on
        .iter()
        .map(|&(l, _)| left.require_column(l))
        .collect::<Result<_>>()?;
    let right_keys: Vec<&Column> = on
        .iter()
        .map(|&(_, r)| right.require_column(r))
        .collect::<Result<_>>()?;

    // Build side: right batch, keyed rows only
    let mut build: HashMap<Vec<KeyValue>, Vec<usize>> = HashMap::with_capacity(right.num_rows);
    for i in right.row_indices() {
        let key = row_key(&right_keys, i);
        if key.iter().any(|k| *k == KeyValue::Null) {
            continue;
        }
        build.entry(key).or_default().push(i);
    }

    // Probe side: left batch in row order, so the output order is stable
    let mut left_idx = Vec::new();
    let mut right_idx = Vec::new();
    for i in left.row_indices() {
        let key = row_key(&left_keys, i);
        if key.iter().any(|k| *k == KeyValue::Null) {
            continue;
        }
        if let Some(matches) = build.get(&key) {
            for &j in matches {
                left_idx.push(i);
                right_idx.push(j);
            }
        }
    }

    let left_part = left.filter_by_indices(&left_idx);
    let right_part = right.filter_by_indices(&right_idx);

    let mut fields = left_part.schema.fields.clone();
    fields.extend(right_part.schema.fields.clone());
    let mut columns = left_part.columns;
    columns.extend(right_part.columns);

    ColumnBatch::new(Arc::new(BatchSchema::new(fields)), columns)
}

/// Stable ascending sort on an integer-valued column (`Int64` or
/// `Timestamp`). Nulls sort last; ties keep their original row order.
pub fn sort_by_i64(batch: &ColumnBatch, column: &str) -> Result<ColumnBatch> {
    let col = batch.require_column(column)?;

    let sort_value = |i: usize| -> Option<i64> {
        match col {
            Column::Int64(v) => v[i],
            Column::Timestamp(v) => v[i],
            _ => None,
        }
    };
    if !matches!(col, Column::Int64(_) | Column::Timestamp(_)) {
        return Err(TabularError::Schema(format!(
            "Cannot sort on non-integer column '{}'",
            column
        )));
    }

    let mut indices: Vec<usize> = batch.row_indices().collect();
    // (is_null, value) puts nulls after all values; sort is stable so equal
    // keys keep source order
    indices.sort_by_key(|&i| {
        let v = sort_value(i);
        (v.is_none(), v)
    });

    Ok(batch.filter_by_indices(&indices))
}

/// Prepend a 1-based sequential Int64 column.
///
/// Combined with `sort_by_i64` this yields the chronological surrogate key:
/// sort on event time first, then number rows in order.
pub fn with_row_numbers(batch: &ColumnBatch, name: &str) -> Result<ColumnBatch> {
    if batch.schema.index_of(name).is_some() {
        return Err(TabularError::Schema(format!(
            "Column '{}' already exists",
            name
        )));
    }

    let mut fields = vec![crate::batch::FieldInfo {
        name: name.to_string(),
        field_type: crate::batch::FieldType::Int64,
        nullable: false,
    }];
    fields.extend(batch.schema.fields.clone());

    let numbers: Vec<Option<i64>> = (1..=batch.num_rows as i64).map(Some).collect();
    let mut columns = vec![Column::Int64(numbers)];
    columns.extend(batch.columns.clone());

    ColumnBatch::new(Arc::new(BatchSchema::new(fields)), columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{FieldInfo, FieldType};

    fn batch_of(fields: Vec<FieldInfo>, columns: Vec<Column>) -> ColumnBatch {
        ColumnBatch::new(Arc::new(BatchSchema::new(fields)), columns).unwrap()
    }

    fn events() -> ColumnBatch {
        batch_of(
            vec![
                FieldInfo::nullable("page", FieldType::String),
                FieldInfo::nullable("user", FieldType::String),
                FieldInfo::nullable("level", FieldType::String),
                FieldInfo::nullable("ts", FieldType::Int64),
            ],
            vec![
                Column::String(vec![
                    Some("NextSong".into()),
                    Some("Home".into()),
                    Some("NextSong".into()),
                    Some("NextSong".into()),
                ]),
                Column::String(vec![
                    Some("15".into()),
                    Some("15".into()),
                    Some("15".into()),
                    Some("8".into()),
                ]),
                Column::String(vec![
                    Some("free".into()),
                    Some("free".into()),
                    Some("paid".into()),
                    Some("free".into()),
                ]),
                Column::Int64(vec![Some(30), Some(40), Some(10), Some(20)]),
            ],
        )
    }

    #[test]
    fn test_filter_eq_str() {
        let filtered = filter_eq_str(&events(), "page", "NextSong").unwrap();
        assert_eq!(filtered.num_rows, 3);
        for i in filtered.row_indices() {
            assert_eq!(filtered.column("page").unwrap().get_string(i), Some("NextSong"));
        }
    }

    #[test]
    fn test_dedup_full_row_is_idempotent() {
        let batch = batch_of(
            vec![
                FieldInfo::nullable("a", FieldType::Int64),
                FieldInfo::nullable("b", FieldType::String),
            ],
            vec![
                Column::Int64(vec![Some(1), Some(1), Some(2), None, None]),
                Column::String(vec![
                    Some("x".into()),
                    Some("x".into()),
                    Some("x".into()),
                    None,
                    None,
                ]),
            ],
        );

        let once = dedup(&batch);
        assert_eq!(once.num_rows, 3); // (1,x), (2,x), (null,null)

        let twice = dedup(&once);
        assert_eq!(twice.num_rows, once.num_rows);
    }

    #[test]
    fn test_dedup_distinguishes_null_from_value() {
        let batch = batch_of(
            vec![FieldInfo::nullable("a", FieldType::Float64)],
            vec![Column::Float64(vec![Some(0.0), None, Some(0.0), None])],
        );
        assert_eq!(dedup(&batch).num_rows, 2);
    }

    #[test]
    fn test_dedup_by_keys_last_wins() {
        let filtered = filter_eq_str(&events(), "page", "NextSong").unwrap();
        let users = dedup_by_keys(&filtered, &["user"]).unwrap();

        assert_eq!(users.num_rows, 2);
        // User 15 appears at rows 0 and 2 of the filtered batch; the later
        // row carries level "paid" and must win.
        let mut seen = std::collections::HashMap::new();
        for i in users.row_indices() {
            seen.insert(
                users.column("user").unwrap().get_string(i).unwrap().to_string(),
                users.column("level").unwrap().get_string(i).unwrap().to_string(),
            );
        }
        assert_eq!(seen.get("15").map(String::as_str), Some("paid"));
        assert_eq!(seen.get("8").map(String::as_str), Some("free"));
    }

    #[test]
    fn test_inner_join_matches_and_drops() {
        let left = batch_of(
            vec![
                FieldInfo::nullable("artist", FieldType::String),
                FieldInfo::nullable("length", FieldType::Float64),
            ],
            vec![
                Column::String(vec![
                    Some("Elena".into()),
                    Some("Nobody".into()),
                    None,
                ]),
                Column::Float64(vec![Some(269.58), Some(100.0), Some(269.58)]),
            ],
        );
        let right = batch_of(
            vec![
                FieldInfo::nullable("artist_name", FieldType::String),
                FieldInfo::nullable("duration", FieldType::Float64),
                FieldInfo::nullable("artist_id", FieldType::String),
            ],
            vec![
                Column::String(vec![Some("Elena".into())]),
                Column::Float64(vec![Some(269.58)]),
                Column::String(vec![Some("AR5KOSW".into())]),
            ],
        );

        let joined = inner_join(
            &left,
            &right,
            &[("artist", "artist_name"), ("length", "duration")],
        )
        .unwrap();

        // Only the Elena row joins; the unmatched row and the null-key row
        // are silently dropped.
        assert_eq!(joined.num_rows, 1);
        assert_eq!(joined.column("artist_id").unwrap().get_string(0), Some("AR5KOSW"));
        assert_eq!(joined.column("artist").unwrap().get_string(0), Some("Elena"));
    }

    #[test]
    fn test_inner_join_rejects_name_collision() {
        let left = batch_of(
            vec![FieldInfo::nullable("a", FieldType::Int64)],
            vec![Column::Int64(vec![Some(1)])],
        );
        let right = batch_of(
            vec![FieldInfo::nullable("a", FieldType::Int64)],
            vec![Column::Int64(vec![Some(1)])],
        );
        assert!(inner_join(&left, &right, &[("a", "a")]).is_err());
    }

    #[test]
    fn test_sort_and_row_numbers() {
        let sorted = sort_by_i64(&events(), "ts").unwrap();
        let ts: Vec<Option<i64>> = sorted
            .row_indices()
            .map(|i| sorted.column("ts").unwrap().get_i64(i))
            .collect();
        assert_eq!(ts, vec![Some(10), Some(20), Some(30), Some(40)]);

        let numbered = with_row_numbers(&sorted, "event_id").unwrap();
        assert_eq!(numbered.schema.fields[0].name, "event_id");
        assert_eq!(numbered.column("event_id").unwrap().get_i64(0), Some(1));
        assert_eq!(numbered.column("event_id").unwrap().get_i64(3), Some(4));
    }

    #[test]
    fn test_sort_stable_ties_and_nulls_last() {
        let batch = batch_of(
            vec![
                FieldInfo::nullable("ts", FieldType::Int64),
                FieldInfo::nullable("tag", FieldType::String),
            ],
            vec![
                Column::Int64(vec![Some(5), None, Some(5), Some(1)]),
                Column::String(vec![
                    Some("first-five".into()),
                    Some("null-ts".into()),
                    Some("second-five".into()),
                    Some("one".into()),
                ]),
            ],
        );

        let sorted = sort_by_i64(&batch, "ts").unwrap();
        let tags: Vec<&str> = sorted
            .row_indices()
            .map(|i| sorted.column("tag").unwrap().get_string(i).unwrap())
            .collect();
        assert_eq!(tags, vec!["one", "first-five", "second-five", "null-ts"]);
    }
}
