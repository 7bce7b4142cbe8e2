//! JSON source reading.
//!
//! Sources are trees of JSON files under the input storage root, discovered
//! by a `/`-segmented glob pattern. Each file holds either a single JSON
//! object, an array of objects, or newline-delimited objects; every object is
//! one record.
//!
//! The record set becomes a `ColumnBatch` by schema inference: per-field JSON
//! types are merged across all records (Int ⊔ Float = Float, Null ⊔ T = T,
//! conflicting types degrade to String), columns come out in alphabetical
//! name order, and a field missing from a record is a null in its column.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, warn};

use tonelake_core::Storage;
use tonelake_tabular::{BatchSchema, Column, ColumnBatch, FieldInfo, FieldType};

use crate::error::{EtlError, Result};

/// Max JSON files fetched concurrently. Reads are `buffered`, not unordered:
/// record order must be deterministic across runs (keyed dedup retains the
/// last occurrence, surrogate-key ties break on row position).
const MAX_CONCURRENT_READS: usize = 8;

/// Match a single path segment against a pattern where `*` matches any run
/// of characters within the segment.
fn wildcard_match(pattern: &str, s: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == s,
        Some((head, tail)) => {
            let Some(rest) = s.strip_prefix(head) else {
                return false;
            };
            if tail.is_empty() {
                return true;
            }
            (0..=rest.len())
                .filter(|&i| rest.is_char_boundary(i))
                .any(|i| wildcard_match(tail, &rest[i..]))
        }
    }
}

fn key_matches(pattern: &str, key: &str) -> bool {
    let pattern_segs: Vec<&str> = pattern.split('/').collect();
    let key_segs: Vec<&str> = key.split('/').collect();
    pattern_segs.len() == key_segs.len()
        && pattern_segs
            .iter()
            .zip(&key_segs)
            .all(|(p, k)| wildcard_match(p, k))
}

/// Find all storage keys matching a glob pattern.
///
/// Listing starts at the longest wildcard-free prefix of the pattern. A
/// pattern matching zero keys is a fatal error: there is nothing to process.
pub async fn glob_keys(storage: &dyn Storage, pattern: &str) -> Result<Vec<String>> {
    let prefix: String = pattern
        .split('/')
        .take_while(|seg| !seg.contains('*'))
        .flat_map(|seg| [seg, "/"])
        .collect();

    let keys = storage.list_prefix(&prefix).await?;
    let mut matched: Vec<String> = keys
        .into_iter()
        .filter(|k| key_matches(pattern, k))
        .collect();
    matched.sort();

    if matched.is_empty() {
        return Err(EtlError::NoInputFiles(pattern.to_string()));
    }
    Ok(matched)
}

/// Parse one file's payload into records.
fn parse_records(key: &str, bytes: &Bytes, out: &mut Vec<JsonMap<String, JsonValue>>) {
    // Whole-file parse first: a single object or an array of objects
    if let Ok(value) = serde_json::from_slice::<JsonValue>(bytes) {
        match value {
            JsonValue::Object(map) => out.push(map),
            JsonValue::Array(items) => {
                for item in items {
                    match item {
                        JsonValue::Object(map) => out.push(map),
                        other => {
                            warn!(file = key, "Skipping non-object array element: {}", other)
                        }
                    }
                }
            }
            other => warn!(file = key, "Skipping non-object JSON value: {}", other),
        }
        return;
    }

    // Newline-delimited objects
    let text = String::from_utf8_lossy(bytes);
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<JsonValue>(line) {
            Ok(JsonValue::Object(map)) => out.push(map),
            Ok(other) => {
                warn!(file = key, line = lineno + 1, "Skipping non-object record: {}", other)
            }
            Err(e) => warn!(file = key, line = lineno + 1, "Skipping malformed record: {}", e),
        }
    }
}

/// Inferred JSON field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inferred {
    Null,
    Bool,
    Int,
    Float,
    Str,
}

fn infer(value: &JsonValue) -> Inferred {
    match value {
        JsonValue::Null => Inferred::Null,
        JsonValue::Bool(_) => Inferred::Bool,
        JsonValue::Number(n) => {
            if n.is_i64() {
                Inferred::Int
            } else {
                Inferred::Float
            }
        }
        JsonValue::String(_) => Inferred::Str,
        // Nested shapes degrade to their JSON text
        JsonValue::Array(_) | JsonValue::Object(_) => Inferred::Str,
    }
}

fn merge(a: Inferred, b: Inferred) -> Inferred {
    use Inferred::*;
    match (a, b) {
        (x, y) if x == y => x,
        (Null, x) | (x, Null) => x,
        (Int, Float) | (Float, Int) => Float,
        _ => Str,
    }
}

/// Build a column batch from parsed records.
fn batch_from_records(records: Vec<JsonMap<String, JsonValue>>) -> Result<ColumnBatch> {
    // Merge per-field types across all records; BTreeMap gives the
    // alphabetical column order the inference contract promises
    let mut inferred: BTreeMap<String, Inferred> = BTreeMap::new();
    for record in &records {
        for (name, value) in record {
            let ty = infer(value);
            inferred
                .entry(name.clone())
                .and_modify(|t| *t = merge(*t, ty))
                .or_insert(ty);
        }
    }

    let mut fields = Vec::with_capacity(inferred.len());
    let mut columns = Vec::with_capacity(inferred.len());

    for (name, ty) in &inferred {
        let (field_type, column) = match ty {
            Inferred::Bool => (
                FieldType::Boolean,
                Column::Boolean(
                    records
                        .iter()
                        .map(|r| r.get(name).and_then(JsonValue::as_bool))
                        .collect(),
                ),
            ),
            Inferred::Int => (
                FieldType::Int64,
                Column::Int64(
                    records
                        .iter()
                        .map(|r| r.get(name).and_then(JsonValue::as_i64))
                        .collect(),
                ),
            ),
            Inferred::Float => (
                FieldType::Float64,
                Column::Float64(
                    records
                        .iter()
                        .map(|r| r.get(name).and_then(JsonValue::as_f64))
                        .collect(),
                ),
            ),
            // All-null fields land here too and stay all-null strings
            Inferred::Str | Inferred::Null => (
                FieldType::String,
                Column::String(
                    records
                        .iter()
                        .map(|r| match r.get(name) {
                            None | Some(JsonValue::Null) => None,
                            Some(JsonValue::String(s)) => Some(s.clone()),
                            Some(other) => Some(other.to_string()),
                        })
                        .collect(),
                ),
            ),
        };

        fields.push(FieldInfo::nullable(name.clone(), field_type));
        columns.push(column);
    }

    Ok(ColumnBatch::new(Arc::new(BatchSchema::new(fields)), columns)?)
}

/// Read every file matching the glob into a single column batch.
pub async fn read_json_batch(storage: &dyn Storage, pattern: &str) -> Result<ColumnBatch> {
    let keys = glob_keys(storage, pattern).await?;
    debug!(files = keys.len(), pattern, "Reading JSON source");

    let payloads: Vec<tonelake_core::Result<Bytes>> = stream::iter(keys.iter())
        .map(|key| storage.read_bytes(key))
        .buffered(MAX_CONCURRENT_READS)
        .collect()
        .await;

    let mut records = Vec::new();
    for (key, payload) in keys.iter().zip(payloads) {
        parse_records(key, &payload?, &mut records);
    }

    batch_from_records(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tonelake_core::MemoryStorage;

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("*.json", "events.json"));
        assert!(!wildcard_match("*.json", "events.jsonl"));
        assert!(wildcard_match("2018-*-events.json", "2018-11-05-events.json"));
        assert!(!wildcard_match("2018", "2019"));
    }

    #[tokio::test]
    async fn test_glob_keys_three_level_tree() {
        let storage = MemoryStorage::new();
        storage.insert("song_data/A/B/C/TRABCAJ.json", &b"{}"[..]);
        storage.insert("song_data/A/B/D/TRABDXX.json", &b"{}"[..]);
        storage.insert("song_data/A/B/readme.txt", &b"no"[..]);
        storage.insert("log_data/2018/11/events.json", &b"{}"[..]);

        let keys = glob_keys(&storage, "song_data/*/*/*/*.json").await.unwrap();
        assert_eq!(
            keys,
            vec![
                "song_data/A/B/C/TRABCAJ.json",
                "song_data/A/B/D/TRABDXX.json"
            ]
        );
    }

    #[tokio::test]
    async fn test_glob_zero_matches_is_fatal() {
        let storage = MemoryStorage::new();
        let err = glob_keys(&storage, "song_data/*/*/*/*.json").await.unwrap_err();
        assert!(matches!(err, EtlError::NoInputFiles(_)));
    }

    #[tokio::test]
    async fn test_read_ndjson_with_inference() {
        let storage = MemoryStorage::new();
        let lines = [
            json!({"userId": "15", "sessionId": 818, "length": 269.58, "page": "NextSong"}).to_string(),
            json!({"userId": "8", "sessionId": 900, "page": "Home", "extra": null}).to_string(),
            "not json at all".to_string(),
        ]
        .join("\n");
        storage.insert("log_data/2018/11/events.json", lines.into_bytes());

        let batch = read_json_batch(&storage, "log_data/2018/11/*.json")
            .await
            .unwrap();

        // Bad line skipped; columns alphabetical; missing fields null
        assert_eq!(batch.num_rows, 2);
        assert_eq!(
            batch.schema.names().collect::<Vec<_>>(),
            vec!["extra", "length", "page", "sessionId", "userId"]
        );
        assert_eq!(batch.column("userId").unwrap().get_string(0), Some("15"));
        assert_eq!(batch.column("sessionId").unwrap().get_i64(1), Some(900));
        assert_eq!(batch.column("length").unwrap().get_f64(0), Some(269.58));
        assert!(batch.column("length").unwrap().is_null(1));
    }

    #[tokio::test]
    async fn test_single_object_files_and_type_merging() {
        let storage = MemoryStorage::new();
        storage.insert(
            "song_data/A/A/A/TRA.json",
            json!({"song_id": "S1", "year": 1982, "duration": 220.0}).to_string().into_bytes(),
        );
        storage.insert(
            "song_data/A/A/B/TRB.json",
            json!({"song_id": "S2", "year": 0, "duration": 180}).to_string().into_bytes(),
        );

        let batch = read_json_batch(&storage, "song_data/*/*/*/*.json")
            .await
            .unwrap();

        assert_eq!(batch.num_rows, 2);
        // Int ⊔ Float merges to Float
        assert_eq!(batch.column("duration").unwrap().get_f64(1), Some(180.0));
        assert_eq!(batch.column("year").unwrap().get_i64(0), Some(1982));
    }
}
