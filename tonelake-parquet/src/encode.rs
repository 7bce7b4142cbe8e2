//! Batch <-> Parquet file encoding.
//!
//! Encoding drives the `parquet` crate's typed column writers directly: one
//! row group, one column chunk per batch column, definition levels carrying
//! the null mask. Every column is written OPTIONAL; the pipeline's schema
//! inference cannot prove a source field non-null.
//!
//! Type mapping:
//!
//! | batch       | physical   | logical            |
//! |-------------|------------|--------------------|
//! | Boolean     | BOOLEAN    |                    |
//! | Int64       | INT64      |                    |
//! | Float64     | DOUBLE     |                    |
//! | String      | BYTE_ARRAY | String             |
//! | Timestamp   | INT64      | Timestamp(ms, UTC) |

use std::sync::Arc;

use bytes::Bytes;
use parquet::basic::{Compression, LogicalType, Repetition, TimeUnit, Type as PhysicalType};
use parquet::data_type::{BoolType, ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::{SerializedColumnWriter, SerializedFileWriter};
use parquet::schema::types::Type as SchemaType;

use tonelake_tabular::{BatchSchema, Column, ColumnBatch, FieldType};

use crate::error::{ParquetError, Result};

fn enc_err(e: parquet::errors::ParquetError) -> ParquetError {
    ParquetError::encode(e.to_string())
}

/// Map a batch schema onto a Parquet message schema.
fn build_parquet_schema(schema: &BatchSchema) -> Result<SchemaType> {
    let mut fields = Vec::with_capacity(schema.num_fields());

    for field in &schema.fields {
        let builder = match field.field_type {
            FieldType::Boolean => {
                SchemaType::primitive_type_builder(&field.name, PhysicalType::BOOLEAN)
            }
            FieldType::Int64 => {
                SchemaType::primitive_type_builder(&field.name, PhysicalType::INT64)
            }
            FieldType::Float64 => {
                SchemaType::primitive_type_builder(&field.name, PhysicalType::DOUBLE)
            }
            FieldType::String => {
                SchemaType::primitive_type_builder(&field.name, PhysicalType::BYTE_ARRAY)
                    .with_logical_type(Some(LogicalType::String))
            }
            FieldType::Timestamp => {
                SchemaType::primitive_type_builder(&field.name, PhysicalType::INT64)
                    .with_logical_type(Some(LogicalType::Timestamp {
                        is_adjusted_to_u_t_c: true,
                        unit: TimeUnit::MILLIS(Default::default()),
                    }))
            }
        };

        let parquet_field = builder
            .with_repetition(Repetition::OPTIONAL)
            .build()
            .map_err(enc_err)?;
        fields.push(Arc::new(parquet_field));
    }

    SchemaType::group_type_builder("tonelake_schema")
        .with_fields(fields)
        .build()
        .map_err(enc_err)
}

/// Split an option vector into dense values + definition levels
/// (1 = present, 0 = null).
fn split_nulls<T: Copy>(values: &[Option<T>]) -> (Vec<T>, Vec<i16>) {
    let mut dense = Vec::with_capacity(values.len());
    let mut defs = Vec::with_capacity(values.len());
    for v in values {
        match v {
            Some(v) => {
                dense.push(*v);
                defs.push(1);
            }
            None => defs.push(0),
        }
    }
    (dense, defs)
}

fn write_column(writer: &mut SerializedColumnWriter<'_>, column: &Column) -> Result<()> {
    match column {
        Column::Boolean(v) => {
            let (values, defs) = split_nulls(v);
            writer
                .typed::<BoolType>()
                .write_batch(&values, Some(&defs), None)
                .map_err(enc_err)?;
        }
        Column::Int64(v) | Column::Timestamp(v) => {
            let (values, defs) = split_nulls(v);
            writer
                .typed::<Int64Type>()
                .write_batch(&values, Some(&defs), None)
                .map_err(enc_err)?;
        }
        Column::Float64(v) => {
            let (values, defs) = split_nulls(v);
            writer
                .typed::<DoubleType>()
                .write_batch(&values, Some(&defs), None)
                .map_err(enc_err)?;
        }
        Column::String(v) => {
            let mut values = Vec::new();
            let mut defs = Vec::with_capacity(v.len());
            for s in v {
                match s {
                    Some(s) => {
                        values.push(ByteArray::from(s.as_str()));
                        defs.push(1);
                    }
                    None => defs.push(0),
                }
            }
            writer
                .typed::<ByteArrayType>()
                .write_batch(&values, Some(&defs), None)
                .map_err(enc_err)?;
        }
    }
    Ok(())
}

/// Encode a batch as a single-row-group Parquet file.
///
/// The output is deterministic for a given batch, so re-running a pipeline on
/// identical input rewrites identical bytes.
pub fn encode_batch(batch: &ColumnBatch) -> Result<Bytes> {
    let schema = Arc::new(build_parquet_schema(&batch.schema)?);
    let props = Arc::new(
        WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build(),
    );

    let mut buf: Vec<u8> = Vec::new();
    let mut writer = SerializedFileWriter::new(&mut buf, schema, props).map_err(enc_err)?;

    let mut row_group = writer.next_row_group().map_err(enc_err)?;
    let mut col_idx = 0;
    while let Some(mut col_writer) = row_group.next_column().map_err(enc_err)? {
        write_column(&mut col_writer, &batch.columns[col_idx])?;
        col_writer.close().map_err(enc_err)?;
        col_idx += 1;
    }
    row_group.close().map_err(enc_err)?;
    writer.close().map_err(enc_err)?;

    Ok(Bytes::from(buf))
}

/// A decoded Parquet cell, reduced to the value space the pipeline emits.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    /// Milliseconds since epoch (UTC)
    Timestamp(i64),
}

/// Read all rows of a Parquet file as `(column name, value)` pairs.
///
/// Verification-side counterpart of `encode_batch`; tests use it to check
/// what a table write actually persisted.
pub fn read_rows(bytes: &Bytes) -> Result<Vec<Vec<(String, CellValue)>>> {
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use parquet::record::Field;

    let reader = SerializedFileReader::new(bytes.clone()).map_err(enc_err)?;
    let mut rows = Vec::new();

    for row in reader.get_row_iter(None).map_err(enc_err)? {
        let row = row.map_err(enc_err)?;
        let mut cells = Vec::new();
        for (name, field) in row.get_column_iter() {
            let value = match field {
                Field::Null => CellValue::Null,
                Field::Bool(b) => CellValue::Boolean(*b),
                Field::Long(v) => CellValue::Int64(*v),
                Field::Double(v) => CellValue::Float64(*v),
                Field::Str(s) => CellValue::String(s.clone()),
                Field::TimestampMillis(ms) => CellValue::Timestamp(*ms),
                Field::TimestampMicros(us) => CellValue::Timestamp(*us / 1000),
                other => {
                    return Err(ParquetError::encode(format!(
                        "Unexpected field type in column '{}': {:?}",
                        name, other
                    )));
                }
            };
            cells.push((name.clone(), value));
        }
        rows.push(cells);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonelake_tabular::FieldInfo;

    fn mixed_batch() -> ColumnBatch {
        let schema = Arc::new(BatchSchema::new(vec![
            FieldInfo::nullable("user_id", FieldType::String),
            FieldInfo::nullable("session_id", FieldType::Int64),
            FieldInfo::nullable("length", FieldType::Float64),
            FieldInfo::nullable("paid", FieldType::Boolean),
            FieldInfo::nullable("start_time", FieldType::Timestamp),
        ]));
        let columns = vec![
            Column::String(vec![Some("15".into()), None, Some("8".into())]),
            Column::Int64(vec![Some(818), Some(819), None]),
            Column::Float64(vec![Some(269.58), None, Some(100.5)]),
            Column::Boolean(vec![Some(false), Some(true), None]),
            Column::Timestamp(vec![Some(1_541_440_176_796), Some(1_541_440_180_000), None]),
        ];
        ColumnBatch::new(schema, columns).unwrap()
    }

    #[test]
    fn test_encode_roundtrip_with_nulls() {
        let batch = mixed_batch();
        let bytes = encode_batch(&batch).unwrap();
        let rows = read_rows(&bytes).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0][0],
            ("user_id".to_string(), CellValue::String("15".into()))
        );
        assert_eq!(rows[1][0], ("user_id".to_string(), CellValue::Null));
        assert_eq!(rows[0][1], ("session_id".to_string(), CellValue::Int64(818)));
        assert_eq!(rows[2][2], ("length".to_string(), CellValue::Float64(100.5)));
        assert_eq!(rows[1][3], ("paid".to_string(), CellValue::Boolean(true)));
        assert_eq!(
            rows[0][4],
            (
                "start_time".to_string(),
                CellValue::Timestamp(1_541_440_176_796)
            )
        );
    }

    #[test]
    fn test_encode_empty_batch_keeps_schema() {
        let schema = Arc::new(BatchSchema::new(vec![
            FieldInfo::nullable("a", FieldType::Int64),
            FieldInfo::nullable("b", FieldType::String),
        ]));
        let batch = ColumnBatch::empty(schema);

        let bytes = encode_batch(&batch).unwrap();
        let rows = read_rows(&bytes).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_encode_deterministic() {
        let batch = mixed_batch();
        let a = encode_batch(&batch).unwrap();
        let b = encode_batch(&batch).unwrap();
        assert_eq!(a, b);
    }
}
