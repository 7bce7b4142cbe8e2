//! Columnar batch format for tabular data.
//!
//! A `ColumnBatch` is an ordered collection of named, typed columns with a
//! shared row count. Values are always optional; a missing JSON field simply
//! becomes a null in its column.
//!
//! `Timestamp` columns hold milliseconds since the Unix epoch (UTC). The
//! activity feed's event time is millisecond-precision, so no truncation is
//! ever lossy.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, TabularError};

/// Tabular field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Boolean,
    Int64,
    Float64,
    String,
    /// Milliseconds since epoch (UTC)
    Timestamp,
}

/// Field information for a column in a batch.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Column name - canonical identifier for lookups.
    pub name: String,
    /// Field type.
    pub field_type: FieldType,
    /// Whether the field allows nulls.
    pub nullable: bool,
}

impl FieldInfo {
    /// Nullable field with the given name and type.
    pub fn nullable(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: true,
        }
    }
}

/// Schema for a column batch.
#[derive(Debug, Clone)]
pub struct BatchSchema {
    /// Field definitions in column order.
    pub fields: Vec<FieldInfo>,
    /// Canonical lookup by name.
    name_to_index: HashMap<String, usize>,
}

impl BatchSchema {
    /// Create a new batch schema from field definitions.
    pub fn new(fields: Vec<FieldInfo>) -> Self {
        let name_to_index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();

        Self {
            fields,
            name_to_index,
        }
    }

    /// Get field index by name.
    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Get field info by name.
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.index_of(name).map(|i| &self.fields[i])
    }

    /// Number of fields in the schema.
    #[inline]
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// All field names in column order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Column storage - typed arrays with optional values (nullable).
#[derive(Debug, Clone)]
pub enum Column {
    Boolean(Vec<Option<bool>>),
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    String(Vec<Option<String>>),
    /// Milliseconds since epoch (UTC)
    Timestamp(Vec<Option<i64>>),
}

impl Column {
    /// Create an empty column of the given type.
    pub fn empty(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Boolean => Self::Boolean(Vec::new()),
            FieldType::Int64 => Self::Int64(Vec::new()),
            FieldType::Float64 => Self::Float64(Vec::new()),
            FieldType::String => Self::String(Vec::new()),
            FieldType::Timestamp => Self::Timestamp(Vec::new()),
        }
    }

    /// Get the number of rows in this column.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::Boolean(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::String(v) => v.len(),
            Self::Timestamp(v) => v.len(),
        }
    }

    /// Check if the column is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if value at index is null.
    #[inline]
    pub fn is_null(&self, idx: usize) -> bool {
        match self {
            Self::Boolean(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::Int64(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::Float64(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::String(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::Timestamp(v) => v.get(idx).map_or(true, |v| v.is_none()),
        }
    }

    /// Get the field type of this column.
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Boolean(_) => FieldType::Boolean,
            Self::Int64(_) => FieldType::Int64,
            Self::Float64(_) => FieldType::Float64,
            Self::String(_) => FieldType::String,
            Self::Timestamp(_) => FieldType::Timestamp,
        }
    }

    /// Get boolean value at index (returns None if wrong type or null).
    #[inline]
    pub fn get_bool(&self, idx: usize) -> Option<bool> {
        match self {
            Self::Boolean(v) => v.get(idx).and_then(|v| *v),
            _ => None,
        }
    }

    /// Get i64 value at index (returns None if wrong type or null).
    #[inline]
    pub fn get_i64(&self, idx: usize) -> Option<i64> {
        match self {
            Self::Int64(v) => v.get(idx).and_then(|v| *v),
            _ => None,
        }
    }

    /// Get f64 value at index (returns None if wrong type or null).
    #[inline]
    pub fn get_f64(&self, idx: usize) -> Option<f64> {
        match self {
            Self::Float64(v) => v.get(idx).and_then(|v| *v),
            _ => None,
        }
    }

    /// Get string value at index (returns None if wrong type or null).
    #[inline]
    pub fn get_string(&self, idx: usize) -> Option<&str> {
        match self {
            Self::String(v) => v.get(idx).and_then(|v| v.as_deref()),
            _ => None,
        }
    }

    /// Get timestamp value at index in epoch milliseconds (returns None if
    /// wrong type or null).
    #[inline]
    pub fn get_timestamp(&self, idx: usize) -> Option<i64> {
        match self {
            Self::Timestamp(v) => v.get(idx).and_then(|v| *v),
            _ => None,
        }
    }

    /// Filter column by row indices, returning a new column with only those rows.
    pub fn filter_by_indices(&self, indices: &[usize]) -> Self {
        match self {
            Self::Boolean(v) => Self::Boolean(indices.iter().map(|&i| v[i]).collect()),
            Self::Int64(v) => Self::Int64(indices.iter().map(|&i| v[i]).collect()),
            Self::Float64(v) => Self::Float64(indices.iter().map(|&i| v[i]).collect()),
            Self::String(v) => Self::String(indices.iter().map(|&i| v[i].clone()).collect()),
            Self::Timestamp(v) => Self::Timestamp(indices.iter().map(|&i| v[i]).collect()),
        }
    }
}

/// Columnar batch - efficient for filtering and joins.
#[derive(Debug, Clone)]
pub struct ColumnBatch {
    /// Schema for this batch.
    pub schema: Arc<BatchSchema>,
    /// Column data in schema order.
    pub columns: Vec<Column>,
    /// Number of rows in the batch.
    pub num_rows: usize,
}

impl ColumnBatch {
    /// Create a new column batch.
    pub fn new(schema: Arc<BatchSchema>, columns: Vec<Column>) -> Result<Self> {
        if columns.len() != schema.num_fields() {
            return Err(TabularError::Schema(format!(
                "Column count mismatch: schema has {} fields, got {} columns",
                schema.num_fields(),
                columns.len()
            )));
        }

        let num_rows = columns.first().map_or(0, |c| c.len());

        // Verify all columns have the same row count
        for (i, col) in columns.iter().enumerate() {
            if col.len() != num_rows {
                return Err(TabularError::Schema(format!(
                    "Row count mismatch: column {} has {} rows, expected {}",
                    i,
                    col.len(),
                    num_rows
                )));
            }
        }

        Ok(Self {
            schema,
            columns,
            num_rows,
        })
    }

    /// Create an empty batch with the given schema.
    pub fn empty(schema: Arc<BatchSchema>) -> Self {
        let columns = schema
            .fields
            .iter()
            .map(|f| Column::empty(f.field_type))
            .collect();
        Self {
            schema,
            columns,
            num_rows: 0,
        }
    }

    /// Get column by name.
    #[inline]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.schema.index_of(name).map(|i| &self.columns[i])
    }

    /// Get column by name, erroring if absent.
    pub fn require_column(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| TabularError::ColumnNotFound(name.to_string()))
    }

    /// Check if the batch is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Filter batch by row indices, returning a new batch with only those rows.
    pub fn filter_by_indices(&self, indices: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| c.filter_by_indices(indices))
            .collect();
        Self {
            schema: Arc::clone(&self.schema),
            columns,
            num_rows: indices.len(),
        }
    }

    /// Project to a subset of columns by name.
    pub fn project(&self, names: &[&str]) -> Result<Self> {
        let pairs: Vec<(&str, &str)> = names.iter().map(|&n| (n, n)).collect();
        self.select_as(&pairs)
    }

    /// Project with rename: each `(source, target)` pair selects column
    /// `source` and names it `target` in the result.
    pub fn select_as(&self, pairs: &[(&str, &str)]) -> Result<Self> {
        let mut new_fields = Vec::with_capacity(pairs.len());
        let mut new_columns = Vec::with_capacity(pairs.len());

        for &(source, target) in pairs {
            let idx = self
                .schema
                .index_of(source)
                .ok_or_else(|| TabularError::ColumnNotFound(source.to_string()))?;

            let mut field = self.schema.fields[idx].clone();
            field.name = target.to_string();
            new_fields.push(field);
            new_columns.push(self.columns[idx].clone());
        }

        let new_schema = Arc::new(BatchSchema::new(new_fields));
        Ok(Self {
            schema: new_schema,
            columns: new_columns,
            num_rows: self.num_rows,
        })
    }

    /// Append a column to the batch.
    pub fn append_column(&self, field: FieldInfo, column: Column) -> Result<Self> {
        if column.len() != self.num_rows {
            return Err(TabularError::Schema(format!(
                "Appended column '{}' has {} rows, expected {}",
                field.name,
                column.len(),
                self.num_rows
            )));
        }
        if self.schema.index_of(&field.name).is_some() {
            return Err(TabularError::Schema(format!(
                "Column '{}' already exists",
                field.name
            )));
        }

        let mut fields = self.schema.fields.clone();
        fields.push(field);
        let mut columns = self.columns.clone();
        columns.push(column);

        Ok(Self {
            schema: Arc::new(BatchSchema::new(fields)),
            columns,
            num_rows: self.num_rows,
        })
    }

    /// Drop the named columns, keeping the rest in order.
    pub fn drop_columns(&self, names: &[&str]) -> Result<Self> {
        let keep: Vec<&str> = self
            .schema
            .names()
            .filter(|n| !names.contains(n))
            .collect();
        self.project(&keep)
    }

    /// Iterator over row indices.
    pub fn row_indices(&self) -> impl Iterator<Item = usize> {
        0..self.num_rows
    }
}
