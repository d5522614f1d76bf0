//! Row-set shapes returned to callers.

use std::sync::Arc;
use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Field names starting with this prefix never leave the engine.
pub const RESERVED_FIELD_PREFIX: char = '_';

/// Rows as produced by a statement runner, before sanitizing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRowSet {
    /// Column names in result order
    pub columns: Vec<String>,
    /// Cell values, one inner vector per row, positionally aligned with `columns`
    pub rows: Vec<Vec<Value>>,
    /// Rows returned or affected, as reported by the database
    pub row_count: u64,
    /// Execution round trip, excluding pool checkout
    pub elapsed: Duration,
}

/// One result row keyed by the shared field list.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Value of `field`, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .position(|f| f == field)
            .and_then(|idx| self.values.get(idx))
    }

    /// `(field, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(String::as_str).zip(self.values.iter())
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

/// Homogeneous rows with reserved fields removed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowSet {
    fields: Vec<String>,
    rows: Vec<Row>,
    row_count: u64,
}

impl RowSet {
    /// Builds a row set, dropping every `_`-prefixed column from fields and rows.
    pub fn from_raw(raw: RawRowSet) -> Self {
        let keep: Vec<usize> = raw
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.starts_with(RESERVED_FIELD_PREFIX))
            .map(|(idx, _)| idx)
            .collect();

        let fields: Vec<String> = keep.iter().map(|&idx| raw.columns[idx].clone()).collect();
        let shared: Arc<[String]> = Arc::from(fields.clone());

        let rows = raw
            .rows
            .into_iter()
            .map(|mut values| {
                let values = keep
                    .iter()
                    .map(|&idx| values.get_mut(idx).map(Value::take).unwrap_or(Value::Null))
                    .collect();
                Row {
                    fields: Arc::clone(&shared),
                    values,
                }
            })
            .collect();

        Self {
            fields,
            rows,
            row_count: raw.row_count,
        }
    }

    /// Visible field names.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Sanitized rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Rows returned or affected.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }
}

/// Outcome of a successfully executed statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Rows returned or affected
    pub row_count: u64,
    /// Field names in column order
    pub fields: Vec<String>,
    /// Rows keyed by field name
    pub rows: Vec<Row>,
    /// Round-trip time rounded to whole milliseconds
    pub execution_time_ms: u64,
    /// Whether the statement altered tables, schemas or databases
    pub hierarchy_changed: bool,
}

impl ExecutionResult {
    /// Assembles a result from a sanitized row set.
    pub fn new(rows: RowSet, execution_time_ms: u64, hierarchy_changed: bool) -> Self {
        Self {
            row_count: rows.row_count,
            fields: rows.fields,
            rows: rows.rows,
            execution_time_ms,
            hierarchy_changed,
        }
    }
}
