use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Name of the synthetic column that carries each row's original position.
pub const INDEX_COLUMN: &str = "index";

/// Filler written into missing cells of a text hash column.
pub const NULL_TEXT: &str = "NULL";

/// A single cell. The variant is decided once, when the CSV is parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Text(String),
    Null,
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Total order used for grouping: numbers, then text, then nulls.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Number(_), _) => Ordering::Less,
            (_, Value::Number(_)) => Ordering::Greater,
            (Value::Text(_), Value::Null) => Ordering::Less,
            (Value::Null, Value::Text(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Null => Ok(()),
        }
    }
}

/// Integral values print without a fractional part so `7` survives a round trip as `7`.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Text,
}

impl ColumnKind {
    /// Suffix written after a column name in a block payload header.
    pub fn tag(self) -> &'static str {
        match self {
            ColumnKind::Numeric => "number",
            ColumnKind::Text => "text",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "number" => Some(ColumnKind::Numeric),
            "text" => Some(ColumnKind::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// Row-oriented dataset with a typed schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A row tagged with its position in the dataset as originally ingested.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRow {
    pub index: u64,
    pub values: Vec<Value>,
}

/// One block's worth of rows produced by the partitioner.
#[derive(Debug, Clone)]
pub struct PlannedPartition {
    /// Zero-based, gapless across the whole file.
    pub index: u32,
    pub bucket_key: String,
    pub rows: Vec<IndexedRow>,
}

#[derive(Debug, Clone)]
pub struct PartitionPlan {
    pub columns: Vec<Column>,
    pub partitions: Vec<PlannedPartition>,
    /// Bucket count after hash groups override the requested count.
    pub effective_partitions: u32,
    pub partition_byte_size: u64,
    pub rows_per_partition: u64,
}
