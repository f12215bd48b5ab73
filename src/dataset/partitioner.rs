//! Dataset Partitioner
//!
//! Splits a table into ordered, size-bounded partitions. Rows are first
//! clustered into buckets, either by exact value of a hash attribute or by
//! equal-width bins over the row index, then each bucket is sliced into
//! chunks. Every row keeps its original position so the file can be put back
//! together in order.

use super::types::{
    ColumnKind, IndexedRow, NULL_TEXT, PartitionPlan, PlannedPartition, Table, Value,
};
use crate::error::{EdfsError, EdfsResult};

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy)]
pub struct PartitionRequest<'a> {
    pub requested_partitions: u32,
    pub max_partition_bytes: u64,
    /// Size of the serialized source dataset.
    pub total_bytes: u64,
    pub hash_attr: Option<&'a str>,
}

struct Bucket {
    key: String,
    rows: Vec<IndexedRow>,
}

pub fn partition(table: Table, request: PartitionRequest<'_>) -> EdfsResult<PartitionPlan> {
    if request.requested_partitions == 0 {
        return Err(EdfsError::InvalidPartitionCount);
    }

    let Table { columns, rows } = table;
    let row_count = rows.len() as u64;

    let mut indexed: Vec<IndexedRow> = rows
        .into_iter()
        .enumerate()
        .map(|(i, values)| IndexedRow {
            index: i as u64,
            values,
        })
        .collect();

    let hash_column = request
        .hash_attr
        .filter(|name| !name.is_empty())
        .and_then(|name| columns.iter().position(|c| c.name == name));

    let (buckets, effective_partitions) = match hash_column {
        Some(col) => {
            let kind = columns[col].kind;
            fill_missing(&mut indexed, col, kind);
            let buckets = group_by_value(indexed, col);
            let effective = (buckets.len() as u32).max(request.requested_partitions);
            (buckets, effective)
        }
        None => {
            let buckets = bin_by_index(indexed, request.requested_partitions);
            (buckets, request.requested_partitions)
        }
    };

    if row_count == 0 || request.total_bytes == 0 {
        return Ok(PartitionPlan {
            columns,
            partitions: Vec::new(),
            effective_partitions,
            partition_byte_size: 0,
            rows_per_partition: 0,
        });
    }

    let partition_byte_size = request
        .total_bytes
        .div_ceil(effective_partitions as u64)
        .min(request.max_partition_bytes);
    let rows_per_partition = (row_count * partition_byte_size)
        .div_ceil(request.total_bytes)
        .max(1);

    let mut partitions = Vec::new();
    let mut next_index = 0u32;
    for bucket in buckets {
        for chunk in split_balanced(bucket.rows, rows_per_partition) {
            partitions.push(PlannedPartition {
                index: next_index,
                bucket_key: bucket.key.clone(),
                rows: chunk,
            });
            next_index += 1;
        }
    }

    tracing::debug!(
        "Partitioned {} rows into {} partitions ({} buckets, {} rows/partition)",
        row_count,
        partitions.len(),
        effective_partitions,
        rows_per_partition
    );

    Ok(PartitionPlan {
        columns,
        partitions,
        effective_partitions,
        partition_byte_size,
        rows_per_partition,
    })
}

fn fill_missing(rows: &mut [IndexedRow], col: usize, kind: ColumnKind) {
    let filler = match kind {
        ColumnKind::Numeric => Value::Number(0.0),
        ColumnKind::Text => Value::Text(NULL_TEXT.to_string()),
    };
    for row in rows.iter_mut() {
        if row.values[col].is_null() {
            row.values[col] = filler.clone();
        }
    }
}

/// Groups rows by exact value, ascending by key. Row order inside a group is preserved.
fn group_by_value(mut rows: Vec<IndexedRow>, col: usize) -> Vec<Bucket> {
    rows.sort_by(|a, b| a.values[col].total_cmp(&b.values[col]));

    let mut buckets: Vec<(Value, Vec<IndexedRow>)> = Vec::new();
    for row in rows {
        let same_key = buckets
            .last()
            .is_some_and(|(key, _)| key.total_cmp(&row.values[col]).is_eq());
        if same_key && let Some((_, members)) = buckets.last_mut() {
            members.push(row);
        } else {
            buckets.push((row.values[col].clone(), vec![row]));
        }
    }

    buckets
        .into_iter()
        .map(|(key, rows)| Bucket {
            key: key.to_string(),
            rows,
        })
        .collect()
}

/// Equal-width, right-closed bins over the row index. Empty bins are dropped
/// and the remaining ones are labelled `index_<n>` in order.
fn bin_by_index(rows: Vec<IndexedRow>, bins: u32) -> Vec<Bucket> {
    let Some(last) = rows.last().map(|r| r.index) else {
        return Vec::new();
    };
    let bins = bins as usize;
    let width = last as f64 / bins as f64;

    // Only occupied bins get a slot; `bins` may far exceed the row count.
    let mut slots: BTreeMap<usize, Vec<IndexedRow>> = BTreeMap::new();
    for row in rows {
        let slot = if width == 0.0 {
            0
        } else {
            let raw = (row.index as f64 / width).ceil() as i64 - 1;
            raw.clamp(0, bins as i64 - 1) as usize
        };
        slots.entry(slot).or_default().push(row);
    }

    slots
        .into_values()
        .enumerate()
        .map(|(n, rows)| Bucket {
            key: format!("index_{}", n),
            rows,
        })
        .collect()
}

/// Splits into `ceil(len / max_rows)` slices whose sizes differ by at most one.
fn split_balanced(rows: Vec<IndexedRow>, max_rows: u64) -> Vec<Vec<IndexedRow>> {
    let len = rows.len();
    if len == 0 {
        return Vec::new();
    }
    let pieces = (len as u64).div_ceil(max_rows) as usize;
    let base = len / pieces;
    let extra = len % pieces;

    let mut out = Vec::with_capacity(pieces);
    let mut iter = rows.into_iter();
    for i in 0..pieces {
        let size = base + usize::from(i < extra);
        out.push(iter.by_ref().take(size).collect());
    }
    out
}
