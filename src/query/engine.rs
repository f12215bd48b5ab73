//! Partition-parallel aggregation.
//!
//! `aggregate` validates the column against one partition's schema, then
//! maps every selected partition to a partial result on a scoped pool and
//! reduces the partials once all tasks have joined. A partition that cannot
//! be read or times out contributes nothing; the query fails only when no
//! partition contributes a value.

use super::pool::{TaskOutcome, run_bounded};
use super::types::{AggregateOp, AggregateResult, PartialResult, PartitionTrace};
use crate::dataset::csv::parse_indexed;
use crate::dataset::types::ColumnKind;
use crate::error::{EdfsError, EdfsResult};
use crate::storage::reconstructor::Reconstructor;
use crate::storage::types::{Block, bucket_matches};

use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AggregateRequest<'a> {
    pub path: &'a str,
    pub column: &'a str,
    pub op: AggregateOp,
    pub hash_filter: Option<&'a str>,
    pub debug: bool,
}

pub struct AggregationEngine {
    reconstructor: Reconstructor,
    max_concurrency: usize,
    task_timeout: Duration,
}

struct MapOutput {
    input: String,
    partial: PartialResult,
}

impl AggregationEngine {
    pub fn new(reconstructor: Reconstructor, max_concurrency: usize, task_timeout: Duration) -> Self {
        Self {
            reconstructor,
            max_concurrency,
            task_timeout,
        }
    }

    pub async fn aggregate(&self, request: AggregateRequest<'_>) -> EdfsResult<AggregateResult> {
        let blocks = self.reconstructor.blocks(request.path).await?;
        if blocks.is_empty() {
            return Err(EdfsError::NoDataAggregated);
        }

        self.validate_column(request.path, request.column, &blocks)
            .await?;

        let selected: Vec<Block> = blocks
            .into_iter()
            .filter(|b| {
                request
                    .hash_filter
                    .is_none_or(|f| bucket_matches(&b.bucket_key, f))
            })
            .collect();
        if selected.is_empty() {
            return Err(EdfsError::NoDataAggregated);
        }

        let numbers: Vec<u32> = selected.iter().map(|b| b.partition_index + 1).collect();
        let workers = selected.len().min(self.max_concurrency);
        tracing::debug!(
            "{} {}.{}: {} partitions on {} workers",
            request.op.label(),
            request.path,
            request.column,
            selected.len(),
            workers
        );

        let path = Arc::new(request.path.to_string());
        let column = Arc::new(request.column.to_string());
        let op = request.op;
        let outcomes = run_bounded(selected, workers, self.task_timeout, |block| {
            let reconstructor = self.reconstructor.clone();
            let path = path.clone();
            let column = column.clone();
            async move {
                let input = reconstructor.read_block(&path, &block).await?;
                let partial = map_partition(op, &input, &column)?;
                Ok(MapOutput { input, partial })
            }
        })
        .await;

        reduce(request.op, request.debug, &numbers, outcomes)
    }

    /// Checks the column against the first partition that can be read.
    async fn validate_column(&self, path: &str, column: &str, blocks: &[Block]) -> EdfsResult<()> {
        for block in blocks {
            let raw = match self.reconstructor.read_block(path, block).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(
                        "Schema sample skipped partition {}: {}",
                        block.partition_index + 1,
                        e
                    );
                    continue;
                }
            };
            let (columns, _) = parse_indexed(&raw)?;
            return match columns.iter().find(|c| c.name == column) {
                None => Err(EdfsError::ColumnNotFound(column.to_string())),
                Some(c) if c.kind != ColumnKind::Numeric => {
                    Err(EdfsError::ColumnNotNumeric(column.to_string()))
                }
                Some(_) => Ok(()),
            };
        }
        Err(EdfsError::NoDataAggregated)
    }
}

/// Computes one partition's partial statistic from its raw payload.
pub fn map_partition(op: AggregateOp, payload: &str, column: &str) -> EdfsResult<PartialResult> {
    let (columns, rows) = parse_indexed(payload)?;
    let position = columns
        .iter()
        .position(|c| c.name == column)
        .ok_or_else(|| EdfsError::ColumnNotFound(column.to_string()))?;

    let values: Vec<f64> = rows
        .iter()
        .filter_map(|row| row.values.get(position).and_then(|v| v.as_number()))
        .collect();
    let count = values.len() as u64;
    if count == 0 {
        return Ok(PartialResult { value: None, count });
    }

    let value = match op {
        AggregateOp::Avg => values.iter().sum::<f64>() / count as f64,
        AggregateOp::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregateOp::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
    };
    Ok(PartialResult {
        value: Some(value),
        count,
    })
}

fn reduce(
    op: AggregateOp,
    debug: bool,
    numbers: &[u32],
    outcomes: Vec<TaskOutcome<MapOutput>>,
) -> EdfsResult<AggregateResult> {
    let mut weighted_sum = 0.0;
    let mut extremum: Option<f64> = None;
    let mut total_count = 0u64;
    let mut partitions_used = 0usize;
    let mut failed_partitions = Vec::new();
    let mut traces = Vec::new();

    for (&partition, outcome) in numbers.iter().zip(outcomes) {
        match outcome {
            TaskOutcome::Done(output) => {
                if let Some(value) = output.partial.value {
                    total_count += output.partial.count;
                    partitions_used += 1;
                    match op {
                        AggregateOp::Avg => weighted_sum += value * output.partial.count as f64,
                        AggregateOp::Max => {
                            extremum = Some(extremum.map_or(value, |e| e.max(value)))
                        }
                        AggregateOp::Min => {
                            extremum = Some(extremum.map_or(value, |e| e.min(value)))
                        }
                    }
                }
                if debug {
                    traces.push(PartitionTrace {
                        partition,
                        input: Some(output.input),
                        output: Some(output.partial),
                        error: None,
                    });
                }
            }
            TaskOutcome::Failed(reason) => {
                tracing::warn!("Partition {} dropped from {}: {}", partition, op.label(), reason);
                failed_partitions.push(partition);
                if debug {
                    traces.push(PartitionTrace {
                        partition,
                        input: None,
                        output: None,
                        error: Some(reason),
                    });
                }
            }
            TaskOutcome::TimedOut => {
                tracing::warn!("Partition {} timed out during {}", partition, op.label());
                failed_partitions.push(partition);
                if debug {
                    traces.push(PartitionTrace {
                        partition,
                        input: None,
                        output: None,
                        error: Some("timed out".to_string()),
                    });
                }
            }
        }
    }

    if total_count == 0 {
        return Err(EdfsError::NoDataAggregated);
    }

    let value = match op {
        AggregateOp::Avg => weighted_sum / total_count as f64,
        AggregateOp::Max | AggregateOp::Min => extremum.ok_or(EdfsError::NoDataAggregated)?,
    };

    Ok(AggregateResult {
        op,
        value,
        total_count,
        partitions_used,
        failed_partitions,
        explanation: debug.then_some(traces),
    })
}
