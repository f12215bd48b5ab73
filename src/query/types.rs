use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    Avg,
    Max,
    Min,
}

impl AggregateOp {
    pub fn label(&self) -> &'static str {
        match self {
            AggregateOp::Avg => "average",
            AggregateOp::Max => "maximum",
            AggregateOp::Min => "minimum",
        }
    }
}

/// Output of one map task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartialResult {
    /// Mean for `Avg`, extremum for `Max`/`Min`. `None` when the partition
    /// holds no numeric value in the column.
    pub value: Option<f64>,
    /// Non-null numeric cells seen.
    pub count: u64,
}

/// Per-partition record attached to a debug aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartitionTrace {
    /// 1-based, as shown to users.
    pub partition: u32,
    pub input: Option<String>,
    pub output: Option<PartialResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateResult {
    pub op: AggregateOp,
    pub value: f64,
    pub total_count: u64,
    pub partitions_used: usize,
    /// 1-based numbers of partitions whose map task failed or timed out.
    pub failed_partitions: Vec<u32>,
    pub explanation: Option<Vec<PartitionTrace>>,
}

impl AggregateResult {
    pub fn summary(&self) -> String {
        format!("The overall {} is {:.3}", self.op.label(), self.value)
    }
}
