use crate::namespace::types::InodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a storage node (datanode), numbered from 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Datanode {}", self.0)
    }
}

/// Opaque block token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BlockId(pub String);

impl BlockId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One physical copy of a block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Replica {
    pub node: NodeId,
    /// 1..=replication factor.
    pub replica_number: u32,
    /// Key of the content in the node's block store.
    pub content_ref: BlockId,
}

/// Block metadata. Created once at ingestion, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub file: InodeId,
    pub partition_index: u32,
    pub bucket_key: String,
    pub size_bytes: u64,
    pub replicas: Vec<Replica>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatanodeStats {
    pub node: NodeId,
    pub block_count: u64,
    pub byte_count: u64,
    pub empty: bool,
}

impl DatanodeStats {
    pub fn new(node: NodeId, block_count: u64, byte_count: u64) -> Self {
        Self {
            node,
            block_count,
            byte_count,
            empty: block_count == 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplicaLocation {
    pub node: NodeId,
    pub block: BlockId,
}

/// Where every partition of a file lives, grouped by replica number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartitionLocations {
    /// replica number -> 1-based partition number -> location
    pub replicas: BTreeMap<u32, BTreeMap<u32, ReplicaLocation>>,
}

impl PartitionLocations {
    pub fn partition_count(&self) -> usize {
        self.replicas.values().map(|p| p.len()).max().unwrap_or(0)
    }
}

/// True when a caller-supplied hash filter selects a block's bucket key.
/// Equal strings match, as do two spellings of the same number.
pub fn bucket_matches(bucket_key: &str, filter: &str) -> bool {
    if bucket_key == filter {
        return true;
    }
    match (bucket_key.trim().parse::<f64>(), filter.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
