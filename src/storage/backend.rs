//! Storage Backend Contracts
//!
//! The engines only ever see these traits. A backend pairs a metadata store
//! (namespace tree and block catalogue) with the datanodes' block stores.
//!
//! Implementations must serialize their own internal state; cross-call
//! isolation for writers of one path is provided by `PathLocks`.

use super::types::{Block, BlockId, DatanodeStats, NodeId};
use crate::namespace::types::{EdgeRecord, InodeEntry, InodeId, NewInode};

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn root(&self) -> Result<InodeEntry>;

    async fn get_inode(&self, id: InodeId) -> Result<Option<InodeEntry>>;

    async fn get_inode_by_path(&self, path: &str) -> Result<Option<InodeEntry>>;

    async fn list_children(&self, id: InodeId) -> Result<Vec<InodeEntry>>;

    /// Point lookup of one child by name.
    async fn child_by_name(&self, parent: InodeId, name: &str) -> Result<Option<InodeEntry>> {
        Ok(self
            .list_children(parent)
            .await?
            .into_iter()
            .find(|child| child.name == name))
    }

    /// The whole parent-child relation in one read, for backends that can
    /// produce it cheaply. `None` means "walk one level at a time".
    async fn edge_snapshot(&self) -> Result<Option<Vec<EdgeRecord>>> {
        Ok(None)
    }

    async fn create_inode(&self, new: NewInode) -> Result<InodeEntry>;

    async fn delete_inode(&self, id: InodeId) -> Result<()>;

    async fn link_parent_child(&self, parent: InodeId, child: InodeId) -> Result<()>;

    async fn unlink_parent_child(&self, parent: InodeId, child: InodeId) -> Result<()>;

    async fn has_children(&self, id: InodeId) -> Result<bool> {
        Ok(!self.list_children(id).await?.is_empty())
    }

    async fn record_block(&self, block: &Block) -> Result<()>;

    /// Blocks of a file ordered by partition index.
    async fn blocks_for_file(&self, file: InodeId) -> Result<Vec<Block>>;

    /// Removes and returns the block catalogue entries of a file.
    async fn delete_blocks_for_file(&self, file: InodeId) -> Result<Vec<Block>>;
}

#[async_trait]
pub trait BlockStore: Send + Sync {
    /// The datanode pool replicas are placed on.
    fn node_ids(&self) -> Vec<NodeId>;

    async fn put_block(&self, node: NodeId, block: &BlockId, content: &str) -> Result<()>;

    /// `Ok(None)` when the node is reachable but holds no such block.
    async fn get_block(&self, node: NodeId, block: &BlockId) -> Result<Option<String>>;

    async fn delete_block(&self, node: NodeId, block: &BlockId) -> Result<()>;

    async fn node_block_count(&self, node: NodeId) -> Result<DatanodeStats>;

    async fn adjust_node_block_count(
        &self,
        node: NodeId,
        block_delta: i64,
        byte_delta: i64,
    ) -> Result<DatanodeStats>;
}

/// A complete backend: namespace, block catalogue and datanodes.
pub trait StorageBackend: MetadataStore + BlockStore {
    fn name(&self) -> &'static str;
}

pub(crate) fn apply_delta(current: u64, delta: i64) -> u64 {
    if delta >= 0 {
        current.saturating_add(delta as u64)
    } else {
        current.saturating_sub(delta.unsigned_abs())
    }
}
