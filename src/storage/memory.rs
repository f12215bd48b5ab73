//! In-memory document-tree backend.
//!
//! Mirrors a hierarchical key-value store: an inode section indexed by id and
//! by path, a directory section mapping every directory to its children, and
//! one block map per datanode with a small metadata record of counters.
//! Namespace lookups go one level at a time.

use super::backend::{BlockStore, MetadataStore, StorageBackend, apply_delta};
use super::types::{Block, BlockId, DatanodeStats, NodeId};
use crate::namespace::types::{InodeEntry, InodeId, InodeKind, NewInode, ROOT_PATH, now_ms};

use anyhow::{Result, bail};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU64, Ordering};

pub struct MemoryBackend {
    inodes: DashMap<InodeId, InodeEntry>,
    path_index: DashMap<String, InodeId>,
    directory_section: DashMap<InodeId, Vec<InodeId>>,
    blocks: DashMap<InodeId, Vec<Block>>,
    datanodes: DashMap<NodeId, DashMap<BlockId, String>>,
    datanode_metadata: DashMap<NodeId, (u64, u64)>,
    offline: DashSet<NodeId>,
    next_inode: AtomicU64,
    root: InodeId,
}

impl MemoryBackend {
    pub fn new(datanode_count: u32, root_permission: u32) -> Self {
        let root = InodeId(1);
        let now = now_ms();
        let root_entry = InodeEntry {
            id: root,
            path: ROOT_PATH.to_string(),
            name: String::new(),
            kind: InodeKind::Directory,
            permission: root_permission,
            replication: None,
            created_at: now,
            modified_at: now,
            parent: None,
        };

        let inodes = DashMap::new();
        inodes.insert(root, root_entry);
        let path_index = DashMap::new();
        path_index.insert(ROOT_PATH.to_string(), root);
        let directory_section = DashMap::new();
        directory_section.insert(root, Vec::new());

        let datanodes = DashMap::new();
        let datanode_metadata = DashMap::new();
        for n in 1..=datanode_count {
            datanodes.insert(NodeId(n), DashMap::new());
            datanode_metadata.insert(NodeId(n), (0, 0));
        }

        Self {
            inodes,
            path_index,
            directory_section,
            blocks: DashMap::new(),
            datanodes,
            datanode_metadata,
            offline: DashSet::new(),
            next_inode: AtomicU64::new(root.0 + 1),
            root,
        }
    }

    /// Makes a datanode unreachable (or reachable again) for block I/O.
    pub fn set_node_offline(&self, node: NodeId, offline: bool) {
        if offline {
            self.offline.insert(node);
            tracing::warn!("{} marked unreachable", node);
        } else {
            self.offline.remove(&node);
            tracing::info!("{} reachable again", node);
        }
    }

    /// Drops a block's content from one node without touching any metadata.
    pub fn corrupt_replica(&self, node: NodeId, block: &BlockId) {
        if let Some(store) = self.datanodes.get(&node) {
            store.remove(block);
        }
    }

    fn check_reachable(&self, node: NodeId) -> Result<()> {
        if self.offline.contains(&node) {
            bail!("{} is unreachable", node);
        }
        if !self.datanodes.contains_key(&node) {
            bail!("{} does not exist", node);
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for MemoryBackend {
    async fn root(&self) -> Result<InodeEntry> {
        self.inodes
            .get(&self.root)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow::anyhow!("root inode missing"))
    }

    async fn get_inode(&self, id: InodeId) -> Result<Option<InodeEntry>> {
        Ok(self.inodes.get(&id).map(|entry| entry.value().clone()))
    }

    async fn get_inode_by_path(&self, path: &str) -> Result<Option<InodeEntry>> {
        let id = match self.path_index.get(path) {
            Some(id) => *id,
            None => return Ok(None),
        };
        self.get_inode(id).await
    }

    async fn list_children(&self, id: InodeId) -> Result<Vec<InodeEntry>> {
        let child_ids = self
            .directory_section
            .get(&id)
            .map(|children| children.value().clone())
            .unwrap_or_default();

        Ok(child_ids
            .iter()
            .filter_map(|child| self.inodes.get(child).map(|e| e.value().clone()))
            .collect())
    }

    async fn create_inode(&self, new: NewInode) -> Result<InodeEntry> {
        if !self.inodes.contains_key(&new.parent) {
            bail!("parent inode {} does not exist", new.parent);
        }

        let id = InodeId(self.next_inode.fetch_add(1, Ordering::SeqCst));
        match self.path_index.entry(new.path.clone()) {
            Entry::Occupied(_) => bail!("path {} already has an inode", new.path),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let now = now_ms();
        let entry = InodeEntry {
            id,
            path: new.path,
            name: new.name,
            kind: new.kind,
            permission: new.permission,
            replication: new.replication,
            created_at: now,
            modified_at: now,
            parent: Some(new.parent),
        };
        if entry.kind == InodeKind::Directory {
            self.directory_section.insert(id, Vec::new());
        }
        self.inodes.insert(id, entry.clone());

        Ok(entry)
    }

    async fn delete_inode(&self, id: InodeId) -> Result<()> {
        if id == self.root {
            bail!("root inode cannot be deleted");
        }
        if let Some((_, entry)) = self.inodes.remove(&id) {
            self.path_index.remove(&entry.path);
        }
        self.directory_section.remove(&id);
        Ok(())
    }

    async fn link_parent_child(&self, parent: InodeId, child: InodeId) -> Result<()> {
        let mut children = match self.directory_section.get_mut(&parent) {
            Some(children) => children,
            None => bail!("inode {} is not a directory", parent),
        };
        if !children.contains(&child) {
            children.push(child);
        }
        Ok(())
    }

    async fn unlink_parent_child(&self, parent: InodeId, child: InodeId) -> Result<()> {
        if let Some(mut children) = self.directory_section.get_mut(&parent) {
            children.retain(|c| *c != child);
        }
        Ok(())
    }

    async fn has_children(&self, id: InodeId) -> Result<bool> {
        Ok(self
            .directory_section
            .get(&id)
            .map(|children| !children.is_empty())
            .unwrap_or(false))
    }

    async fn record_block(&self, block: &Block) -> Result<()> {
        let mut blocks = self.blocks.entry(block.file).or_default();
        blocks.push(block.clone());
        blocks.sort_by_key(|b| b.partition_index);
        Ok(())
    }

    async fn blocks_for_file(&self, file: InodeId) -> Result<Vec<Block>> {
        Ok(self
            .blocks
            .get(&file)
            .map(|blocks| blocks.value().clone())
            .unwrap_or_default())
    }

    async fn delete_blocks_for_file(&self, file: InodeId) -> Result<Vec<Block>> {
        Ok(self
            .blocks
            .remove(&file)
            .map(|(_, blocks)| blocks)
            .unwrap_or_default())
    }
}

#[async_trait]
impl BlockStore for MemoryBackend {
    fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.datanodes.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    async fn put_block(&self, node: NodeId, block: &BlockId, content: &str) -> Result<()> {
        self.check_reachable(node)?;
        if let Some(store) = self.datanodes.get(&node) {
            store.insert(block.clone(), content.to_string());
        }
        Ok(())
    }

    async fn get_block(&self, node: NodeId, block: &BlockId) -> Result<Option<String>> {
        self.check_reachable(node)?;
        Ok(self
            .datanodes
            .get(&node)
            .and_then(|store| store.get(block).map(|content| content.value().clone())))
    }

    async fn delete_block(&self, node: NodeId, block: &BlockId) -> Result<()> {
        self.check_reachable(node)?;
        if let Some(store) = self.datanodes.get(&node) {
            store.remove(block);
        }
        Ok(())
    }

    async fn node_block_count(&self, node: NodeId) -> Result<DatanodeStats> {
        let (blocks, bytes) = self
            .datanode_metadata
            .get(&node)
            .map(|counters| *counters.value())
            .ok_or_else(|| anyhow::anyhow!("{} does not exist", node))?;
        Ok(DatanodeStats::new(node, blocks, bytes))
    }

    async fn adjust_node_block_count(
        &self,
        node: NodeId,
        block_delta: i64,
        byte_delta: i64,
    ) -> Result<DatanodeStats> {
        let mut counters = match self.datanode_metadata.get_mut(&node) {
            Some(counters) => counters,
            None => bail!("{} does not exist", node),
        };
        let (blocks, bytes) = *counters;
        *counters = (apply_delta(blocks, block_delta), apply_delta(bytes, byte_delta));
        Ok(DatanodeStats::new(node, counters.0, counters.1))
    }
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }
}
