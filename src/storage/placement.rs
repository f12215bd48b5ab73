//! Block Placement
//!
//! Ingestion path for `put`: partitions a dataset, picks replica targets for
//! every partition and writes each block to all of them, then records the
//! block catalogue entry.
//!
//! Replica writes are not atomic. A failed write is logged and that replica
//! is left out of the catalogue; the remaining replicas stay in place.

use super::allocator::ReplicaAllocator;
use super::backend::StorageBackend;
use super::types::{Block, BlockId, Replica};
use crate::dataset::csv::{encode_indexed, parse_table};
use crate::dataset::partitioner::{PartitionRequest, partition};
use crate::dataset::types::Table;
use crate::error::{EdfsError, EdfsResult};
use crate::namespace::locks::PathLocks;
use crate::namespace::resolver::{PathResolver, normalize};
use crate::namespace::types::{InodeKind, NewInode, join_segments, parent_path};

use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PlacementSettings {
    pub replication_factor: usize,
    pub max_partition_size: u64,
    pub file_permission: u32,
}

pub struct BlockPlacementEngine {
    store: Arc<dyn StorageBackend>,
    resolver: PathResolver,
    locks: Arc<PathLocks>,
    settings: PlacementSettings,
}

impl BlockPlacementEngine {
    pub fn new(
        store: Arc<dyn StorageBackend>,
        resolver: PathResolver,
        locks: Arc<PathLocks>,
        settings: PlacementSettings,
    ) -> Self {
        Self {
            store,
            resolver,
            locks,
            settings,
        }
    }

    /// Stores `table` at `path`. `total_bytes` is the size of the dataset as
    /// it was read. Returns the number of partitions written.
    pub async fn put(
        &self,
        path: &str,
        table: Table,
        total_bytes: u64,
        requested_partitions: u32,
        hash_attr: Option<&str>,
    ) -> EdfsResult<u32> {
        let segments = normalize(path)?;
        let Some(name) = segments.last().cloned() else {
            return Err(EdfsError::AlreadyExists(path.to_string()));
        };
        let full_path = join_segments(&segments);
        let parent_dir = parent_path(&full_path);

        let _guard = self
            .locks
            .acquire([parent_dir.clone(), full_path.clone()])
            .await;

        let parent = self
            .resolver
            .lookup(&parent_dir)
            .await?
            .ok_or_else(|| EdfsError::PathNotFound(parent_dir.clone()))?;
        if !parent.is_dir() {
            return Err(EdfsError::NotADirectory(parent_dir));
        }
        if self.resolver.resolve(&full_path).await?.exists {
            return Err(EdfsError::AlreadyExists(full_path));
        }

        let plan = partition(
            table,
            PartitionRequest {
                requested_partitions,
                max_partition_bytes: self.settings.max_partition_size,
                total_bytes,
                hash_attr,
            },
        )?;

        let file = self
            .store
            .create_inode(NewInode {
                parent: parent.id,
                path: full_path.clone(),
                name,
                kind: InodeKind::File,
                permission: self.settings.file_permission,
                replication: Some(self.settings.replication_factor as u32),
            })
            .await?;
        self.store.link_parent_child(parent.id, file.id).await?;

        let pool = self.store.node_ids();
        for planned in &plan.partitions {
            let payload = encode_indexed(&plan.columns, &planned.rows);
            let block_id = BlockId::new();
            let targets = ReplicaAllocator::allocate(self.settings.replication_factor, &pool)?;

            let mut replicas = Vec::with_capacity(targets.len());
            for (slot, node) in targets.into_iter().enumerate() {
                if let Err(e) = self.store.put_block(node, &block_id, &payload).await {
                    tracing::warn!(
                        "Replica {} of block {} failed on {}: {}",
                        slot + 1,
                        block_id,
                        node,
                        e
                    );
                    continue;
                }
                self.store
                    .adjust_node_block_count(node, 1, payload.len() as i64)
                    .await?;
                replicas.push(Replica {
                    node,
                    replica_number: replicas.len() as u32 + 1,
                    content_ref: block_id.clone(),
                });
            }

            if replicas.is_empty() {
                return Err(EdfsError::Backend(anyhow::anyhow!(
                    "no replica of partition {} of {} could be written",
                    planned.index,
                    full_path
                )));
            }

            let block = Block {
                id: block_id,
                file: file.id,
                partition_index: planned.index,
                bucket_key: planned.bucket_key.clone(),
                size_bytes: payload.len() as u64,
                replicas,
            };
            self.store.record_block(&block).await?;

            tracing::debug!(
                "Block {} (partition {}, bucket {}) on {:?}",
                block.id,
                block.partition_index,
                block.bucket_key,
                block.replicas.iter().map(|r| r.node.0).collect::<Vec<_>>()
            );
        }

        let written = plan.partitions.len() as u32;
        tracing::info!(
            "put {}: {} partitions x{} replicas ({} rows/partition)",
            full_path,
            written,
            self.settings.replication_factor,
            plan.rows_per_partition
        );
        Ok(written)
    }

    /// Parses CSV text and stores it; the text length is the dataset size.
    pub async fn put_csv(
        &self,
        path: &str,
        csv: &str,
        requested_partitions: u32,
        hash_attr: Option<&str>,
    ) -> EdfsResult<u32> {
        let table = parse_table(csv)?;
        self.put(path, table, csv.len() as u64, requested_partitions, hash_attr)
            .await
    }

    /// Reads a local `.csv` file and stores it at `path`.
    pub async fn put_source(
        &self,
        source: &Path,
        path: &str,
        requested_partitions: u32,
        hash_attr: Option<&str>,
    ) -> EdfsResult<u32> {
        let display = source.display().to_string();
        let metadata = match tokio::fs::metadata(source).await {
            Ok(metadata) => metadata,
            Err(_) => return Err(EdfsError::SourceFileNotFound(display)),
        };

        let is_csv = source
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !metadata.is_file() || !is_csv {
            return Err(EdfsError::InvalidFileType(display));
        }

        let text = tokio::fs::read_to_string(source)
            .await
            .map_err(|e| EdfsError::Backend(anyhow::anyhow!("cannot read {}: {}", display, e)))?;
        let table = parse_table(&text)?;

        self.put(path, table, metadata.len(), requested_partitions, hash_attr)
            .await
    }
}
