//! Block Reconstruction
//!
//! Read path. A partition is served by the first replica that answers; a
//! whole file is put back together from one replica per block and re-sorted
//! by the row index written at ingestion.

use super::backend::StorageBackend;
use super::types::{Block, PartitionLocations, ReplicaLocation, bucket_matches};
use crate::dataset::csv::parse_indexed;
use crate::dataset::types::{Column, IndexedRow, Table};
use crate::error::{EdfsError, EdfsResult};
use crate::namespace::resolver::PathResolver;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[derive(Clone)]
pub struct Reconstructor {
    store: Arc<dyn StorageBackend>,
    resolver: PathResolver,
}

impl Reconstructor {
    pub fn new(store: Arc<dyn StorageBackend>, resolver: PathResolver) -> Self {
        Self { store, resolver }
    }

    /// Blocks of the file at `path`, ordered by partition index.
    pub async fn blocks(&self, path: &str) -> EdfsResult<Vec<Block>> {
        let file = self.resolver.require_file(path).await?;
        Ok(self.store.blocks_for_file(file.id).await?)
    }

    /// Content of one block from the first replica that yields it.
    pub async fn read_block(&self, path: &str, block: &Block) -> EdfsResult<String> {
        for replica in &block.replicas {
            match self.store.get_block(replica.node, &replica.content_ref).await {
                Ok(Some(content)) => return Ok(content),
                Ok(None) => tracing::warn!(
                    "Replica {} of block {} missing on {}",
                    replica.replica_number,
                    block.id,
                    replica.node
                ),
                Err(e) => tracing::warn!(
                    "Replica {} of block {} unreadable on {}: {}",
                    replica.replica_number,
                    block.id,
                    replica.node,
                    e
                ),
            }
        }

        Err(EdfsError::NoContentForPartition {
            path: path.to_string(),
            partition: block.partition_index,
        })
    }

    /// Raw payload of partition `partition_index` (zero-based), index column included.
    pub async fn read_partition_raw(&self, path: &str, partition_index: u32) -> EdfsResult<String> {
        let blocks = self.blocks(path).await?;
        let block = blocks
            .iter()
            .find(|b| b.partition_index == partition_index)
            .ok_or_else(|| EdfsError::NoPartitionsFound(path.to_string()))?;
        self.read_block(path, block).await
    }

    /// Partition `partition_index` as a table in original row order, without the index column.
    pub async fn read_partition(&self, path: &str, partition_index: u32) -> EdfsResult<Table> {
        let raw = self.read_partition_raw(path, partition_index).await?;
        let (columns, rows) = parse_indexed(&raw)?;
        Ok(into_table(columns, rows))
    }

    /// The whole file in the order it was ingested. `None` for a file with no blocks.
    pub async fn cat(&self, path: &str) -> EdfsResult<Option<Table>> {
        let blocks = self.blocks(path).await?;
        if blocks.is_empty() {
            return Ok(None);
        }

        let mut columns: Option<Vec<Column>> = None;
        let mut seen = HashSet::new();
        let mut rows = Vec::new();

        for block in &blocks {
            let raw = self.read_block(path, block).await?;
            let (block_columns, block_rows) = parse_indexed(&raw)?;
            if columns.is_none() {
                columns = Some(block_columns);
            }
            rows.extend(block_rows.into_iter().filter(|row| seen.insert(row.index)));
        }

        rows.sort_by_key(|row| row.index);
        tracing::debug!("cat {}: {} rows from {} blocks", path, rows.len(), blocks.len());

        Ok(Some(into_table(columns.unwrap_or_default(), rows)))
    }

    /// Replica placement per partition, optionally pruned to one hash bucket.
    /// Partition numbers in the result are 1-based.
    pub async fn partition_locations(
        &self,
        path: &str,
        hash_filter: Option<&str>,
    ) -> EdfsResult<PartitionLocations> {
        let blocks = self.blocks(path).await?;

        let mut replicas: BTreeMap<u32, BTreeMap<u32, ReplicaLocation>> = BTreeMap::new();
        for block in blocks
            .iter()
            .filter(|b| hash_filter.is_none_or(|f| bucket_matches(&b.bucket_key, f)))
        {
            for replica in &block.replicas {
                replicas.entry(replica.replica_number).or_default().insert(
                    block.partition_index + 1,
                    ReplicaLocation {
                        node: replica.node,
                        block: replica.content_ref.clone(),
                    },
                );
            }
        }

        if replicas.is_empty() {
            return Err(EdfsError::NoPartitionsFound(path.to_string()));
        }
        Ok(PartitionLocations { replicas })
    }
}

fn into_table(columns: Vec<Column>, mut rows: Vec<IndexedRow>) -> Table {
    rows.sort_by_key(|row| row.index);
    Table {
        columns,
        rows: rows.into_iter().map(|row| row.values).collect(),
    }
}
