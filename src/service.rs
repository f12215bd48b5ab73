//! The `Edfs` facade: one backend, every engine wired over it.

use crate::config::EdfsConfig;
use crate::dataset::types::Table;
use crate::error::EdfsResult;
use crate::namespace::locks::PathLocks;
use crate::namespace::manager::{Listing, NamespaceManager};
use crate::namespace::resolver::PathResolver;
use crate::namespace::types::{InodeEntry, PathResolution};
use crate::query::engine::{AggregateRequest, AggregationEngine};
use crate::query::types::{AggregateOp, AggregateResult};
use crate::storage::backend::StorageBackend;
use crate::storage::memory::MemoryBackend;
use crate::storage::placement::{BlockPlacementEngine, PlacementSettings};
use crate::storage::reconstructor::Reconstructor;
use crate::storage::sqlite::SqliteBackend;
use crate::storage::types::{DatanodeStats, PartitionLocations};

use std::path::Path;
use std::sync::Arc;

pub struct Edfs {
    config: EdfsConfig,
    store: Arc<dyn StorageBackend>,
    locks: Arc<PathLocks>,
    resolver: PathResolver,
    namespace: NamespaceManager,
    placement: BlockPlacementEngine,
    reconstructor: Reconstructor,
    aggregation: AggregationEngine,
}

impl Edfs {
    pub fn new(store: Arc<dyn StorageBackend>, config: EdfsConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let node_count = store.node_ids().len();
        if config.replication_factor > node_count {
            anyhow::bail!(
                "replication factor {} exceeds the {} datanodes of the {} backend",
                config.replication_factor,
                node_count,
                store.name()
            );
        }

        let locks = Arc::new(PathLocks::new());
        let resolver = PathResolver::new(store.clone());
        let namespace = NamespaceManager::new(
            store.clone(),
            resolver.clone(),
            locks.clone(),
            config.default_dir_permission,
        );
        let placement = BlockPlacementEngine::new(
            store.clone(),
            resolver.clone(),
            locks.clone(),
            PlacementSettings {
                replication_factor: config.replication_factor,
                max_partition_size: config.max_partition_size,
                file_permission: config.default_file_permission,
            },
        );
        let reconstructor = Reconstructor::new(store.clone(), resolver.clone());
        let aggregation = AggregationEngine::new(
            reconstructor.clone(),
            config.max_concurrency,
            config.map_task_timeout,
        );

        tracing::info!(
            "EDFS ready on {} backend ({} datanodes, replication {})",
            store.name(),
            node_count,
            config.replication_factor
        );

        Ok(Self {
            config,
            store,
            locks,
            resolver,
            namespace,
            placement,
            reconstructor,
            aggregation,
        })
    }

    pub fn in_memory(config: EdfsConfig) -> anyhow::Result<Self> {
        let store = Arc::new(MemoryBackend::new(
            config.datanode_count,
            config.default_dir_permission,
        ));
        Self::new(store, config)
    }

    pub fn sqlite(db_path: impl AsRef<Path>, config: EdfsConfig) -> anyhow::Result<Self> {
        let store = Arc::new(SqliteBackend::open(
            db_path,
            config.datanode_count,
            config.default_dir_permission,
        )?);
        Self::new(store, config)
    }

    pub fn config(&self) -> &EdfsConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.name()
    }

    /// Paths currently locked or awaited by a namespace write.
    pub fn lock_count(&self) -> usize {
        self.locks.tracked()
    }

    pub async fn resolve(&self, path: &str) -> EdfsResult<PathResolution> {
        self.resolver.resolve(path).await
    }

    pub async fn stat(&self, path: &str) -> EdfsResult<InodeEntry> {
        self.resolver.require(path).await
    }

    pub async fn mkdir(&self, path: &str) -> EdfsResult<InodeEntry> {
        self.namespace.mkdir(path).await
    }

    pub async fn ls(&self, path: &str) -> EdfsResult<Listing> {
        self.namespace.ls(path).await
    }

    pub async fn rm(&self, path: &str) -> EdfsResult<()> {
        self.namespace.rm(path).await
    }

    /// Stores CSV text at `path`. Returns the number of partitions written.
    pub async fn put(
        &self,
        path: &str,
        csv: &str,
        partitions: u32,
        hash_attr: Option<&str>,
    ) -> EdfsResult<u32> {
        self.placement.put_csv(path, csv, partitions, hash_attr).await
    }

    pub async fn put_table(
        &self,
        path: &str,
        table: Table,
        total_bytes: u64,
        partitions: u32,
        hash_attr: Option<&str>,
    ) -> EdfsResult<u32> {
        self.placement
            .put(path, table, total_bytes, partitions, hash_attr)
            .await
    }

    pub async fn put_source(
        &self,
        source: &Path,
        path: &str,
        partitions: u32,
        hash_attr: Option<&str>,
    ) -> EdfsResult<u32> {
        self.placement
            .put_source(source, path, partitions, hash_attr)
            .await
    }

    pub async fn cat(&self, path: &str) -> EdfsResult<Option<Table>> {
        self.reconstructor.cat(path).await
    }

    /// `partition` is zero-based.
    pub async fn read_partition(&self, path: &str, partition: u32) -> EdfsResult<Table> {
        self.reconstructor.read_partition(path, partition).await
    }

    pub async fn read_partition_raw(&self, path: &str, partition: u32) -> EdfsResult<String> {
        self.reconstructor.read_partition_raw(path, partition).await
    }

    pub async fn partition_locations(
        &self,
        path: &str,
        hash_filter: Option<&str>,
    ) -> EdfsResult<PartitionLocations> {
        self.reconstructor
            .partition_locations(path, hash_filter)
            .await
    }

    pub async fn aggregate(
        &self,
        path: &str,
        column: &str,
        op: AggregateOp,
        hash_filter: Option<&str>,
        debug: bool,
    ) -> EdfsResult<AggregateResult> {
        self.aggregation
            .aggregate(AggregateRequest {
                path,
                column,
                op,
                hash_filter,
                debug,
            })
            .await
    }

    pub async fn datanode_stats(&self) -> EdfsResult<Vec<DatanodeStats>> {
        let mut stats = Vec::new();
        for node in self.store.node_ids() {
            stats.push(self.store.node_block_count(node).await?);
        }
        Ok(stats)
    }
}
