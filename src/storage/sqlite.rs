//! Relational backend on SQLite.
//!
//! Tables: `namenode` (inodes keyed by full path), `parent_child` (edges),
//! `block_info` + `block_replica` (block catalogue), `datanode_block`
//! (replica content per datanode) and `datanode_meta` (per-node counters).
//! All statements are parameterized. Every call runs on the blocking pool
//! so a slow query never stalls the async workers.

use super::backend::{BlockStore, MetadataStore, StorageBackend};
use super::types::{Block, BlockId, DatanodeStats, NodeId, Replica};
use crate::namespace::types::{
    EdgeRecord, InodeEntry, InodeId, InodeKind, NewInode, ROOT_PATH, now_ms,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS namenode (
        inode_num INTEGER PRIMARY KEY AUTOINCREMENT,
        node_type TEXT NOT NULL,
        name TEXT NOT NULL UNIQUE,
        short_name TEXT NOT NULL,
        replication INTEGER,
        permission INTEGER NOT NULL,
        ctime INTEGER NOT NULL,
        mtime INTEGER NOT NULL,
        parent_inode INTEGER
    );
    CREATE TABLE IF NOT EXISTS parent_child (
        parent_inode INTEGER NOT NULL,
        child_inode INTEGER NOT NULL UNIQUE,
        PRIMARY KEY (parent_inode, child_inode)
    );
    CREATE TABLE IF NOT EXISTS block_info (
        block_id TEXT PRIMARY KEY,
        file_inode INTEGER NOT NULL,
        hash_attribute TEXT NOT NULL,
        num_bytes INTEGER NOT NULL,
        partition_index INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS block_info_file ON block_info (file_inode, partition_index);
    CREATE TABLE IF NOT EXISTS block_replica (
        block_id TEXT NOT NULL,
        replica_num INTEGER NOT NULL,
        datanode INTEGER NOT NULL,
        data_block_id TEXT NOT NULL,
        PRIMARY KEY (block_id, replica_num)
    );
    CREATE TABLE IF NOT EXISTS datanode_block (
        datanode INTEGER NOT NULL,
        data_block_id TEXT NOT NULL,
        content TEXT NOT NULL,
        PRIMARY KEY (datanode, data_block_id)
    );
    CREATE TABLE IF NOT EXISTS datanode_meta (
        datanode INTEGER PRIMARY KEY,
        block_count INTEGER NOT NULL,
        byte_count INTEGER NOT NULL
    );
";

const INODE_COLUMNS: &str =
    "inode_num, node_type, name, short_name, replication, permission, ctime, mtime, parent_inode";

pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    datanode_count: u32,
}

impl SqliteBackend {
    pub fn open(db_path: impl AsRef<Path>, datanode_count: u32, root_permission: u32) -> Result<Self> {
        let path = db_path.as_ref();
        tracing::debug!("SqliteBackend: opening {}", path.display());
        let conn = Connection::open(path)
            .with_context(|| format!("cannot open database {}", path.display()))?;
        Self::init(conn, datanode_count, root_permission)
    }

    pub fn open_in_memory(datanode_count: u32, root_permission: u32) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, datanode_count, root_permission)
    }

    fn init(conn: Connection, datanode_count: u32, root_permission: u32) -> Result<Self> {
        conn.execute_batch(SCHEMA).context("cannot create schema")?;

        let now = now_ms() as i64;
        conn.execute(
            "INSERT OR IGNORE INTO namenode
             (node_type, name, short_name, replication, permission, ctime, mtime, parent_inode)
             VALUES ('d', ?1, '', NULL, ?2, ?3, ?3, NULL)",
            params![ROOT_PATH, root_permission, now],
        )?;
        for n in 1..=datanode_count {
            conn.execute(
                "INSERT OR IGNORE INTO datanode_meta (datanode, block_count, byte_count)
                 VALUES (?1, 0, 0)",
                params![n],
            )?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            datanode_count,
        })
    }

    /// Runs `f` against the connection on a blocking thread.
    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("sqlite connection lock poisoned"))?;
            f(&mut guard)
        })
        .await
        .context("sqlite task failed")?
    }
}

fn row_to_inode(row: &Row<'_>) -> rusqlite::Result<InodeEntry> {
    let node_type: String = row.get(1)?;
    let replication: Option<i64> = row.get(4)?;
    let parent: Option<i64> = row.get(8)?;
    Ok(InodeEntry {
        id: InodeId(row.get::<_, i64>(0)? as u64),
        kind: if node_type == "d" {
            InodeKind::Directory
        } else {
            InodeKind::File
        },
        path: row.get(2)?,
        name: row.get(3)?,
        replication: replication.map(|r| r as u32),
        permission: row.get::<_, i64>(5)? as u32,
        created_at: row.get::<_, i64>(6)? as u64,
        modified_at: row.get::<_, i64>(7)? as u64,
        parent: parent.map(|p| InodeId(p as u64)),
    })
}

fn load_blocks(conn: &Connection, file: InodeId) -> Result<Vec<Block>> {
    let mut stmt = conn.prepare(
        "SELECT block_id, hash_attribute, num_bytes, partition_index
         FROM block_info WHERE file_inode = ?1 ORDER BY partition_index",
    )?;
    let headers = stmt
        .query_map(params![file.0 as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut replica_stmt = conn.prepare(
        "SELECT replica_num, datanode, data_block_id
         FROM block_replica WHERE block_id = ?1 ORDER BY replica_num",
    )?;

    let mut blocks = Vec::with_capacity(headers.len());
    for (block_id, bucket_key, size, partition_index) in headers {
        let replicas = replica_stmt
            .query_map(params![block_id], |row| {
                Ok(Replica {
                    replica_number: row.get::<_, i64>(0)? as u32,
                    node: NodeId(row.get::<_, i64>(1)? as u32),
                    content_ref: BlockId(row.get(2)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        blocks.push(Block {
            id: BlockId(block_id),
            file,
            partition_index: partition_index as u32,
            bucket_key,
            size_bytes: size as u64,
            replicas,
        });
    }

    Ok(blocks)
}

#[async_trait]
impl MetadataStore for SqliteBackend {
    async fn root(&self) -> Result<InodeEntry> {
        self.get_inode_by_path(ROOT_PATH)
            .await?
            .ok_or_else(|| anyhow::anyhow!("root inode missing"))
    }

    async fn get_inode(&self, id: InodeId) -> Result<Option<InodeEntry>> {
        self.call(move |conn| {
            let entry = conn
                .query_row(
                    &format!("SELECT {} FROM namenode WHERE inode_num = ?1", INODE_COLUMNS),
                    params![id.0 as i64],
                    row_to_inode,
                )
                .optional()?;
            Ok(entry)
        })
        .await
    }

    async fn get_inode_by_path(&self, path: &str) -> Result<Option<InodeEntry>> {
        let path = path.to_string();
        self.call(move |conn| {
            let entry = conn
                .query_row(
                    &format!("SELECT {} FROM namenode WHERE name = ?1", INODE_COLUMNS),
                    params![path],
                    row_to_inode,
                )
                .optional()?;
            Ok(entry)
        })
        .await
    }

    async fn list_children(&self, id: InodeId) -> Result<Vec<InodeEntry>> {
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT nn.inode_num, nn.node_type, nn.name, nn.short_name, nn.replication,
                        nn.permission, nn.ctime, nn.mtime, nn.parent_inode
                 FROM parent_child pc
                 JOIN namenode nn ON pc.child_inode = nn.inode_num
                 WHERE pc.parent_inode = ?1
                 ORDER BY nn.name",
            )?;
            let children = stmt
                .query_map(params![id.0 as i64], row_to_inode)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(children)
        })
        .await
    }

    async fn edge_snapshot(&self) -> Result<Option<Vec<EdgeRecord>>> {
        self.call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.name, c.name, c.inode_num
                 FROM parent_child pc
                 JOIN namenode p ON pc.parent_inode = p.inode_num
                 JOIN namenode c ON pc.child_inode = c.inode_num",
            )?;
            let edges = stmt
                .query_map([], |row| {
                    Ok(EdgeRecord {
                        parent_path: row.get(0)?,
                        child_path: row.get(1)?,
                        child_id: InodeId(row.get::<_, i64>(2)? as u64),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(Some(edges))
        })
        .await
    }

    async fn create_inode(&self, new: NewInode) -> Result<InodeEntry> {
        self.call(move |conn| {
            let now = now_ms() as i64;
            let node_type = match new.kind {
                InodeKind::Directory => "d",
                InodeKind::File => "-",
            };
            conn.execute(
                "INSERT INTO namenode
                 (node_type, name, short_name, replication, permission, ctime, mtime, parent_inode)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7)",
                params![
                    node_type,
                    new.path,
                    new.name,
                    new.replication,
                    new.permission,
                    now,
                    new.parent.0 as i64
                ],
            )
            .with_context(|| format!("cannot create inode for {}", new.path))?;

            Ok(InodeEntry {
                id: InodeId(conn.last_insert_rowid() as u64),
                path: new.path,
                name: new.name,
                kind: new.kind,
                permission: new.permission,
                replication: new.replication,
                created_at: now as u64,
                modified_at: now as u64,
                parent: Some(new.parent),
            })
        })
        .await
    }

    async fn delete_inode(&self, id: InodeId) -> Result<()> {
        self.call(move |conn| {
            conn.execute(
                "DELETE FROM namenode WHERE inode_num = ?1 AND parent_inode IS NOT NULL",
                params![id.0 as i64],
            )?;
            Ok(())
        })
        .await
    }

    async fn link_parent_child(&self, parent: InodeId, child: InodeId) -> Result<()> {
        self.call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO parent_child (parent_inode, child_inode) VALUES (?1, ?2)",
                params![parent.0 as i64, child.0 as i64],
            )?;
            Ok(())
        })
        .await
    }

    async fn unlink_parent_child(&self, parent: InodeId, child: InodeId) -> Result<()> {
        self.call(move |conn| {
            conn.execute(
                "DELETE FROM parent_child WHERE parent_inode = ?1 AND child_inode = ?2",
                params![parent.0 as i64, child.0 as i64],
            )?;
            Ok(())
        })
        .await
    }

    async fn has_children(&self, id: InodeId) -> Result<bool> {
        self.call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM parent_child WHERE parent_inode = ?1",
                params![id.0 as i64],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    async fn record_block(&self, block: &Block) -> Result<()> {
        let block = block.clone();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO block_info (block_id, file_inode, hash_attribute, num_bytes, partition_index)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    block.id.0,
                    block.file.0 as i64,
                    block.bucket_key,
                    block.size_bytes as i64,
                    block.partition_index
                ],
            )?;
            for replica in &block.replicas {
                tx.execute(
                    "INSERT INTO block_replica (block_id, replica_num, datanode, data_block_id)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        block.id.0,
                        replica.replica_number,
                        replica.node.0,
                        replica.content_ref.0
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn blocks_for_file(&self, file: InodeId) -> Result<Vec<Block>> {
        self.call(move |conn| load_blocks(conn, file)).await
    }

    async fn delete_blocks_for_file(&self, file: InodeId) -> Result<Vec<Block>> {
        self.call(move |conn| {
            let blocks = load_blocks(conn, file)?;
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM block_replica WHERE block_id IN
                 (SELECT block_id FROM block_info WHERE file_inode = ?1)",
                params![file.0 as i64],
            )?;
            tx.execute(
                "DELETE FROM block_info WHERE file_inode = ?1",
                params![file.0 as i64],
            )?;
            tx.commit()?;
            Ok(blocks)
        })
        .await
    }
}

#[async_trait]
impl BlockStore for SqliteBackend {
    fn node_ids(&self) -> Vec<NodeId> {
        (1..=self.datanode_count).map(NodeId).collect()
    }

    async fn put_block(&self, node: NodeId, block: &BlockId, content: &str) -> Result<()> {
        let block = block.clone();
        let content = content.to_string();
        self.call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO datanode_block (datanode, data_block_id, content)
                 VALUES (?1, ?2, ?3)",
                params![node.0, block.0, content],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_block(&self, node: NodeId, block: &BlockId) -> Result<Option<String>> {
        let block = block.clone();
        self.call(move |conn| {
            let content = conn
                .query_row(
                    "SELECT content FROM datanode_block WHERE datanode = ?1 AND data_block_id = ?2",
                    params![node.0, block.0],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(content)
        })
        .await
    }

    async fn delete_block(&self, node: NodeId, block: &BlockId) -> Result<()> {
        let block = block.clone();
        self.call(move |conn| {
            conn.execute(
                "DELETE FROM datanode_block WHERE datanode = ?1 AND data_block_id = ?2",
                params![node.0, block.0],
            )?;
            Ok(())
        })
        .await
    }

    async fn node_block_count(&self, node: NodeId) -> Result<DatanodeStats> {
        self.call(move |conn| {
            let (blocks, bytes) = conn
                .query_row(
                    "SELECT block_count, byte_count FROM datanode_meta WHERE datanode = ?1",
                    params![node.0],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?
                .ok_or_else(|| anyhow::anyhow!("{} does not exist", node))?;
            Ok(DatanodeStats::new(node, blocks as u64, bytes as u64))
        })
        .await
    }

    async fn adjust_node_block_count(
        &self,
        node: NodeId,
        block_delta: i64,
        byte_delta: i64,
    ) -> Result<DatanodeStats> {
        self.call(move |conn| {
            let updated = conn.execute(
                "UPDATE datanode_meta
                 SET block_count = MAX(block_count + ?2, 0), byte_count = MAX(byte_count + ?3, 0)
                 WHERE datanode = ?1",
                params![node.0, block_delta, byte_delta],
            )?;
            if updated == 0 {
                anyhow::bail!("{} does not exist", node);
            }
            let (blocks, bytes) = conn.query_row(
                "SELECT block_count, byte_count FROM datanode_meta WHERE datanode = ?1",
                params![node.0],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )?;
            Ok(DatanodeStats::new(node, blocks as u64, bytes as u64))
        })
        .await
    }
}

impl StorageBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }
}
