use super::locks::PathLocks;
use super::resolver::{PathResolver, normalize};
use super::types::{
    InodeEntry, InodeKind, ListingEntry, NewInode, ROOT_PATH, join_segments, parent_path,
    path_prefixes,
};
use crate::error::{EdfsError, EdfsResult};
use crate::storage::backend::StorageBackend;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Contents of one directory, ordered by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub path: String,
    pub entries: Vec<ListingEntry>,
}

pub struct NamespaceManager {
    store: Arc<dyn StorageBackend>,
    resolver: PathResolver,
    locks: Arc<PathLocks>,
    dir_permission: u32,
}

impl NamespaceManager {
    pub fn new(
        store: Arc<dyn StorageBackend>,
        resolver: PathResolver,
        locks: Arc<PathLocks>,
        dir_permission: u32,
    ) -> Self {
        Self {
            store,
            resolver,
            locks,
            dir_permission,
        }
    }

    /// Creates `path` and any missing ancestors. Returns the leaf.
    pub async fn mkdir(&self, path: &str) -> EdfsResult<InodeEntry> {
        let segments = normalize(path)?;
        let full_path = join_segments(&segments);
        let _guard = self.locks.acquire(path_prefixes(&full_path)).await;

        let resolution = self.resolver.resolve(&full_path).await?;
        if resolution.exists {
            return Err(EdfsError::AlreadyExists(full_path));
        }

        let mut parent = self
            .store
            .get_inode(resolution.deepest())
            .await?
            .ok_or_else(|| EdfsError::PathNotFound(resolution.existing_prefix()))?;
        if !parent.is_dir() {
            return Err(EdfsError::NotADirectory(resolution.existing_prefix()));
        }

        for depth in resolution.missing_depth..segments.len() {
            let child = self
                .store
                .create_inode(NewInode {
                    parent: parent.id,
                    path: join_segments(&segments[..=depth]),
                    name: segments[depth].clone(),
                    kind: InodeKind::Directory,
                    permission: self.dir_permission,
                    replication: None,
                })
                .await?;
            self.store.link_parent_child(parent.id, child.id).await?;
            tracing::debug!("Created directory {} (inode {})", child.path, child.id);
            parent = child;
        }

        tracing::info!(
            "mkdir {}: created {} director{}",
            full_path,
            segments.len() - resolution.missing_depth,
            if segments.len() - resolution.missing_depth == 1 { "y" } else { "ies" }
        );
        Ok(parent)
    }

    /// Removes a file (with all of its blocks) or an empty directory.
    pub async fn rm(&self, path: &str) -> EdfsResult<()> {
        let segments = normalize(path)?;
        if segments.is_empty() {
            return Err(EdfsError::RootDeletionForbidden(ROOT_PATH.to_string()));
        }
        let full_path = join_segments(&segments);
        let _guard = self
            .locks
            .acquire([parent_path(&full_path), full_path.clone()])
            .await;

        let entry = self.resolver.require(&full_path).await?;
        let parent = entry
            .parent
            .ok_or_else(|| EdfsError::RootDeletionForbidden(full_path.clone()))?;

        match entry.kind {
            InodeKind::Directory => {
                if self.store.has_children(entry.id).await? {
                    return Err(EdfsError::DirectoryNotEmpty(full_path));
                }
            }
            InodeKind::File => self.drop_blocks(&entry).await?,
        }

        self.store.unlink_parent_child(parent, entry.id).await?;
        self.store.delete_inode(entry.id).await?;

        tracing::info!("rm {}", full_path);
        Ok(())
    }

    async fn drop_blocks(&self, file: &InodeEntry) -> EdfsResult<()> {
        let blocks = self.store.delete_blocks_for_file(file.id).await?;
        let mut removed = 0usize;

        for block in &blocks {
            for replica in &block.replicas {
                if let Err(e) = self
                    .store
                    .delete_block(replica.node, &replica.content_ref)
                    .await
                {
                    tracing::warn!(
                        "Could not delete block {} from {}: {}",
                        replica.content_ref,
                        replica.node,
                        e
                    );
                    continue;
                }

                let stats = self
                    .store
                    .adjust_node_block_count(replica.node, -1, -(block.size_bytes as i64))
                    .await?;
                if stats.empty {
                    tracing::debug!("{} holds no blocks", replica.node);
                }
                removed += 1;
            }
        }

        tracing::debug!(
            "Removed {} replicas of {} blocks for {}",
            removed,
            blocks.len(),
            file.path
        );
        Ok(())
    }

    pub async fn ls(&self, path: &str) -> EdfsResult<Listing> {
        let segments = normalize(path)?;
        let full_path = join_segments(&segments);

        let entry = self.resolver.require(&full_path).await?;
        if !entry.is_dir() {
            return Err(EdfsError::NotADirectory(full_path));
        }

        let mut children = self.store.list_children(entry.id).await?;
        children.sort_by(|a, b| a.name.cmp(&b.name));

        let mut entries = Vec::with_capacity(children.len());
        for child in children {
            let size_bytes = match child.kind {
                InodeKind::File => self
                    .store
                    .blocks_for_file(child.id)
                    .await?
                    .iter()
                    .map(|b| b.size_bytes)
                    .sum(),
                InodeKind::Directory => 0,
            };
            entries.push(ListingEntry {
                name: child.name,
                path: child.path,
                kind: child.kind,
                permission: child.permission,
                replication: child.replication,
                size_bytes,
                modified_at: child.modified_at,
            });
        }

        Ok(Listing {
            path: full_path,
            entries,
        })
    }
}
