//! Path Resolution
//!
//! Walks a slash path against the namespace tree and reports how far it got.
//! Backends that can hand over the whole parent-child relation in one read
//! are resolved against that snapshot; the rest are walked one point lookup
//! per level. Both strategies yield the same `PathResolution`.

use super::types::{InodeEntry, PathResolution, join_segments};
use crate::error::{EdfsError, EdfsResult};
use crate::storage::backend::StorageBackend;

use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct PathResolver {
    store: Arc<dyn StorageBackend>,
}

/// Splits an absolute path into segments, rejecting relative paths and
/// `.`/`..` components. Repeated and trailing slashes are ignored.
pub fn normalize(path: &str) -> EdfsResult<Vec<String>> {
    let path = path.trim();
    if !path.starts_with('/') {
        return Err(EdfsError::InvalidPath(path.to_string()));
    }

    let mut segments = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(EdfsError::InvalidPath(path.to_string()));
        }
        segments.push(segment.to_string());
    }
    Ok(segments)
}

impl PathResolver {
    pub fn new(store: Arc<dyn StorageBackend>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, path: &str) -> EdfsResult<PathResolution> {
        let segments = normalize(path)?;
        let root = self.store.root().await?;

        let chain = match self.store.edge_snapshot().await? {
            Some(edges) => {
                let mut adjacency: HashMap<&str, HashMap<&str, _>> = HashMap::new();
                for edge in &edges {
                    adjacency
                        .entry(edge.parent_path.as_str())
                        .or_default()
                        .insert(edge.child_path.as_str(), edge.child_id);
                }

                let mut chain = vec![root.id];
                for depth in 0..segments.len() {
                    let parent = join_segments(&segments[..depth]);
                    let child = join_segments(&segments[..=depth]);
                    match adjacency
                        .get(parent.as_str())
                        .and_then(|children| children.get(child.as_str()))
                    {
                        Some(id) => chain.push(*id),
                        None => break,
                    }
                }
                chain
            }
            None => {
                let mut chain = vec![root.id];
                let mut current = root.id;
                for segment in &segments {
                    match self.store.child_by_name(current, segment).await? {
                        Some(child) => {
                            current = child.id;
                            chain.push(child.id);
                        }
                        None => break,
                    }
                }
                chain
            }
        };

        let missing_depth = chain.len() - 1;
        Ok(PathResolution {
            exists: missing_depth == segments.len(),
            segments,
            chain,
            missing_depth,
        })
    }

    /// The entry at `path`, or `None` when any segment is missing.
    pub async fn lookup(&self, path: &str) -> EdfsResult<Option<InodeEntry>> {
        let resolution = self.resolve(path).await?;
        match resolution.target() {
            Some(id) => Ok(self.store.get_inode(id).await?),
            None => Ok(None),
        }
    }

    /// Like `lookup`, but a missing path is `PathNotFound`.
    pub async fn require(&self, path: &str) -> EdfsResult<InodeEntry> {
        self.lookup(path)
            .await?
            .ok_or_else(|| EdfsError::PathNotFound(path.to_string()))
    }

    /// Resolves `path` and insists on a file.
    pub async fn require_file(&self, path: &str) -> EdfsResult<InodeEntry> {
        let entry = self.require(path).await?;
        if entry.is_dir() {
            return Err(EdfsError::NotAFile(path.to_string()));
        }
        Ok(entry)
    }
}
