use serde::{Deserialize, Serialize};
use std::fmt;

pub const ROOT_PATH: &str = "/";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InodeId(pub u64);

impl fmt::Display for InodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InodeKind {
    Directory,
    File,
}

/// A namespace entry. Owned by the metadata store; callers get copies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InodeEntry {
    pub id: InodeId,
    /// Full, normalized path, e.g. `/user/data.csv`.
    pub path: String,
    pub name: String,
    pub kind: InodeKind,
    /// Octal digits written as a decimal number, e.g. 755.
    pub permission: u32,
    /// Set for files only.
    pub replication: Option<u32>,
    pub created_at: u64,
    pub modified_at: u64,
    /// `None` only for the root.
    pub parent: Option<InodeId>,
}

impl InodeEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == InodeKind::Directory
    }
}

/// Arguments for `MetadataStore::create_inode`.
#[derive(Debug, Clone)]
pub struct NewInode {
    pub parent: InodeId,
    pub path: String,
    pub name: String,
    pub kind: InodeKind,
    pub permission: u32,
    pub replication: Option<u32>,
}

/// One parent-child edge keyed by path, as returned by bulk adjacency reads.
#[derive(Debug, Clone)]
pub struct EdgeRecord {
    pub parent_path: String,
    pub child_path: String,
    pub child_id: InodeId,
}

/// Outcome of walking a path against the namespace tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PathResolution {
    /// Normalized path segments.
    pub segments: Vec<String>,
    pub exists: bool,
    /// Root first, then one id per matched segment.
    pub chain: Vec<InodeId>,
    /// Number of segments matched; equals `segments.len()` when `exists`.
    pub missing_depth: usize,
}

impl PathResolution {
    pub fn target(&self) -> Option<InodeId> {
        if self.exists {
            self.chain.last().copied()
        } else {
            None
        }
    }

    /// Id of the deepest directory that does exist on the path.
    pub fn deepest(&self) -> InodeId {
        self.chain[self.chain.len() - 1]
    }

    pub fn full_path(&self) -> String {
        join_segments(&self.segments)
    }

    /// Path of the deepest existing prefix.
    pub fn existing_prefix(&self) -> String {
        join_segments(&self.segments[..self.missing_depth])
    }
}

/// A directory listing row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingEntry {
    pub name: String,
    pub path: String,
    pub kind: InodeKind,
    pub permission: u32,
    pub replication: Option<u32>,
    /// Bytes of one replica set; zero for directories.
    pub size_bytes: u64,
    pub modified_at: u64,
}

pub fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

pub fn join_segments(segments: &[String]) -> String {
    format!("/{}", segments.join("/"))
}

/// Parent path of a normalized path. The root is its own parent.
pub fn parent_path(path: &str) -> String {
    let segments = split_path(path);
    if segments.is_empty() {
        return ROOT_PATH.to_string();
    }
    join_segments(&segments[..segments.len() - 1])
}

/// Every prefix of the path from the root down to the path itself.
pub fn path_prefixes(path: &str) -> Vec<String> {
    let segments = split_path(path);
    (0..=segments.len())
        .map(|depth| join_segments(&segments[..depth]))
        .collect()
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
