//! Namespace
//!
//! The hierarchical directory tree: path resolution, mkdir/rm/ls, per-path
//! writer locks and `ls`-style permission rendering. All state lives in the
//! backend's `MetadataStore`.

pub mod locks;
pub mod manager;
pub mod permission;
pub mod resolver;
pub mod types;

#[cfg(test)]
mod tests;
