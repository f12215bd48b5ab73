//! Block Storage
//!
//! Everything below the namespace: the backend contracts and their two
//! implementations, replica placement for ingestion and the read path.
//!
//! ## Layout
//! - **`backend`**: `MetadataStore`, `BlockStore` and the combined `StorageBackend`.
//! - **`memory`**: document-tree backend on `DashMap`, one level per lookup.
//! - **`sqlite`**: relational backend; resolves paths from one adjacency read.
//! - **`allocator`**: uniform random replica targets.
//! - **`placement`**: `put`, partition by partition.
//! - **`reconstructor`**: `readPartition`, `cat`, partition locations.

pub mod allocator;
pub mod backend;
pub mod memory;
pub mod placement;
pub mod reconstructor;
pub mod sqlite;
pub mod types;

#[cfg(test)]
mod tests;
