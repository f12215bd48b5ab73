//! EDFS: an educational distributed file store for tabular data.
//!
//! A namenode-style namespace tree, replicated blocks spread over a small
//! set of datanodes, and aggregate queries pushed down to partitions.
//!
//! ## Modules
//! - **`namespace`**: path resolution, mkdir/rm/ls, per-path writer locks.
//! - **`dataset`**: the typed table model, the CSV codec and the partitioner
//!   that turns a table into hash- or range-bucketed partitions.
//! - **`storage`**: backend contracts with a document-tree (in-memory) and a
//!   relational (SQLite) implementation, replica placement and the read path.
//! - **`query`**: the map/reduce aggregation engine and its scoped worker pool.
//! - **`service`**: the `Edfs` facade wiring all of the above over one backend.
//! - **`api`**: the axum HTTP surface with `{response, status}` envelopes.

pub mod api;
pub mod config;
pub mod dataset;
pub mod error;
pub mod namespace;
pub mod query;
pub mod service;
pub mod storage;

#[cfg(test)]
pub(crate) mod fixtures;
