//! Dataset Module
//!
//! Tabular data handling for ingestion and reads.
//!
//! ## Core Concepts
//! - **Typed cells**: each column is classified once as numeric or text when parsed.
//! - **Stable index**: every row carries its original position through partitioning.
//! - **Partitioning**: hash-attribute grouping or index range binning, then size-bounded slicing.

pub mod csv;
pub mod partitioner;
pub mod types;
