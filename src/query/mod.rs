//! Aggregate queries (`avg`, `max`, `min`) pushed down to partitions and
//! combined centrally.

pub mod engine;
pub mod pool;
pub mod types;
