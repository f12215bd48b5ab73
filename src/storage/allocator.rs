use super::types::NodeId;
use anyhow::{Result, bail};
use rand::seq::SliceRandom;

/// Picks replica targets uniformly at random, without replacement.
///
/// Placement ignores current load: every node in the pool is equally likely
/// regardless of how many blocks it already holds.
pub struct ReplicaAllocator;

impl ReplicaAllocator {
    pub fn allocate(replication_factor: usize, pool: &[NodeId]) -> Result<Vec<NodeId>> {
        if replication_factor == 0 {
            bail!("replication factor must be at least 1");
        }
        if replication_factor > pool.len() {
            bail!(
                "cannot place {} replicas on {} datanodes",
                replication_factor,
                pool.len()
            );
        }

        let mut rng = rand::thread_rng();
        Ok(pool
            .choose_multiple(&mut rng, replication_factor)
            .copied()
            .collect())
    }
}
