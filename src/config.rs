//! Node configuration.
//!
//! Defaults match a small three-datanode deployment. `from_env` overlays the
//! `EDFS_*` environment variables on top of the defaults.

use anyhow::{Result, bail};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EdfsConfig {
    /// Upper bound on a single partition's byte size.
    pub max_partition_size: u64,
    /// Octal permission digits written as decimal, e.g. 755.
    pub default_dir_permission: u32,
    pub default_file_permission: u32,
    /// Replicas per block; must not exceed `datanode_count`.
    pub replication_factor: usize,
    pub datanode_count: u32,
    /// Cap on simultaneously running map tasks for one aggregation.
    pub max_concurrency: usize,
    /// Per-partition deadline in the map phase.
    pub map_task_timeout: Duration,
}

impl Default for EdfsConfig {
    fn default() -> Self {
        Self {
            max_partition_size: 1_000_000,
            default_dir_permission: 755,
            default_file_permission: 644,
            replication_factor: 2,
            datanode_count: 3,
            max_concurrency: 8,
            map_task_timeout: Duration::from_secs(10),
        }
    }
}

impl EdfsConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = read_var("EDFS_MAX_PARTITION_SIZE")? {
            config.max_partition_size = v;
        }
        if let Some(v) = read_var("EDFS_DEFAULT_DIR_PERMISSION")? {
            config.default_dir_permission = v;
        }
        if let Some(v) = read_var("EDFS_DEFAULT_FILE_PERMISSION")? {
            config.default_file_permission = v;
        }
        if let Some(v) = read_var("EDFS_REPLICATION_FACTOR")? {
            config.replication_factor = v;
        }
        if let Some(v) = read_var("EDFS_DATANODES")? {
            config.datanode_count = v;
        }
        if let Some(v) = read_var("EDFS_MAX_THREADS")? {
            config.max_concurrency = v;
        }
        if let Some(ms) = read_var::<u64>("EDFS_MAP_TIMEOUT_MS")? {
            config.map_task_timeout = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.replication_factor == 0 {
            bail!("replication factor must be at least 1");
        }
        if self.replication_factor > self.datanode_count as usize {
            bail!(
                "replication factor {} exceeds datanode count {}",
                self.replication_factor,
                self.datanode_count
            );
        }
        if self.max_partition_size == 0 {
            bail!("max partition size must be positive");
        }
        if self.max_concurrency == 0 {
            bail!("max concurrency must be at least 1");
        }
        Ok(())
    }
}

fn read_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {} ({})", name, raw, e)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(anyhow::anyhow!("cannot read {}: {}", name, e)),
    }
}
