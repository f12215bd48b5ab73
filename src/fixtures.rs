//! Shared test setup: an `Edfs` over either backend plus a few datasets.

use crate::config::EdfsConfig;
use crate::service::Edfs;
use crate::storage::backend::StorageBackend;
use crate::storage::memory::MemoryBackend;
use crate::storage::sqlite::SqliteBackend;

use std::sync::Arc;
use tempfile::TempDir;

pub struct Harness {
    pub edfs: Edfs,
    /// Set when the harness runs on the in-memory backend.
    pub memory: Option<Arc<MemoryBackend>>,
    _dir: Option<TempDir>,
}

pub fn config() -> EdfsConfig {
    EdfsConfig {
        datanode_count: 3,
        replication_factor: 2,
        ..EdfsConfig::default()
    }
}

pub fn memory_harness(config: EdfsConfig) -> Harness {
    let backend = Arc::new(MemoryBackend::new(
        config.datanode_count,
        config.default_dir_permission,
    ));
    let store: Arc<dyn StorageBackend> = backend.clone();
    Harness {
        edfs: Edfs::new(store, config).unwrap(),
        memory: Some(backend),
        _dir: None,
    }
}

pub fn sqlite_harness(config: EdfsConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("edfs.db");
    let store = Arc::new(
        SqliteBackend::open(&db, config.datanode_count, config.default_dir_permission).unwrap(),
    );
    Harness {
        edfs: Edfs::new(store, config).unwrap(),
        memory: None,
        _dir: Some(dir),
    }
}

/// One harness per backend.
pub fn harnesses() -> Vec<Harness> {
    vec![memory_harness(config()), sqlite_harness(config())]
}

/// Ten rows, `price` = 1..=10.
pub fn prices_csv() -> String {
    let mut csv = String::from("id,name,price\n");
    for i in 1..=10 {
        csv.push_str(&format!("{},item{},{}\n", i, i, i));
    }
    csv
}

/// Nine rows over three categories, interleaved so grouping reorders them.
pub fn categories_csv() -> String {
    let mut csv = String::from("category,amount\n");
    let cats = ["b", "a", "c"];
    for i in 0..9 {
        csv.push_str(&format!("{},{}\n", cats[i % 3], i * 10));
    }
    csv
}
