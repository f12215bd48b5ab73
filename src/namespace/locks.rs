use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Keyed async mutexes, one per path.
///
/// Writers lock every path they touch. Keys are sorted and deduplicated
/// before acquisition so two writers never wait on each other in a cycle.
/// An entry lives only while some writer holds or waits on it.
#[derive(Default)]
pub struct PathLocks {
    locks: Arc<LockMap>,
}

/// Holds the acquired path locks until dropped.
pub struct PathGuard {
    locks: Arc<LockMap>,
    keys: Vec<String>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire<I>(&self, paths: I) -> PathGuard
    where
        I: IntoIterator<Item = String>,
    {
        let mut keys: Vec<String> = paths.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut guard = PathGuard {
            locks: self.locks.clone(),
            keys: Vec::with_capacity(keys.len()),
            guards: Vec::with_capacity(keys.len()),
        };
        for key in keys {
            let lock = self
                .locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            // Recorded before waiting so a cancelled acquire still cleans up.
            guard.keys.push(key);
            guard.guards.push(lock.lock_owned().await);
        }

        guard
    }

    /// Number of paths currently locked or waited on.
    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        self.guards.clear();
        for key in &self.keys {
            self.locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}
