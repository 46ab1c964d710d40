// Copyright (c) 2025 - Cowboy AI, Inc.
//! Per-resource async mutexes.
//!
//! At most one mutation per resource identity runs at a time, process-wide.
//! Waiters are served in the order they called [`ResourceLocks::acquire`]
//! (tokio's mutex is fair). Entries are dropped from the map once no guard
//! or waiter references them.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use crate::model::ResourceKey;

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Named mutex map keyed by `"<type>:<identity>"`
#[derive(Clone, Default)]
pub struct ResourceLocks {
    locks: Arc<LockMap>,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// The lock is released when the returned guard drops, on every exit path.
    pub async fn acquire(&self, key: &ResourceKey) -> ResourceGuard {
        let name = key.to_string();
        let lock = self
            .locks
            .entry(name.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = lock.lock_owned().await;
        trace!(lock = %name, "resource lock acquired");

        ResourceGuard {
            guard: Some(guard),
            name,
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of live lock entries
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive access to one resource identity
pub struct ResourceGuard {
    guard: Option<OwnedMutexGuard<()>>,
    name: String,
    locks: Arc<LockMap>,
}

impl ResourceGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("name", &self.name)
            .finish()
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // strong_count == 1: only the map holds it, nobody is waiting
        self.locks
            .remove_if(&self.name, |_, lock| Arc::strong_count(lock) == 1);
        trace!(lock = %self.name, "resource lock released");
    }
}
