//! Per-chunk mutual exclusion.
//!
//! An explicit map from chunk-key string to a lazily-created
//! `Arc<Mutex<()>>`, retained for the array's lifetime, rather than locking
//! on an interned filename string. Two writes whose regions touch the same
//! chunk serialize; writes to disjoint chunks proceed independently.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// A table of per-key mutexes. Two writes whose regions touch the same
/// chunk key serialize against each other; writes to disjoint keys proceed
/// independently.
#[derive(Default)]
pub struct ChunkLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChunkLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, creating its mutex on first use.
    pub fn lock(&self, key: &str) -> ChunkGuard {
        let mutex = {
            let mut table = self.table.lock();
            table
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        ChunkGuard { mutex }
    }
}

/// Holds the `Arc` alive for the duration of the critical section; the
/// actual `MutexGuard` borrows from it.
pub struct ChunkGuard {
    mutex: Arc<Mutex<()>>,
}

impl ChunkGuard {
    pub fn held(&self) -> MutexGuard<'_, ()> {
        self.mutex.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn same_key_serializes_concurrent_writers() {
        let locks = Arc::new(ChunkLocks::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let counter = counter.clone();
                let overlap = overlap.clone();
                thread::spawn(move || {
                    let guard = locks.lock("chunk-0");
                    let _held = guard.held();
                    let before = counter.fetch_add(1, Ordering::SeqCst);
                    if before != 0 {
                        overlap.fetch_add(1, Ordering::SeqCst);
                    }
                    counter.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn different_keys_do_not_share_a_mutex() {
        let locks = ChunkLocks::new();
        let a = locks.lock("a");
        let b = locks.lock("b");
        let _ga = a.held();
        let _gb = b.held();
    }
}
