//! Transaction manager.

use crate::types::{Ref, TransactionId};
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};

/// Tracks the latest committed snapshot and the single writer.
///
/// ## Single-Writer Guarantee
///
/// Only one write transaction can be active at a time. `acquire_writer`
/// blocks until the current writer commits, rolls back or is dropped.
pub struct TransactionManager {
    /// Next transaction ID.
    next_txid: AtomicU64,
    /// Latest committed version and its group top.
    committed: RwLock<(u64, Ref)>,
    /// Whether a writer is active.
    writer: Mutex<bool>,
    /// Signalled when the writer goes away.
    writer_released: Condvar,
}

impl TransactionManager {
    /// Creates a manager whose latest snapshot is `(version, top)`.
    pub fn new(version: u64, top: Ref) -> Self {
        Self {
            next_txid: AtomicU64::new(1),
            committed: RwLock::new((version, top)),
            writer: Mutex::new(false),
            writer_released: Condvar::new(),
        }
    }

    /// Allocates a transaction ID.
    pub fn next_txid(&self) -> TransactionId {
        TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst))
    }

    /// Latest committed version and group top.
    #[must_use]
    pub fn snapshot(&self) -> (u64, Ref) {
        *self.committed.read()
    }

    /// Makes `(version, top)` the latest snapshot.
    pub fn publish(&self, version: u64, top: Ref) {
        *self.committed.write() = (version, top);
    }

    /// Blocks until no other writer is active, then becomes the writer.
    pub fn acquire_writer(&self) {
        let mut active = self.writer.lock();
        while *active {
            self.writer_released.wait(&mut active);
        }
        *active = true;
    }

    /// Becomes the writer if none is active.
    pub fn try_acquire_writer(&self) -> bool {
        let mut active = self.writer.lock();
        if *active {
            return false;
        }
        *active = true;
        true
    }

    /// Gives up the writer role.
    pub fn release_writer(&self) {
        *self.writer.lock() = false;
        self.writer_released.notify_one();
    }

    /// Returns true while a writer is active.
    #[must_use]
    pub fn has_writer(&self) -> bool {
        *self.writer.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn transaction_ids_increase() {
        let manager = TransactionManager::new(1, Ref(1));
        let a = manager.next_txid();
        let b = manager.next_txid();
        assert!(b > a);
    }

    #[test]
    fn publish_replaces_snapshot() {
        let manager = TransactionManager::new(1, Ref(1));
        manager.publish(2, Ref(9));
        assert_eq!(manager.snapshot(), (2, Ref(9)));
    }

    #[test]
    fn only_one_writer_at_a_time() {
        let manager = TransactionManager::new(1, Ref(1));
        manager.acquire_writer();
        assert!(manager.has_writer());
        assert!(!manager.try_acquire_writer());
        manager.release_writer();
        assert!(manager.try_acquire_writer());
    }

    #[test]
    fn blocked_writer_wakes_on_release() {
        let manager = Arc::new(TransactionManager::new(1, Ref(1)));
        manager.acquire_writer();

        let waiter = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                manager.acquire_writer();
                manager.release_writer();
            })
        };
        thread::sleep(Duration::from_millis(20));
        manager.release_writer();
        waiter.join().unwrap();
        assert!(!manager.has_writer());
    }
}
