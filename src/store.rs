//! The ordered, lock-protected collection of ticket keys.
//!
//! Readers (handshake callbacks) vastly outnumber the single writer (the
//! maintainer thread), so sustained handshake load must not starve
//! rotation. `parking_lot::RwLock` has no platform-default reader bias to
//! correct for, but we still track pending writers explicitly and have new
//! readers yield once while a writer is waiting, approximating writer
//! preference without reimplementing the lock (see `SPEC_FULL.md` §4.B).

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::ticket::TicketKey;

/// Total order over ticket keys: `not_before` descending, ties broken by
/// `name` ascending. Index 0 is always the newest key.
fn cmp_order(a: &TicketKey, b: &TicketKey) -> std::cmp::Ordering {
    b.not_before()
        .cmp(&a.not_before())
        .then_with(|| a.name().cmp(b.name()))
}

/// The process-wide ticket-key store.
pub struct TicketStore {
    keys: RwLock<Vec<TicketKey>>,
    pending_writers: AtomicUsize,
}

impl Default for TicketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketStore {
    /// An empty store.
    pub fn new() -> Self {
        TicketStore {
            keys: RwLock::new(Vec::new()),
            pending_writers: AtomicUsize::new(0),
        }
    }

    /// A store seeded with `keys`, sorted into the store's total order.
    pub fn from_keys(mut keys: Vec<TicketKey>) -> Self {
        keys.sort_by(cmp_order);
        TicketStore {
            keys: RwLock::new(keys),
            pending_writers: AtomicUsize::new(0),
        }
    }

    /// Acquire the shared lock and run `f` against a read-only snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&[TicketKey]) -> R) -> R {
        if self.pending_writers.load(Ordering::Acquire) > 0 {
            std::thread::yield_now();
        }
        let guard = self.keys.read();
        f(&guard)
    }

    /// Acquire the exclusive lock and run `f` against the mutable contents.
    pub fn write<R>(&self, f: impl FnOnce(&mut Vec<TicketKey>) -> R) -> R {
        self.pending_writers.fetch_add(1, Ordering::AcqRel);
        let result = {
            let mut guard = self.keys.write();
            f(&mut guard)
        };
        self.pending_writers.fetch_sub(1, Ordering::AcqRel);
        result
    }

    /// Insert `key` while preserving the store's total order.
    pub fn insert(&self, key: TicketKey) {
        self.write(|keys| {
            let pos = keys.partition_point(|existing| cmp_order(existing, &key) != std::cmp::Ordering::Greater);
            keys.insert(pos, key);
        });
    }

    /// Atomically replace the entire contents with `new_keys`, sorted into
    /// the store's total order. The old contents are dropped (and thus
    /// zeroed) inside the write lock.
    pub fn swap(&self, mut new_keys: Vec<TicketKey>) {
        new_keys.sort_by(cmp_order);
        self.write(|keys| {
            *keys = new_keys;
        });
    }

    /// Remove and return the last (oldest) entry if its `not_after < now`.
    /// Returns `None` when the store is empty or the oldest entry is not
    /// expired, without mutating the store.
    pub fn pop_expired(&self, now: u64) -> Option<TicketKey> {
        self.write(|keys| {
            if keys.last().map(|k| k.not_after() < now).unwrap_or(false) {
                keys.pop()
            } else {
                None
            }
        })
    }

    /// Number of keys currently in the store.
    pub fn len(&self) -> usize {
        self.read(|keys| keys.len())
    }

    /// True if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
