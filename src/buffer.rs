use crate::model::Timestamped;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::collections::vec_deque::Iter;
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Insertion-ordered storage with a hard capacity.
///
/// Appending past `capacity` evicts from the head. Age-based removal goes through
/// [`purge_older_than`](Self::purge_older_than), which rebuilds the storage from a snapshot and
/// swaps it in, carrying over anything appended while the snapshot was being filtered.
pub struct BoundedBuffer<T> {
    capacity: usize,
    inner: RwLock<Inner<T>>,
    purge_gate: Mutex<()>,
}

struct Inner<T> {
    items: VecDeque<T>,
    // Totals since creation. Purge diffs them to map its snapshot onto the live deque.
    appended: u64,
    evicted: u64,
}

impl<T> Inner<T> {
    fn trim(&mut self, capacity: usize) -> usize {
        let excess = self.items.len().saturating_sub(capacity);
        self.items.drain(..excess);
        self.evicted += excess as u64;
        excess
    }
}

impl<T: Timestamped + Clone> BoundedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        Self {
            capacity,
            inner: RwLock::new(Inner {
                items: VecDeque::new(),
                appended: 0,
                evicted: 0,
            }),
            purge_gate: Mutex::new(()),
        }
    }

    /// Appends to the tail and returns how many items were evicted from the head.
    pub fn append(&self, item: T) -> usize {
        let mut inner = self.write();
        inner.items.push_back(item);
        inner.appended += 1;
        inner.trim(self.capacity)
    }

    /// The last `min(n, len)` items, oldest first.
    pub fn recent(&self, n: usize) -> Vec<T> {
        let inner = self.read();
        let start = inner.items.len().saturating_sub(n);
        inner.items.range(start..).cloned().collect()
    }

    /// Runs `handler` over a consistent view of the buffer without copying it.
    /// Appends wait until the handler returns, so keep it short.
    pub fn with_items<R>(&self, handler: impl FnOnce(Iter<'_, T>) -> R) -> R {
        let inner = self.read();
        handler(inner.items.iter())
    }

    /// Removes every item stamped strictly before `cutoff` and returns how many were removed.
    ///
    /// Items appended while the survivors are being collected are kept, even if they are
    /// older than `cutoff`; the next purge picks them up. Items evicted for capacity in the
    /// meantime stay evicted.
    pub fn purge_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let _gate = self.purge_gate.lock().unwrap_or_else(PoisonError::into_inner);

        // Survivors keep their snapshot position so later head evictions can be replayed.
        let (survivors, seen_appends, seen_evictions, snapshot_len) = {
            let inner = self.read();
            let survivors: Vec<(usize, T)> = inner
                .items
                .iter()
                .enumerate()
                .filter(|(_, item)| item.timestamp() >= cutoff)
                .map(|(position, item)| (position, item.clone()))
                .collect();
            (survivors, inner.appended, inner.evicted, inner.items.len())
        };
        if survivors.len() == snapshot_len {
            return 0;
        }

        let mut inner = self.write();
        let evicted_since = Self::delta(inner.evicted, seen_evictions);
        let still_live = snapshot_len.saturating_sub(evicted_since);
        let fresh = Self::delta(inner.appended, seen_appends).min(inner.items.len());
        let fresh_start = inner.items.len() - fresh;

        let mut items: VecDeque<T> = survivors
            .into_iter()
            .filter(|(position, _)| *position >= evicted_since)
            .map(|(_, item)| item)
            .collect();
        let removed = still_live - items.len();
        items.extend(inner.items.range(fresh_start..).cloned());
        inner.items = items;

        removed
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn delta(now: u64, seen: u64) -> usize {
        usize::try_from(now - seen).unwrap_or(usize::MAX)
    }

    // Every exclusive section leaves the deque valid, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, Inner<T>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner<T>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
