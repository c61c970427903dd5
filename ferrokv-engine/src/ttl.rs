//! # TTL Index
//!
//! Provide the expiry bookkeeping backing `EXPIRE`/`SETEX` and the lazy
//! sweep.
//!
//! ## Design Principles
//! 1. **Map Is Authoritative**: `ExpiryMap` alone decides whether a key
//!    is live; the heap is only ever consulted to find sweep
//!    candidates.
//! 2. **Tombstones Are Expected**: a heap entry whose `(expiry, key)`
//!    no longer matches the map is discarded silently at pop time, not
//!    proactively removed on every TTL clear.
//! 3. **No Wall-Clock Surprises**: expiry timestamps are stored as
//!    seconds since `UNIX_EPOCH` so a snapshot restored on another
//!    machine still compares correctly against `SystemTime::now`.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;

/// Wraps an `f64` expiry timestamp with a total order so it can sit in
/// a `BinaryHeap`. Expiry timestamps are always finite, so `total_cmp`
/// never has to reconcile `NaN`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderedExpiry(f64);

impl Eq for OrderedExpiry {}

impl PartialOrd for OrderedExpiry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedExpiry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct HeapEntry {
    expiry: OrderedExpiry,
    key: Vec<u8>,
}

/// Returns the current wall-clock time as seconds since the epoch.
pub fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
}

/// The TTL index: an authoritative map plus a lazy-deletion min-heap.
#[derive(Debug, Default)]
pub struct TtlIndex {
    map: HashMap<Vec<u8>, f64, ahash::RandomState>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
}

impl TtlIndex {
    pub fn new() -> Self {
        TtlIndex {
            map: HashMap::with_hasher(ahash::RandomState::new()),
            heap: BinaryHeap::new(),
        }
    }

    /// Records a fresh TTL for `key`, replacing any previous one.
    pub fn set(&mut self, key: Vec<u8>, expiry: f64) {
        self.map.insert(key.clone(), expiry);
        self.heap.push(Reverse(HeapEntry {
            expiry: OrderedExpiry(expiry),
            key,
        }));
    }

    /// Drops the TTL for `key`. The matching heap entry, if any, is
    /// left behind as a tombstone — discarded lazily at pop time.
    pub fn clear(&mut self, key: &[u8]) {
        self.map.remove(key);
    }

    /// Returns whether `key` is past its recorded expiry at `now`, i.e.
    /// whether it should be treated as absent. Keys
    /// with no TTL are never expired.
    pub fn is_expired(&self, key: &[u8], now: f64) -> bool {
        matches!(self.map.get(key), Some(&expiry) if expiry < now)
    }

    pub fn expiry_of(&self, key: &[u8]) -> Option<f64> {
        self.map.get(key).copied()
    }

    /// Repeatedly pops the heap, deleting any key whose popped
    /// `(expiry, key)` is still authoritative in the map and in the
    /// past. Stops as soon as the smallest remaining entry is still in
    /// the future (or stale), pushing it back unconsumed. Returns the
    /// keys actually deleted so the caller can also drop their store
    /// entries.
    pub fn sweep(&mut self, now: f64) -> Vec<Vec<u8>> {
        let mut deleted = Vec::new();
        while let Some(Reverse(top)) = self.heap.pop() {
            let authoritative = self.map.get(&top.key) == Some(&top.expiry.0);
            if !authoritative {
                // Tombstone: TTL changed or cleared since this entry was pushed.
                continue;
            }
            if top.expiry.0 >= now {
                self.heap.push(Reverse(top));
                break;
            }
            self.map.remove(&top.key);
            deleted.push(top.key);
        }
        deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_key_reported_past_its_deadline() {
        let mut index = TtlIndex::new();
        index.set(b"a".to_vec(), 100.0);
        assert!(index.is_expired(b"a", 101.0));
        assert!(!index.is_expired(b"a", 99.0));
    }

    #[test]
    fn clearing_ttl_leaves_a_tombstone_the_sweep_ignores() {
        let mut index = TtlIndex::new();
        index.set(b"a".to_vec(), 100.0);
        index.clear(b"a");
        assert!(index.sweep(200.0).is_empty());
    }

    #[test]
    fn sweep_deletes_only_expired_entries_and_stops_at_the_future() {
        let mut index = TtlIndex::new();
        index.set(b"past".to_vec(), 100.0);
        index.set(b"future".to_vec(), 1_000_000.0);
        let deleted = index.sweep(200.0);
        assert_eq!(deleted, vec![b"past".to_vec()]);
        assert_eq!(index.expiry_of(b"future"), Some(1_000_000.0));
    }

    #[test]
    fn resetting_ttl_before_sweep_uses_the_latest_value() {
        let mut index = TtlIndex::new();
        index.set(b"a".to_vec(), 100.0);
        index.set(b"a".to_vec(), 1_000_000.0);
        assert!(index.sweep(200.0).is_empty());
        assert_eq!(index.expiry_of(b"a"), Some(1_000_000.0));
    }
}
