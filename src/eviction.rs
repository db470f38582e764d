//! Per-set LRU recency tracking.
//!
//! Wraps [`lru::LruCache`] keyed by tag with a unit value — the cache set
//! itself owns block state, this handler only owns recency order. Using the
//! crate instead of a hand-rolled intrusive doubly-linked list avoids the
//! cyclic-reference bookkeeping that a DLL-of-tags would otherwise require.

use std::num::NonZeroUsize;

use lru::LruCache;

pub struct LruEvictionHandler {
    order: LruCache<u64, ()>,
}

impl LruEvictionHandler {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).expect("associativity must be > 0");
        LruEvictionHandler {
            order: LruCache::new(cap),
        }
    }

    /// Mark `tag` as most-recently-used, tracking it if not already present.
    pub fn touch(&mut self, tag: u64) {
        self.order.put(tag, ());
    }

    /// Remove and return the least-recently-used tracked tag.
    pub fn evict(&mut self) -> u64 {
        self.order
            .pop_lru()
            .expect("evict called on an empty eviction handler")
            .0
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}
