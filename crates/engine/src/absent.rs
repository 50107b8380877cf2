//! Absent-key cache (spec.md §4.10, component C10): a bounded negative
//! cache remembering keys recently found to not exist at all (neither
//! RAM nor persistent meta), so a repeated lookup of the same missing
//! key can skip the persistent-engine round trip entirely.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;

/// Fixed-capacity LRU set of recently-confirmed-absent keys. `order`
/// keeps most-recently-used at the front and least-recently-used at
/// the back, so both insertion and a cache hit promote a key to the
/// front and eviction always drops from the back.
pub struct AbsentCache {
    capacity: usize,
    order: VecDeque<Vec<u8>>,
    members: FxHashMap<Vec<u8>, ()>,
    hits: u64,
}

impl AbsentCache {
    /// A cache holding up to `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        AbsentCache { capacity, order: VecDeque::new(), members: FxHashMap::default(), hits: 0 }
    }

    /// Record `key` as confirmed absent. An already-cached key is
    /// promoted to most-recently-used; otherwise it's inserted at the
    /// front, evicting the least-recently-used entry if the cache is
    /// full.
    pub fn insert(&mut self, key: Vec<u8>) {
        if self.members.contains_key(&key) {
            self.touch(&key);
            return;
        }
        if self.capacity == 0 {
            return;
        }
        if self.order.len() >= self.capacity {
            self.evict_tail();
        }
        self.order.push_front(key.clone());
        self.members.insert(key, ());
    }

    /// `true` if `key` is currently remembered as absent. Counts toward
    /// the hit statistic reported by [`crate::perf::PerfStats`] and
    /// promotes `key` to most-recently-used.
    pub fn contains(&mut self, key: &[u8]) -> bool {
        let hit = self.members.contains_key(key);
        if hit {
            self.hits += 1;
            self.touch(key);
        }
        hit
    }

    /// Forget a key, e.g. because it was just created.
    pub fn remove(&mut self, key: &[u8]) {
        if self.members.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }

    /// Number of keys currently cached.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Total number of `contains` calls that found a match since
    /// construction.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Shrink (or grow) the cache's capacity, trimming
    /// least-recently-used entries from the tail if the new capacity is
    /// smaller than the current population.
    pub fn resize(&mut self, new_capacity: usize) {
        self.capacity = new_capacity;
        while self.order.len() > self.capacity {
            self.evict_tail();
        }
    }

    fn touch(&mut self, key: &[u8]) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_front(k);
            }
        }
    }

    fn evict_tail(&mut self) {
        if let Some(lru) = self.order.pop_back() {
            self.members.remove(&lru);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_contains_hits_and_counts() {
        let mut cache = AbsentCache::with_capacity(2);
        cache.insert(b"a".to_vec());
        assert!(cache.contains(b"a"));
        assert_eq!(cache.hits(), 1);
        assert!(!cache.contains(b"b"));
    }

    #[test]
    fn eviction_drops_oldest_when_full() {
        let mut cache = AbsentCache::with_capacity(2);
        cache.insert(b"a".to_vec());
        cache.insert(b"b".to_vec());
        cache.insert(b"c".to_vec());
        assert!(!cache.contains(b"a"));
        assert!(cache.contains(b"b"));
        assert!(cache.contains(b"c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn remove_forgets_a_key() {
        let mut cache = AbsentCache::with_capacity(2);
        cache.insert(b"a".to_vec());
        cache.remove(b"a");
        assert!(!cache.contains(b"a"));
        assert!(cache.is_empty());
    }

    #[test]
    fn a_hit_promotes_the_key_so_it_survives_eviction() {
        let mut cache = AbsentCache::with_capacity(2);
        cache.insert(b"a".to_vec());
        cache.insert(b"b".to_vec());
        assert!(cache.contains(b"a"), "touching a makes it most-recently-used");
        cache.insert(b"c".to_vec());
        assert!(cache.contains(b"a"), "a was touched, so b should be evicted instead");
        assert!(!cache.contains(b"b"));
    }

    #[test]
    fn resize_trims_from_the_tail() {
        let mut cache = AbsentCache::with_capacity(3);
        cache.insert(b"a".to_vec());
        cache.insert(b"b".to_vec());
        cache.insert(b"c".to_vec());
        cache.resize(1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(b"c"), "most-recently-inserted key should survive the trim");
        assert!(!cache.contains(b"a"));
    }
}
