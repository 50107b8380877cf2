//! Perf/stat telemetry (spec.md §4.11, component C11): the counters the
//! command-layer `INFO`-equivalent surface reads, plus a slow-swap ring
//! buffer addressable by a monotonic id so a client can ask "show me
//! swap #N".

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide swap counters. Every field is independently atomic;
/// callers needing a consistent snapshot across fields should treat
/// small skew between them as acceptable, matching the teacher's own
/// best-effort `INFO` counters.
#[derive(Default)]
pub struct PerfStats {
    /// Keys currently COLD or WARM (spec.md §3 invariant 4).
    pub cold_keys: AtomicU64,
    /// Completed swap-in operations.
    pub swap_in_count: AtomicU64,
    /// Completed swap-out operations.
    pub swap_out_count: AtomicU64,
    /// Completed swap-delete operations.
    pub swap_del_count: AtomicU64,
    /// Absent-cache hits (spec.md §4.10).
    pub absent_cache_hits: AtomicU64,
    /// RIO batches submitted to the persistent engine.
    pub rio_batches: AtomicU64,
}

impl PerfStats {
    /// A fresh, zeroed stats block.
    pub fn new() -> Self {
        PerfStats::default()
    }

    /// Snapshot every counter as of the call.
    pub fn snapshot(&self) -> PerfSnapshot {
        PerfSnapshot {
            cold_keys: self.cold_keys.load(Ordering::Relaxed),
            swap_in_count: self.swap_in_count.load(Ordering::Relaxed),
            swap_out_count: self.swap_out_count.load(Ordering::Relaxed),
            swap_del_count: self.swap_del_count.load(Ordering::Relaxed),
            absent_cache_hits: self.absent_cache_hits.load(Ordering::Relaxed),
            rio_batches: self.rio_batches.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time read of [`PerfStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerfSnapshot {
    /// See [`PerfStats::cold_keys`].
    pub cold_keys: u64,
    /// See [`PerfStats::swap_in_count`].
    pub swap_in_count: u64,
    /// See [`PerfStats::swap_out_count`].
    pub swap_out_count: u64,
    /// See [`PerfStats::swap_del_count`].
    pub swap_del_count: u64,
    /// See [`PerfStats::absent_cache_hits`].
    pub absent_cache_hits: u64,
    /// See [`PerfStats::rio_batches`].
    pub rio_batches: u64,
}

/// One recorded slow swap.
#[derive(Debug, Clone)]
pub struct SlowSwapEntry {
    /// Monotonic id, unique for the ring's lifetime (ids are not
    /// reused even once their entry is evicted).
    pub id: u64,
    /// The key involved.
    pub key: Vec<u8>,
    /// Wall-clock duration of the swap, in microseconds.
    pub micros: u64,
}

/// Fixed-capacity ring of the slowest-recently-seen swaps, addressable
/// by id (spec.md §9 supplemented feature, grounded on a slow-log ring
/// pattern for sampled slow-operation logging).
pub struct SlowSwapRing {
    capacity: usize,
    entries: VecDeque<SlowSwapEntry>,
    next_id: u64,
    sample_rate_pct: u8,
}

impl SlowSwapRing {
    /// A ring holding up to `capacity` entries, sampling every
    /// qualifying swap (spec.md §4.11's sample rate defaults to 100%).
    pub fn with_capacity(capacity: usize) -> Self {
        SlowSwapRing::with_capacity_and_sample_rate(capacity, 100)
    }

    /// A ring that only records `sample_rate_pct` percent of the swaps
    /// handed to [`Self::record`] (spec.md §4.11 "sampling rate
    /// configurable 0..100%").
    pub fn with_capacity_and_sample_rate(capacity: usize, sample_rate_pct: u8) -> Self {
        SlowSwapRing { capacity, entries: VecDeque::new(), next_id: 0, sample_rate_pct: sample_rate_pct.min(100) }
    }

    /// Record one swap, evicting the oldest entry if the ring is full.
    /// Returns `None` if this swap was skipped by the sample rate — the
    /// id counter is not advanced for a skipped swap, so ids stay dense.
    pub fn record(&mut self, key: Vec<u8>, micros: u64) -> Option<u64> {
        if self.sample_rate_pct == 0 {
            return None;
        }
        if self.sample_rate_pct < 100 && rand::random::<u8>() % 100 >= self.sample_rate_pct {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(SlowSwapEntry { id, key, micros });
        Some(id)
    }

    /// Look up an entry by id, if it hasn't been evicted yet.
    pub fn get(&self, id: u64) -> Option<&SlowSwapEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Every entry currently retained, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &SlowSwapEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reads_current_counters() {
        let stats = PerfStats::new();
        stats.cold_keys.fetch_add(3, Ordering::Relaxed);
        stats.swap_in_count.fetch_add(1, Ordering::Relaxed);
        let snap = stats.snapshot();
        assert_eq!(snap.cold_keys, 3);
        assert_eq!(snap.swap_in_count, 1);
    }

    #[test]
    fn ring_evicts_oldest_but_ids_stay_unique() {
        let mut ring = SlowSwapRing::with_capacity(2);
        let a = ring.record(b"a".to_vec(), 10).unwrap();
        let _b = ring.record(b"b".to_vec(), 20).unwrap();
        let c = ring.record(b"c".to_vec(), 30).unwrap();
        assert!(ring.get(a).is_none(), "oldest entry should have been evicted");
        assert!(ring.get(c).is_some());
        assert_eq!(ring.entries().count(), 2);
    }

    #[test]
    fn zero_percent_sample_rate_never_records() {
        let mut ring = SlowSwapRing::with_capacity_and_sample_rate(4, 0);
        assert!(ring.record(b"a".to_vec(), 10_000).is_none());
        assert_eq!(ring.entries().count(), 0);
    }

    #[test]
    fn hundred_percent_sample_rate_always_records() {
        let mut ring = SlowSwapRing::with_capacity_and_sample_rate(4, 100);
        for i in 0..20 {
            assert!(ring.record(format!("k{i}").into_bytes(), 10_000).is_some());
        }
    }
}
