//! Executor configuration (spec.md's ambient stack), styled after the
//! teacher's `DatabaseConfig`: a plain struct with named constructors
//! for common profiles and `with_*` builders, validated once up front
//! rather than parsed from a file (a config-file parser is an explicit
//! non-goal).

/// Tunables for one [`crate::Executor`] instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapConfig {
    /// Number of background swap-worker threads (spec.md §4.6: "default
    /// 6, max 64").
    pub worker_count: usize,
    /// Worker FIFO depth at which [`swapcore_engine::WorkerPool::backlog_pressure`]
    /// trips (spec.md §9 supplemented `swapRatelimit` back-pressure).
    pub worker_queue_high_watermark: usize,
    /// Capacity of the absent-key cache (spec.md §4.10).
    pub absent_cache_capacity: usize,
    /// Number of concurrently open scan sessions (spec.md §4.9).
    pub scan_session_capacity: usize,
    /// A scan session idle longer than this many seconds becomes
    /// eligible for eviction when the table is full (spec.md §4.9
    /// "Assign").
    pub scan_session_max_idle_secs: u64,
    /// Swaps whose wall-clock duration meets or exceeds this many
    /// microseconds are eligible for the slow-swap ring (spec.md §4.11).
    pub slow_swap_threshold_micros: u64,
    /// Fraction, 0–100, of swaps exceeding the threshold that are
    /// actually recorded (spec.md §4.11 "sampling rate configurable
    /// 0..100%").
    pub slow_swap_sample_rate_pct: u8,
    /// Capacity of the slow-swap ring buffer.
    pub slow_swap_ring_capacity: usize,
}

impl Default for SwapConfig {
    fn default() -> Self {
        SwapConfig::strict()
    }
}

impl SwapConfig {
    /// The spec's default worker count (spec.md §4.6).
    pub const DEFAULT_WORKER_COUNT: usize = 6;
    /// The spec's worker-count ceiling (spec.md §4.6).
    pub const MAX_WORKER_COUNT: usize = 64;

    /// A production-shaped profile: six workers, generous cache and
    /// scan-session capacity, slow-swap sampling enabled.
    pub fn strict() -> Self {
        SwapConfig {
            worker_count: Self::DEFAULT_WORKER_COUNT,
            worker_queue_high_watermark: 10_000,
            absent_cache_capacity: 100_000,
            scan_session_capacity: swapcore_engine::scan::DEFAULT_CAPACITY,
            scan_session_max_idle_secs: 60,
            slow_swap_threshold_micros: 5_000,
            slow_swap_sample_rate_pct: 100,
            slow_swap_ring_capacity: 256,
        }
    }

    /// A profile tuned for unit/integration tests: one worker (so
    /// completion ordering is trivially deterministic), small tables,
    /// every slow swap sampled.
    pub fn for_testing() -> Self {
        SwapConfig {
            worker_count: 1,
            worker_queue_high_watermark: 64,
            absent_cache_capacity: 64,
            scan_session_capacity: 16,
            scan_session_max_idle_secs: 5,
            slow_swap_threshold_micros: 0,
            slow_swap_sample_rate_pct: 100,
            slow_swap_ring_capacity: 16,
        }
    }

    /// Override the worker count.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Override the absent-cache capacity.
    pub fn with_absent_cache_capacity(mut self, capacity: usize) -> Self {
        self.absent_cache_capacity = capacity;
        self
    }

    /// Reject configurations the executor cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be at least 1".into());
        }
        if self.worker_count > Self::MAX_WORKER_COUNT {
            return Err(format!("worker_count must be at most {}", Self::MAX_WORKER_COUNT));
        }
        if self.slow_swap_sample_rate_pct > 100 {
            return Err("slow_swap_sample_rate_pct must be within 0..=100".into());
        }
        if self.scan_session_capacity == 0 {
            return Err("scan_session_capacity must be at least 1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_profile_validates() {
        assert!(SwapConfig::strict().validate().is_ok());
    }

    #[test]
    fn for_testing_profile_validates_and_is_single_worker() {
        let cfg = SwapConfig::for_testing();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.worker_count, 1);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let cfg = SwapConfig::strict().with_worker_count(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn over_max_workers_is_rejected() {
        let cfg = SwapConfig::strict().with_worker_count(SwapConfig::MAX_WORKER_COUNT + 1);
        assert!(cfg.validate().is_err());
    }
}
