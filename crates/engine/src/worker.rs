//! Background worker pool (spec.md §4.3 data flow step 4, component
//! C3): a fixed pool of threads, each owning its own FIFO job queue.
//! Jobs are routed to a queue by `hash(key) % num_threads`, so every
//! request touching the same key lands on the same worker and is
//! drained in submission order — the per-key FIFO ordering guarantee
//! spec.md §4.6 describes — without the worker layer needing a lock
//! per key. Grounded on the condvar/mutex/shutdown-flag shape of a
//! general-purpose background task scheduler, sharded the way the
//! source engine dedicates one FIFO per swap thread.

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shard {
    queue: Mutex<VecDeque<Job>>,
    work_ready: Condvar,
}

struct PoolInner {
    shards: Vec<Shard>,
    shutdown: AtomicBool,
    queue_depth: AtomicUsize,
    max_queue_depth: usize,
}

/// A fixed pool of swap-worker threads, one per shard.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `num_threads` workers, each pinned to its own shard.
    /// `max_queue_depth` is the aggregate-backlog threshold
    /// [`Self::backlog_pressure`] reports against, the RIO-side
    /// equivalent of the source engine's `swapRatelimit` back-pressure
    /// check (spec.md §9 supplemented features).
    pub fn new(num_threads: usize, max_queue_depth: usize) -> Self {
        let num_shards = num_threads.max(1);
        let inner = Arc::new(PoolInner {
            shards: (0..num_shards).map(|_| Shard { queue: Mutex::new(VecDeque::new()), work_ready: Condvar::new() }).collect(),
            shutdown: AtomicBool::new(false),
            queue_depth: AtomicUsize::new(0),
            max_queue_depth,
        });
        let workers = (0..num_threads)
            .map(|idx| {
                let inner = inner.clone();
                thread::Builder::new()
                    .name(format!("swap-worker-{idx}"))
                    .spawn(move || worker_loop(inner, idx))
                    .expect("failed to spawn swap worker thread")
            })
            .collect();
        WorkerPool { inner, workers: Mutex::new(workers) }
    }

    /// Which shard `key` routes to, for callers (e.g. a batched
    /// multi-key fetch) that want to pre-group work by destination
    /// worker before submitting it.
    pub fn shard_of(&self, key: &[u8]) -> usize {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.inner.shards.len()
    }

    /// Queue one job on the shard `key` hashes to, and wake that
    /// shard's worker.
    pub fn submit(&self, key: &[u8], job: Job) {
        let shard = self.shard_of(key);
        self.submit_to_shard(shard, job);
    }

    /// Queue one job directly on `shard`, bypassing the hash routing —
    /// for callers that already grouped work by shard (e.g. via
    /// [`Self::shard_of`]) and want every job in the group to land on
    /// the same worker without re-hashing each one.
    pub fn submit_to_shard(&self, shard: usize, job: Job) {
        let shard = &self.inner.shards[shard];
        let mut queue = shard.queue.lock();
        queue.push_back(job);
        self.inner.queue_depth.fetch_add(1, Ordering::SeqCst);
        shard.work_ready.notify_one();
    }

    /// Jobs currently queued or in flight, across every shard.
    pub fn queue_depth(&self) -> usize {
        self.inner.queue_depth.load(Ordering::SeqCst)
    }

    /// `true` once the aggregate queue depth has reached the configured
    /// threshold — callers should stop admitting new swap-out work
    /// until it drops back down.
    pub fn backlog_pressure(&self) -> bool {
        self.queue_depth() >= self.inner.max_queue_depth
    }

    /// Stop accepting new wakeups and join every worker thread. Safe to
    /// call more than once.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        for shard in &self.inner.shards {
            shard.work_ready.notify_all();
        }
        let mut workers = self.workers.lock();
        for worker in workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(inner: Arc<PoolInner>, shard_idx: usize) {
    let shard = &inner.shards[shard_idx];
    loop {
        let job = {
            let mut queue = shard.queue.lock();
            loop {
                if let Some(job) = queue.pop_front() {
                    inner.queue_depth.fetch_sub(1, Ordering::SeqCst);
                    break Some(job);
                }
                if inner.shutdown.load(Ordering::SeqCst) {
                    break None;
                }
                shard.work_ready.wait(&mut queue);
            }
        };
        match job {
            Some(job) => job(),
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn submitted_jobs_run_and_report_back() {
        let pool = WorkerPool::new(2, 1024);
        let (tx, rx) = mpsc::channel();
        for i in 0..8 {
            let tx = tx.clone();
            let key = format!("key-{i}").into_bytes();
            pool.submit(&key, Box::new(move || tx.send(i).unwrap()));
        }
        let mut seen: Vec<i32> = (0..8).map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn backlog_pressure_trips_at_threshold() {
        let pool = WorkerPool::new(0, 2);
        let (tx, _rx) = mpsc::channel();
        pool.submit(
            b"a",
            Box::new({
                let tx = tx.clone();
                move || tx.send(()).unwrap()
            }),
        );
        pool.submit(b"b", Box::new(move || tx.send(()).unwrap()));
        assert!(pool.backlog_pressure());
    }

    #[test]
    fn same_key_jobs_run_in_submission_order() {
        let pool = WorkerPool::new(4, 1024);
        let (tx, rx) = mpsc::channel();
        for i in 0..20 {
            let tx = tx.clone();
            pool.submit(b"same-key", Box::new(move || tx.send(i).unwrap()));
        }
        let seen: Vec<i32> = (0..20).map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap()).collect();
        assert_eq!(seen, (0..20).collect::<Vec<_>>(), "one key must always land on the same shard, in order");
    }

    #[test]
    fn shard_of_is_stable_for_the_same_key() {
        let pool = WorkerPool::new(4, 1024);
        assert_eq!(pool.shard_of(b"a"), pool.shard_of(b"a"));
    }
}
